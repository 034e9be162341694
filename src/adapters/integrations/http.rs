//! Shared request plumbing for provider adapters.
//!
//! Sends a prepared request, maps transport failures, non-2xx statuses and decode
//! failures into `IntegrationError`, annotating upstream errors with whatever
//! message/code the provider's error envelope carries.

use crate::domain::{IntegrationError, SourceSystem};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

/// Pulls `(message, code)` out of a provider error body.
pub(crate) type ErrorEnvelope = fn(&serde_json::Value) -> Option<(String, Option<String>)>;

/// Send and decode a JSON response body into `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: SourceSystem,
    req: RequestBuilder,
    envelope: ErrorEnvelope,
) -> Result<T, IntegrationError> {
    let body = send_text(provider, req, envelope).await?;
    decode(provider, &body)
}

/// Send and return the raw body of a successful response.
pub(crate) async fn send_text(
    provider: SourceSystem,
    req: RequestBuilder,
    envelope: ErrorEnvelope,
) -> Result<String, IntegrationError> {
    let res = req.send().await.map_err(|e| IntegrationError::Request {
        provider,
        message: e.to_string(),
    })?;

    let status = res.status();
    let body = res.text().await.map_err(|e| IntegrationError::Request {
        provider,
        message: format!("reading body: {}", e),
    })?;

    if !status.is_success() {
        let (message, code) = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| envelope(&v))
            .unwrap_or_else(|| (truncate(&body, 200), None));
        warn!(%provider, status = status.as_u16(), code = ?code, "provider returned error");
        return Err(IntegrationError::Upstream {
            provider,
            status: status.as_u16(),
            message,
            code,
        });
    }

    debug!(%provider, status = status.as_u16(), body_len = body.len(), "provider response");
    Ok(body)
}

pub(crate) fn decode<T: DeserializeOwned>(
    provider: SourceSystem,
    body: &str,
) -> Result<T, IntegrationError> {
    serde_json::from_str(body).map_err(|e| IntegrationError::Parse {
        provider,
        message: e.to_string(),
    })
}

fn truncate(text: &str, max: usize) -> String {
    let t = text.trim();
    if t.is_empty() {
        return "empty response body".to_string();
    }
    t.chars().take(max).collect()
}

/// Treat `null` like a missing field, so empty upstream lists become `[]`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn parse_rfc3339(value: Option<&str>) -> Option<DateTime<Utc>> {
    let v = value?;
    DateTime::parse_from_rfc3339(v)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub(crate) fn from_unix_secs(value: Option<i64>) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(value?, 0).single()
}

pub(crate) fn from_unix_millis(value: Option<i64>) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value?).single()
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// A caller-supplied id checked for use as one URL path segment. Anything that
/// could leave the segment (separators, query or fragment markers, dot segments
/// in plain or percent-encoded form) is rejected rather than escaped.
pub(crate) fn path_id<'a>(
    provider: SourceSystem,
    id: &'a str,
) -> Result<&'a str, IntegrationError> {
    let lowered = id.to_ascii_lowercase();
    let dots = lowered.replace("%2e", ".");
    let unsafe_char = id
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_whitespace() || c.is_control());
    let encoded_separator = lowered.contains("%2f") || lowered.contains("%5c");
    if id.is_empty() || dots == "." || dots == ".." || unsafe_char || encoded_separator {
        return Err(IntegrationError::InvalidInput {
            provider,
            message: format!("invalid id {:?}", id),
        });
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a/", "/v1/x"), "http://a/v1/x");
        assert_eq!(join_url("http://a", "v1/x"), "http://a/v1/x");
    }

    #[test]
    fn test_path_id_rejects_segment_escapes() {
        let p = SourceSystem::Stripe;
        assert_eq!(path_id(p, "cus_123").unwrap(), "cus_123");
        assert_eq!(path_id(p, "a%3Bc").unwrap(), "a%3Bc");
        let rejected = [
            "", ".", "..", "%2e%2E", "../balance", "a/b", "a\\b", "x?y=1", "x#y", "a%2Fb", "a b",
        ];
        for bad in rejected {
            assert!(
                matches!(path_id(p, bad), Err(IntegrationError::InvalidInput { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_dates() {
        let dt = parse_rfc3339(Some("2024-03-01T10:00:00.000Z")).unwrap();
        assert_eq!(dt.timestamp(), 1_709_287_200);
        assert!(parse_rfc3339(Some("not a date")).is_none());
        assert!(parse_rfc3339(None).is_none());
        assert_eq!(from_unix_secs(Some(0)).map(|d| d.timestamp()), Some(0));
        assert_eq!(
            from_unix_millis(Some(1_709_287_200_000)).map(|d| d.timestamp()),
            Some(1_709_287_200)
        );
    }

    #[derive(Deserialize)]
    struct Listing {
        #[serde(default, deserialize_with = "null_as_default")]
        data: Vec<u32>,
    }

    #[test]
    fn test_null_list_becomes_empty() {
        let l: Listing = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert!(l.data.is_empty());
        let l: Listing = serde_json::from_str("{}").unwrap();
        assert!(l.data.is_empty());
    }
}
