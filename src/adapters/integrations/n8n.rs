//! n8n adapter. Implements WorkflowPort by posting typed actions to named webhooks.

use super::http::{join_url, send_text};
use crate::domain::{
    IdempotencyKey, IntegrationError, SourceSystem, WebhookAck, WorkflowAction, WriteStatus,
};
use crate::ports::WorkflowPort;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

const PROVIDER: SourceSystem = SourceSystem::N8n;

pub struct N8nAdapter {
    client: Client,
    webhook_url: Option<String>,
    secret: Option<String>,
}

impl N8nAdapter {
    pub fn new(client: Client, webhook_url: Option<String>, secret: Option<String>) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            client,
            webhook_url: present(webhook_url),
            secret: present(secret),
        }
    }
}

/// Webhook error bodies are free-form; `{message}` is the common shape.
fn n8n_error(v: &Value) -> Option<(String, Option<String>)> {
    let message = v.get("message")?.as_str()?.to_string();
    let code = v.get("code").and_then(|c| match c {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    Some((message, code))
}

/// Body sent to the webhook: the action tag, the key and the action payload.
pub fn webhook_body(action: &WorkflowAction, key: &IdempotencyKey) -> Value {
    let tagged = serde_json::to_value(action).unwrap_or(Value::Null);
    json!({
        "action": action.name(),
        "idempotency_key": key,
        "payload": tagged.get("payload").cloned().unwrap_or(Value::Null),
    })
}

#[async_trait::async_trait]
impl WorkflowPort for N8nAdapter {
    async fn dispatch_with_key(
        &self,
        action: &WorkflowAction,
        key: IdempotencyKey,
    ) -> Result<WebhookAck, IntegrationError> {
        let base = self
            .webhook_url
            .as_deref()
            .ok_or(IntegrationError::MissingConfig {
                provider: PROVIDER,
                key: "N8N_WEBHOOK_URL",
            })?;

        let mut req = self
            .client
            .post(join_url(base, action.webhook_path()))
            .header("Idempotency-Key", key.as_str())
            .json(&webhook_body(action, &key));
        if let Some(secret) = &self.secret {
            req = req.header("X-Webhook-Secret", secret);
        }

        let body = send_text(PROVIDER, req, n8n_error).await?;
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));

        info!(
            action = action.name(),
            idempotency_key = key.as_str(),
            "workflow webhook accepted"
        );
        Ok(WebhookAck {
            idempotency_key: key,
            status: WriteStatus::Unconfirmed,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_body_shape() {
        let action = WorkflowAction::FlagChurnRisk {
            operator_id: "op_9".to_string(),
            reason: "usage dropped".to_string(),
            severity: Some("high".to_string()),
        };
        let key = IdempotencyKey::from("k-1".to_string());
        let body = webhook_body(&action, &key);
        assert_eq!(body["action"], "flag_churn_risk");
        assert_eq!(body["idempotency_key"], "k-1");
        assert_eq!(body["payload"]["operator_id"], "op_9");
        assert_eq!(body["payload"]["severity"], "high");
    }

    #[tokio::test]
    async fn test_missing_url_is_config_error() {
        let adapter = N8nAdapter::new(Client::new(), Some("".into()), None);
        let action = WorkflowAction::SyncSegment {
            operator_id: "op_1".into(),
            segment: "smb".into(),
        };
        let err = adapter.dispatch(&action).await.unwrap_err();
        assert!(err.is_missing_config());
    }
}
