//! Domain errors. Returned by every port.
//!
//! Adapters map transport, status and decoding failures into these.

use crate::domain::SourceSystem;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Required credential or URL absent. Raised before any network call.
    #[error("{provider} is not configured: missing {key}")]
    MissingConfig {
        provider: SourceSystem,
        key: &'static str,
    },

    /// Upstream answered with a non-2xx status (or a failure envelope).
    #[error("{provider} API error {status}: {message}")]
    Upstream {
        provider: SourceSystem,
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The request never produced a response (DNS, connect, TLS, body stream).
    #[error("{provider} request failed: {message}")]
    Request {
        provider: SourceSystem,
        message: String,
    },

    #[error("{provider} response could not be parsed: {message}")]
    Parse {
        provider: SourceSystem,
        message: String,
    },

    /// Caller supplied something the provider would reject outright.
    #[error("invalid input for {provider}: {message}")]
    InvalidInput {
        provider: SourceSystem,
        message: String,
    },

    /// Live event stream transport dropped or answered with a non-2xx status.
    #[error("event stream failed: {message}")]
    Stream { message: String },
}

impl IntegrationError {
    pub fn is_missing_config(&self) -> bool {
        matches!(self, Self::MissingConfig { .. })
    }

    /// Provider the failure came from. `None` for the event stream transport.
    pub fn provider(&self) -> Option<SourceSystem> {
        match self {
            Self::MissingConfig { provider, .. }
            | Self::Upstream { provider, .. }
            | Self::Request { provider, .. }
            | Self::Parse { provider, .. }
            | Self::InvalidInput { provider, .. } => Some(*provider),
            Self::Stream { .. } => None,
        }
    }

    /// Upstream error code (e.g. Stripe `code`, Notion `code`, HubSpot `category`).
    pub fn upstream_code(&self) -> Option<&str> {
        match self {
            Self::Upstream { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
