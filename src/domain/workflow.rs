//! Workflow-automation writes. The automation tool performs the actual mutation;
//! this side only learns that the webhook accepted the request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typed action posted to a named webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum WorkflowAction {
    UpdateOperatorField {
        operator_id: String,
        field: String,
        value: serde_json::Value,
    },
    LogCustomerNote {
        operator_id: String,
        note: String,
        author: Option<String>,
    },
    FlagChurnRisk {
        operator_id: String,
        reason: String,
        severity: Option<String>,
    },
    SyncSegment {
        operator_id: String,
        segment: String,
    },
}

impl WorkflowAction {
    /// Webhook path the action is posted to, relative to the proxy base URL.
    pub fn webhook_path(&self) -> &'static str {
        match self {
            Self::UpdateOperatorField { .. } => "update-operator",
            Self::LogCustomerNote { .. } => "log-note",
            Self::FlagChurnRisk { .. } => "flag-churn-risk",
            Self::SyncSegment { .. } => "sync-segment",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateOperatorField { .. } => "update_operator_field",
            Self::LogCustomerNote { .. } => "log_customer_note",
            Self::FlagChurnRisk { .. } => "flag_churn_risk",
            Self::SyncSegment { .. } => "sync_segment",
        }
    }
}

/// Caller-generated key so the receiver can drop duplicate retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdempotencyKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// The webhook took the request; downstream state is not confirmed.
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub idempotency_key: IdempotencyKey,
    pub status: WriteStatus,
    /// Message echoed by the webhook, when it sends one.
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_with_payload() {
        let a = WorkflowAction::SyncSegment {
            operator_id: "op_1".to_string(),
            segment: "enterprise".to_string(),
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["action"], "sync_segment");
        assert_eq!(v["payload"]["segment"], "enterprise");
        assert_eq!(a.webhook_path(), "sync-segment");
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(IdempotencyKey::generate(), IdempotencyKey::generate());
    }
}
