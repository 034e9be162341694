//! Live portfolio events pushed to connected clients.

use crate::domain::{HealthStatus, PortfolioStats, SourceRef, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortfolioEvent {
    /// Heartbeat sent once when a subscriber attaches.
    Connected { at: DateTime<Utc> },
    HealthChanged {
        account: SourceRef,
        name: Option<String>,
        from: HealthStatus,
        to: HealthStatus,
        at: DateTime<Utc>,
    },
    TaskCreated { task: Task, at: DateTime<Utc> },
    StatsSnapshot {
        stats: PortfolioStats,
        at: DateTime<Utc>,
    },
}

impl PortfolioEvent {
    pub fn connected() -> Self {
        Self::Connected { at: Utc::now() }
    }

    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::HealthChanged { .. } => "health_change",
            Self::TaskCreated { .. } => "new_task",
            Self::StatsSnapshot { .. } => "stats_update",
        }
    }

    /// One-line text for a toast. Heartbeats and snapshots do not toast.
    pub fn toast_text(&self) -> Option<String> {
        match self {
            Self::HealthChanged { account, name, to, .. } => Some(format!(
                "{} is now {:?}",
                name.as_deref().unwrap_or(&account.id),
                to
            )),
            Self::TaskCreated { task, .. } => Some(format!(
                "New task: {}",
                task.name.as_deref().unwrap_or("(untitled)")
            )),
            Self::Connected { .. } | Self::StatsSnapshot { .. } => None,
        }
    }
}
