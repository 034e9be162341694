//! Portfolio views: expansion pipeline, account health, aggregate stats.

use crate::domain::{Company, Deal, SourceRef, Task};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionSummary {
    pub open_count: usize,
    pub pipeline_amount: f64,
    pub won: usize,
    pub lost: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionOpportunities {
    pub opportunities: Vec<Deal>,
    /// `None` when the provider returned no deals at all.
    pub summary: Option<ExpansionSummary>,
}

impl ExpansionOpportunities {
    pub fn from_deals(deals: Vec<Deal>) -> Self {
        if deals.is_empty() {
            return Self::default();
        }
        let won = deals.iter().filter(|d| d.is_closed_won()).count();
        let lost = deals.iter().filter(|d| d.is_closed_lost()).count();
        let open: Vec<&Deal> = deals.iter().filter(|d| d.is_open()).collect();
        let summary = ExpansionSummary {
            open_count: open.len(),
            pipeline_amount: open.iter().filter_map(|d| d.amount).sum(),
            won,
            lost,
            win_rate: win_rate(won, lost),
        };
        Self {
            opportunities: deals,
            summary: Some(summary),
        }
    }
}

/// Share of closed deals that were won, in percent. Zero when nothing has closed.
pub fn win_rate(won: usize, lost: usize) -> f64 {
    let closed = won + lost;
    if closed == 0 {
        return 0.0;
    }
    (won as f64 / closed as f64) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    AtRisk,
    Critical,
    Unknown,
}

impl HealthStatus {
    /// Bucket a 0-100 health score.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= 70.0 => Self::Healthy,
            Some(s) if s >= 40.0 => Self::AtRisk,
            Some(_) => Self::Critical,
            None => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountHealth {
    pub account: SourceRef,
    pub name: Option<String>,
    pub score: Option<f64>,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub total_accounts: i64,
    pub healthy: i64,
    pub at_risk: i64,
    pub critical: i64,
    pub mrr: Option<f64>,
}

/// Combined account/task search. Either side may be empty after a provider failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSearch {
    pub companies: Vec<Company>,
    pub tasks: Vec<Task>,
}
