//! Billing records. Amounts stay in integer minor units, as the provider reports them.

use crate::domain::SourceRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which credential set a billing call runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingScope {
    /// The platform account itself.
    Platform,
    /// A connected sub-account, routed via the account header.
    Connected(String),
}

impl BillingScope {
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Platform => None,
            Self::Connected(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub source: SourceRef,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub currency: Option<String>,
    pub balance: Option<i64>,
    pub delinquent: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub source: SourceRef,
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
    pub canceled_at: Option<DateTime<Utc>>,
    /// Sum of item unit amounts times quantity for one period.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub plan_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub source: SourceRef,
    pub customer_id: Option<String>,
    pub number: Option<String>,
    pub status: Option<String>,
    pub amount_due: Option<i64>,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub hosted_invoice_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub source: SourceRef,
    pub customer_id: Option<String>,
    pub amount: Option<i64>,
    pub amount_refunded: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub paid: Option<bool>,
    pub disputed: Option<bool>,
    pub failure_message: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
}
