//! CRM records (companies, contacts, deals, notes) as the rest of the app sees them.

use crate::domain::SourceRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub source: SourceRef,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub lifecycle_stage: Option<String>,
    pub owner_id: Option<String>,
    pub annual_revenue: Option<f64>,
    pub num_employees: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub source: SourceRef,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub company_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub source: SourceRef,
    pub name: Option<String>,
    pub stage: Option<String>,
    pub pipeline: Option<String>,
    pub amount: Option<f64>,
    pub close_date: Option<DateTime<Utc>>,
    pub owner_id: Option<String>,
    pub deal_type: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Deal {
    pub fn is_closed_won(&self) -> bool {
        self.stage.as_deref() == Some("closedwon")
    }

    pub fn is_closed_lost(&self) -> bool {
        self.stage.as_deref() == Some("closedlost")
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed_won() && !self.is_closed_lost()
    }
}

/// Note engagement logged against a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub source: SourceRef,
    pub body: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub company_id: Option<String>,
}

/// Filter for deal search. Empty fields are not sent.
#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub pipeline: Option<String>,
    pub stage: Option<String>,
    pub deal_type: Option<String>,
    pub company_id: Option<String>,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewDeal {
    pub name: String,
    pub pipeline: Option<String>,
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub close_date: Option<DateTime<Utc>>,
    pub deal_type: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DealUpdate {
    pub name: Option<String>,
    pub stage: Option<String>,
    pub amount: Option<f64>,
    pub close_date: Option<DateTime<Utc>>,
}

impl DealUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.stage.is_none()
            && self.amount.is_none()
            && self.close_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNote {
    pub company_id: String,
    pub body: String,
    pub timestamp: Option<DateTime<Utc>>,
}
