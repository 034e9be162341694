//! Source identity. Every normalized record points back at its system of record.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    Hubspot,
    Stripe,
    Notion,
    Metabase,
    N8n,
}

impl SourceSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hubspot => "hubspot",
            Self::Stripe => "stripe",
            Self::Notion => "notion",
            Self::Metabase => "metabase",
            Self::N8n => "n8n",
        }
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record kind within the source system. Drives deep links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Company,
    Contact,
    Deal,
    Note,
    Customer,
    Subscription,
    Invoice,
    Charge,
    Page,
    Comment,
    Row,
    Webhook,
}

/// Identifying key of a record in its source system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub system: SourceSystem,
    pub kind: SourceKind,
    pub id: String,
    /// Provider-supplied URL when the payload carries one (Notion pages do).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SourceRef {
    pub fn new(system: SourceSystem, kind: SourceKind, id: impl Into<String>) -> Self {
        Self {
            system,
            kind,
            id: id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    /// UI link back into the provider, when one can be derived.
    pub fn deep_link(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        match (self.system, self.kind) {
            (SourceSystem::Hubspot, SourceKind::Company) => {
                Some(format!("https://app.hubspot.com/contacts/_/company/{}", self.id))
            }
            (SourceSystem::Hubspot, SourceKind::Contact) => {
                Some(format!("https://app.hubspot.com/contacts/_/contact/{}", self.id))
            }
            (SourceSystem::Hubspot, SourceKind::Deal) => {
                Some(format!("https://app.hubspot.com/contacts/_/deal/{}", self.id))
            }
            (SourceSystem::Stripe, SourceKind::Customer) => {
                Some(format!("https://dashboard.stripe.com/customers/{}", self.id))
            }
            (SourceSystem::Stripe, SourceKind::Invoice) => {
                Some(format!("https://dashboard.stripe.com/invoices/{}", self.id))
            }
            (SourceSystem::Stripe, SourceKind::Charge) => {
                Some(format!("https://dashboard.stripe.com/payments/{}", self.id))
            }
            (SourceSystem::Stripe, SourceKind::Subscription) => {
                Some(format!("https://dashboard.stripe.com/subscriptions/{}", self.id))
            }
            (SourceSystem::Notion, _) => Some(format!(
                "https://www.notion.so/{}",
                self.id.replace('-', "")
            )),
            _ => None,
        }
    }
}
