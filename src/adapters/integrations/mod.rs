//! Provider adapters. One module per external system, sharing `http` plumbing.
//!
//! HubSpot (CRM), Stripe (billing), Notion (docs and tasks), Metabase (warehouse),
//! n8n (workflow webhooks).

mod http;
pub mod hubspot;
pub mod metabase;
pub mod n8n;
pub mod notion;
pub mod stripe;

pub use hubspot::HubspotAdapter;
pub use metabase::MetabaseAdapter;
pub use n8n::N8nAdapter;
pub use notion::NotionAdapter;
pub use stripe::StripeAdapter;
