//! Single entry point over every provider adapter.
//!
//! Built explicitly from `AppConfig` in `main` (or from arbitrary port
//! implementations in tests) and shared behind an `Arc`.

use crate::adapters::integrations::{
    HubspotAdapter, MetabaseAdapter, N8nAdapter, NotionAdapter, StripeAdapter,
};
use crate::ports::{BillingPort, CrmPort, DocsPort, WarehousePort, WorkflowPort};
use crate::shared::config::AppConfig;
use serde::Serialize;
use std::sync::Arc;

/// Which providers have credentials. Derived from configuration only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrationStatus {
    pub hubspot: bool,
    pub stripe: bool,
    pub stripe_connect: bool,
    pub notion: bool,
    pub metabase: bool,
    pub n8n: bool,
}

impl IntegrationStatus {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            hubspot: cfg.is_hubspot_configured(),
            stripe: cfg.is_stripe_configured(),
            stripe_connect: cfg.is_stripe_connect_configured(),
            notion: cfg.is_notion_configured(),
            metabase: cfg.is_metabase_configured(),
            n8n: cfg.is_n8n_configured(),
        }
    }
}

#[derive(Clone)]
pub struct Integrations {
    crm: Arc<dyn CrmPort>,
    billing: Arc<dyn BillingPort>,
    docs: Arc<dyn DocsPort>,
    warehouse: Arc<dyn WarehousePort>,
    workflow: Arc<dyn WorkflowPort>,
    status: IntegrationStatus,
    missing: Vec<&'static str>,
}

impl Integrations {
    /// Every adapter over one shared HTTP client. Unconfigured providers still get
    /// an adapter; their calls fail with `MissingConfig`.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            cfg,
            Arc::new(HubspotAdapter::new(
                client.clone(),
                cfg.hubspot_base_url_or_default(),
                cfg.hubspot_access_token.clone(),
            )),
            Arc::new(StripeAdapter::new(
                client.clone(),
                cfg.stripe_base_url_or_default(),
                cfg.stripe_secret_key.clone(),
                cfg.stripe_connect_secret_key.clone(),
            )),
            Arc::new(NotionAdapter::new(
                client.clone(),
                cfg.notion_base_url_or_default(),
                cfg.notion_api_key.clone(),
            )),
            Arc::new(MetabaseAdapter::new(
                client.clone(),
                cfg.metabase_url.clone(),
                cfg.metabase_api_key.clone(),
                cfg.metabase_database_id,
            )),
            Arc::new(N8nAdapter::new(
                client,
                cfg.n8n_webhook_url.clone(),
                cfg.n8n_webhook_secret.clone(),
            )),
        )
    }

    pub fn new(
        cfg: &AppConfig,
        crm: Arc<dyn CrmPort>,
        billing: Arc<dyn BillingPort>,
        docs: Arc<dyn DocsPort>,
        warehouse: Arc<dyn WarehousePort>,
        workflow: Arc<dyn WorkflowPort>,
    ) -> Self {
        Self {
            crm,
            billing,
            docs,
            warehouse,
            workflow,
            status: IntegrationStatus::from_config(cfg),
            missing: cfg.missing_keys(),
        }
    }

    pub fn crm(&self) -> &dyn CrmPort {
        self.crm.as_ref()
    }

    pub fn billing(&self) -> &dyn BillingPort {
        self.billing.as_ref()
    }

    pub fn docs(&self) -> &dyn DocsPort {
        self.docs.as_ref()
    }

    pub fn warehouse(&self) -> &dyn WarehousePort {
        self.warehouse.as_ref()
    }

    pub fn workflow(&self) -> &dyn WorkflowPort {
        self.workflow.as_ref()
    }

    pub fn configured(&self) -> IntegrationStatus {
        self.status
    }

    /// Expected configuration keys that are absent.
    pub fn missing_config(&self) -> &[&'static str] {
        &self.missing
    }
}
