//! Application configuration. Provider credentials, base URLs, server settings.
//!
//! Constructed once in `main` and passed down; nothing reads it globally.

use serde::Deserialize;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 30;
/// Capacity of the event broadcast channel. Slow subscribers past this lag and skip.
pub const DEFAULT_EVENT_BUFFER: usize = 100;

pub const HUBSPOT_BASE_URL: &str = "https://api.hubapi.com";
pub const STRIPE_BASE_URL: &str = "https://api.stripe.com";
pub const NOTION_BASE_URL: &str = "https://api.notion.com";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to. Read from PORTFOLIO_BIND_ADDR.
    #[serde(default)]
    pub bind_addr: Option<String>,

    /// Seconds between stats snapshots on the event stream. Read from STATS_INTERVAL_SECS.
    #[serde(default)]
    pub stats_interval_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // CRM (HubSpot)
    // ─────────────────────────────────────────────────────────────────────────
    /// Private-app access token. Read from HUBSPOT_ACCESS_TOKEN.
    #[serde(default)]
    pub hubspot_access_token: Option<String>,

    /// Read from HUBSPOT_BASE_URL.
    #[serde(default)]
    pub hubspot_base_url: Option<String>,

    /// Deal pipeline holding expansion deals. Read from HUBSPOT_EXPANSION_PIPELINE.
    #[serde(default)]
    pub hubspot_expansion_pipeline: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Billing (Stripe)
    // ─────────────────────────────────────────────────────────────────────────
    /// Platform secret key. Read from STRIPE_SECRET_KEY.
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Key used for connected sub-account calls. Read from STRIPE_CONNECT_SECRET_KEY.
    #[serde(default)]
    pub stripe_connect_secret_key: Option<String>,

    /// Read from STRIPE_BASE_URL.
    #[serde(default)]
    pub stripe_base_url: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Docs / tasks (Notion)
    // ─────────────────────────────────────────────────────────────────────────
    /// Integration token. Read from NOTION_API_KEY.
    #[serde(default)]
    pub notion_api_key: Option<String>,

    /// Read from NOTION_BASE_URL.
    #[serde(default)]
    pub notion_base_url: Option<String>,

    /// Database where tasks are created. Read from NOTION_TASKS_DATABASE_ID.
    #[serde(default)]
    pub notion_tasks_database_id: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Analytics warehouse (Metabase)
    // ─────────────────────────────────────────────────────────────────────────
    /// Read from METABASE_URL.
    #[serde(default)]
    pub metabase_url: Option<String>,

    /// Read from METABASE_API_KEY.
    #[serde(default)]
    pub metabase_api_key: Option<String>,

    /// Default execution target. Read from METABASE_DATABASE_ID.
    #[serde(default)]
    pub metabase_database_id: Option<i64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Workflow webhooks (n8n)
    // ─────────────────────────────────────────────────────────────────────────
    /// Webhook base URL. Read from N8N_WEBHOOK_URL.
    #[serde(default)]
    pub n8n_webhook_url: Option<String>,

    /// Optional shared secret header. Read from N8N_WEBHOOK_SECRET.
    #[serde(default)]
    pub n8n_webhook_secret: Option<String>,
}

impl AppConfig {
    /// Environment (unprefixed, e.g. `HUBSPOT_ACCESS_TOKEN`), then an optional file
    /// named by PORTFOLIO_CONFIG.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("PORTFOLIO_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::default());
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // PORTFOLIO_BIND_ADDR keeps its prefix so it is not mistaken for a generic BIND_ADDR
        if let Ok(addr) = std::env::var("PORTFOLIO_BIND_ADDR") {
            cfg.bind_addr = Some(addr);
        }
        Ok(cfg)
    }

    pub fn bind_addr_or_default(&self) -> String {
        self.bind_addr
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
    }

    /// Returns the stats interval in seconds. Defaults to 30; zero is treated as unset.
    pub fn stats_interval_secs_or_default(&self) -> u64 {
        self.stats_interval_secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_STATS_INTERVAL_SECS)
    }

    pub fn hubspot_base_url_or_default(&self) -> String {
        self.hubspot_base_url
            .clone()
            .unwrap_or_else(|| HUBSPOT_BASE_URL.to_string())
    }

    pub fn stripe_base_url_or_default(&self) -> String {
        self.stripe_base_url
            .clone()
            .unwrap_or_else(|| STRIPE_BASE_URL.to_string())
    }

    pub fn notion_base_url_or_default(&self) -> String {
        self.notion_base_url
            .clone()
            .unwrap_or_else(|| NOTION_BASE_URL.to_string())
    }

    pub fn expansion_pipeline_or_default(&self) -> String {
        self.hubspot_expansion_pipeline
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Presence checks
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_hubspot_configured(&self) -> bool {
        present(&self.hubspot_access_token)
    }

    pub fn is_stripe_configured(&self) -> bool {
        present(&self.stripe_secret_key)
    }

    pub fn is_stripe_connect_configured(&self) -> bool {
        present(&self.stripe_connect_secret_key)
    }

    pub fn is_notion_configured(&self) -> bool {
        present(&self.notion_api_key)
    }

    pub fn is_metabase_configured(&self) -> bool {
        present(&self.metabase_url) && present(&self.metabase_api_key)
    }

    pub fn is_n8n_configured(&self) -> bool {
        present(&self.n8n_webhook_url)
    }

    /// Expected keys that are absent, in a fixed order.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let checks: [(&'static str, bool); 8] = [
            ("HUBSPOT_ACCESS_TOKEN", self.is_hubspot_configured()),
            ("STRIPE_SECRET_KEY", self.is_stripe_configured()),
            ("STRIPE_CONNECT_SECRET_KEY", self.is_stripe_connect_configured()),
            ("NOTION_API_KEY", self.is_notion_configured()),
            ("NOTION_TASKS_DATABASE_ID", present(&self.notion_tasks_database_id)),
            ("METABASE_URL", present(&self.metabase_url)),
            ("METABASE_API_KEY", present(&self.metabase_api_key)),
            ("N8N_WEBHOOK_URL", self.is_n8n_configured()),
        ];
        checks
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(k, _)| k)
            .collect()
    }
}

/// Blank values count as absent.
fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
