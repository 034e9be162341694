//! Wiring & DI. Entry point: load config, build adapters, inject into services, serve.
//! No business logic here.
//!
//! `portfolio-gateway` serves the API and event stream.
//! `portfolio-gateway watch [url]` follows a running gateway's event stream.

use portfolio_gateway::adapters::http::{AppState, router};
use portfolio_gateway::adapters::stream_client::{
    EventStreamClient, HttpEventSource, TracingNotifier,
};
use portfolio_gateway::shared::config::{AppConfig, DEFAULT_EVENT_BUFFER};
use portfolio_gateway::shared::logging::init_logging;
use portfolio_gateway::usecases::{EventHub, Integrations, PortfolioService, StatsPublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(error = %e, "config could not be loaded; using defaults");
            AppConfig::default()
        }
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("watch") => {
            let url = args
                .next()
                .unwrap_or_else(|| format!("http://{}/events", cfg.bind_addr_or_default()));
            watch(url, shutdown).await
        }
        Some(other) => anyhow::bail!("unknown command '{}'; expected 'watch' or nothing", other),
        None => serve(cfg, shutdown).await,
    }
}

async fn serve(cfg: AppConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let integrations = Integrations::from_config(&cfg);
    for key in integrations.missing_config() {
        warn!(key, "integration key not set; dependent calls will fail");
    }
    info!(configured = ?integrations.configured(), "integrations ready");

    let hub = EventHub::new(DEFAULT_EVENT_BUFFER);
    let service = Arc::new(PortfolioService::new(
        integrations.clone(),
        hub.clone(),
        cfg.notion_tasks_database_id.clone(),
        cfg.expansion_pipeline_or_default(),
    ));

    if cfg.is_metabase_configured() {
        let interval = Duration::from_secs(cfg.stats_interval_secs_or_default());
        let publisher = StatsPublisher::new(integrations, hub.clone(), interval);
        tokio::spawn(publisher.run(shutdown.clone()));
    } else {
        warn!("METABASE_URL/METABASE_API_KEY not set; stats publisher disabled");
    }

    let addr = cfg.bind_addr_or_default();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {}: {}", addr, e))?;
    info!(addr = %addr, "listening");

    let app = router(AppState { service, hub });
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn watch(url: String, shutdown: CancellationToken) -> anyhow::Result<()> {
    info!(url = %url, "following event stream");
    let source = Arc::new(HttpEventSource::new(reqwest::Client::new(), url));
    let client = EventStreamClient::new(source, Arc::new(TracingNotifier));

    let mut events = client.subscribe(true);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(event = event.event_name(), "event received");
        }
    });

    client.run(shutdown).await;
    Ok(())
}
