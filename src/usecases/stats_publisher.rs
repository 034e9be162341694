//! Periodic stats snapshot and health-change detection for the live stream.
//!
//! Each cycle reads portfolio stats and per-account health from the warehouse,
//! publishes a snapshot, and publishes a change event for every account whose
//! status moved since the previous cycle. The first cycle only records a baseline.

use crate::adapters::integrations::metabase::queries;
use crate::domain::{HealthStatus, IntegrationError, PortfolioEvent};
use crate::usecases::event_hub::EventHub;
use crate::usecases::facade::Integrations;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct StatsPublisher {
    integrations: Integrations,
    hub: EventHub,
    interval: Duration,
    previous: HashMap<String, HealthStatus>,
}

impl StatsPublisher {
    pub fn new(integrations: Integrations, hub: EventHub, interval: Duration) -> Self {
        Self {
            integrations,
            hub,
            interval,
            previous: HashMap::new(),
        }
    }

    /// One cycle. Returns the events published, snapshot first.
    pub async fn run_cycle(&mut self) -> Result<Vec<PortfolioEvent>, IntegrationError> {
        let warehouse = self.integrations.warehouse();
        let stats = warehouse.run(&queries::portfolio_stats()).await?;
        let health = warehouse.run(&queries::account_health_all()).await?;

        let now = Utc::now();
        let mut events = vec![PortfolioEvent::StatsSnapshot {
            stats: queries::stats_from_result(&stats).unwrap_or_default(),
            at: now,
        }];

        let first_cycle = self.previous.is_empty();
        let mut current = HashMap::with_capacity(health.rows.len());
        for account in queries::health_from_result(&health) {
            let key = account.account.id.clone();
            let changed_from = self
                .previous
                .get(&key)
                .copied()
                .filter(|from| *from != account.status);
            if let Some(from) = changed_from {
                events.push(PortfolioEvent::HealthChanged {
                    account: account.account.clone(),
                    name: account.name.clone(),
                    from,
                    to: account.status,
                    at: now,
                });
            }
            current.insert(key, account.status);
        }
        self.previous = current;

        if first_cycle {
            debug!(accounts = self.previous.len(), "recorded health baseline");
        }
        for event in &events {
            self.hub.publish(event.clone());
        }
        Ok(events)
    }

    /// Cycle until `shutdown` fires. A failed cycle is skipped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "stats publisher started");
        loop {
            match self.run_cycle().await {
                Ok(events) => debug!(events = events.len(), "stats cycle complete"),
                Err(e) => warn!(error = %e, "stats cycle skipped"),
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("stats publisher stopped");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
