//! Fan-out of portfolio events to every live subscriber.
//!
//! Delivery is at-most-once: no sequence ids and no replay. A subscriber that lags
//! past the channel capacity skips the missed events.

use crate::domain::PortfolioEvent;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<PortfolioEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        info!(capacity, "event hub initialized");
        Self { tx }
    }

    /// Send to all current subscribers. Returns how many received it; zero when
    /// nobody is connected.
    pub fn publish(&self, event: PortfolioEvent) -> usize {
        let name = event.event_name();
        match self.tx.send(event) {
            Ok(n) => {
                debug!(event = name, subscribers = n, "published event");
                n
            }
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// `connected` first, then live events in emission order.
    pub fn subscribe(&self) -> BoxStream<'static, PortfolioEvent> {
        let rx = self.tx.subscribe();
        let live = BroadcastStream::new(rx).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = ?e, "subscriber lagged; events skipped");
                    None
                }
            }
        });
        stream::once(async { PortfolioEvent::connected() })
            .chain(live)
            .boxed()
    }
}
