//! Live event stream ports: the client-side transport and the toast sink.

use crate::domain::{IntegrationError, PortfolioEvent};
use futures::stream::BoxStream;

/// Events from one connection. The stream ends or yields `Err` when the transport drops.
pub type EventStream = BoxStream<'static, Result<PortfolioEvent, IntegrationError>>;

/// Opens one long-lived server-to-client connection.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn connect(&self) -> Result<EventStream, IntegrationError>;
}

/// User-visible toast notifications.
pub trait Notifier: Send + Sync {
    fn toast(&self, text: &str);
}
