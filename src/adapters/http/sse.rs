//! `GET /events`: the live portfolio stream as Server-Sent Events.

use super::AppState;
use crate::domain::PortfolioEvent;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{info, warn};

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// SSE frame: `event:` is the event name, `data:` the JSON body.
pub fn to_sse_event(event: &PortfolioEvent) -> Option<Event> {
    match Event::default().event(event.event_name()).json_data(event) {
        Ok(e) => Some(e),
        Err(err) => {
            warn!(event = event.event_name(), error = %err, "failed to encode event");
            None
        }
    }
}

pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state
        .hub
        .subscribe()
        .filter_map(|event| async move { to_sse_event(&event).map(Ok) });
    info!(
        subscribers = state.hub.subscriber_count(),
        "event stream client connected"
    );
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
