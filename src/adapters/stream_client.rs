//! Client side of the live portfolio stream.
//!
//! `EventStreamClient` keeps one connection open through an `EventSource`,
//! reconnecting after a fixed delay whenever the transport drops. It remembers the
//! most recent events and fans each event out to local subscribers, toasting once
//! when any of them asked for notifications.

use crate::domain::{IntegrationError, PortfolioEvent};
use crate::ports::{EventSource, EventStream, Notifier};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay before every reconnect attempt. Fixed: no backoff, no jitter, no cap.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Events kept for late subscribers and status views.
pub const RECENT_EVENTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Subscriber {
    tx: mpsc::UnboundedSender<PortfolioEvent>,
    notify: bool,
}

pub struct EventStreamClient {
    source: Arc<dyn EventSource>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<ConnectionState>,
    recent: Mutex<VecDeque<PortfolioEvent>>,
    subscribers: Mutex<Vec<Subscriber>>,
    reconnect_delay: Duration,
}

impl EventStreamClient {
    pub fn new(source: Arc<dyn EventSource>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            source,
            notifier,
            state,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_EVENTS)),
            subscribers: Mutex::new(Vec::new()),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    /// Most recent events, newest first. Heartbeats are not kept.
    pub fn recent_events(&self) -> Vec<PortfolioEvent> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.iter().cloned().collect()
    }

    /// Receive every event from now on. An event toasts once when at least one
    /// subscriber that receives it has `notify` on.
    pub fn subscribe(&self, notify: bool) -> mpsc::UnboundedReceiver<PortfolioEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.push(Subscriber { tx, notify });
        rx
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_replace(next);
        debug!(state = ?next, "event stream state");
    }

    fn dispatch(&self, event: PortfolioEvent) {
        if !matches!(event, PortfolioEvent::Connected { .. }) {
            let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
            recent.push_front(event.clone());
            recent.truncate(RECENT_EVENTS);
        }

        let mut wants_toast = false;
        {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.retain(|sub| {
                let delivered = sub.tx.send(event.clone()).is_ok();
                wants_toast |= delivered && sub.notify;
                delivered
            });
        }
        // one toast per event, outside the lock so the notifier may subscribe
        if let (true, Some(text)) = (wants_toast, event.toast_text()) {
            self.notifier.toast(&text);
        }
    }

    /// Drain one connection until it ends or errors.
    async fn consume(&self, mut events: EventStream, shutdown: &CancellationToken) {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return,
                next = events.next() => next,
            };
            match next {
                Some(Ok(event)) => self.dispatch(event),
                Some(Err(e)) => {
                    warn!(error = %e, "event stream dropped");
                    return;
                }
                None => {
                    info!("event stream closed by server");
                    return;
                }
            }
        }
    }

    /// Connect, consume, and reconnect until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                res = self.source.connect() => res,
            };
            match connected {
                Ok(events) => {
                    self.set_state(ConnectionState::Connected);
                    self.consume(events, &shutdown).await;
                }
                Err(e) => warn!(error = %e, "event stream connect failed"),
            }
            self.set_state(ConnectionState::Disconnected);
            if shutdown.is_cancelled() {
                return;
            }
            info!(
                delay_secs = self.reconnect_delay.as_secs(),
                "reconnecting event stream"
            );
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }
}

/// Logs toasts instead of drawing them.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn toast(&self, text: &str) {
        info!(toast = text, "notification");
    }
}

/// One parsed Server-Sent Events frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE parser. Chunks may split lines or UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.data.is_empty() {
                    self.event = None;
                } else {
                    frames.push(SseFrame {
                        event: self.event.take(),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                continue;
            }
            // comment, used for keep-alive
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }
}

fn decode_frame(frame: SseFrame) -> Option<PortfolioEvent> {
    match serde_json::from_str::<PortfolioEvent>(&frame.data) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(event = ?frame.event, error = %e, "skipping undecodable event");
            None
        }
    }
}

/// `EventSource` over HTTP: `GET <url>` with `Accept: text/event-stream`.
pub struct HttpEventSource {
    client: Client,
    url: String,
}

impl HttpEventSource {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait::async_trait]
impl EventSource for HttpEventSource {
    async fn connect(&self) -> Result<EventStream, IntegrationError> {
        let res = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| IntegrationError::Stream {
                message: e.to_string(),
            })?;
        if !res.status().is_success() {
            return Err(IntegrationError::Stream {
                message: format!("server answered {}", res.status()),
            });
        }

        let mut parser = SseParser::default();
        let events = res
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => parser
                    .feed(&bytes)
                    .into_iter()
                    .filter_map(decode_frame)
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(IntegrationError::Stream {
                    message: e.to_string(),
                })],
            })
            .flat_map(stream::iter)
            .boxed();
        Ok(events)
    }
}
