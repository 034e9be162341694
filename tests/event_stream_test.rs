use futures::stream::{self, StreamExt};
use portfolio_gateway::adapters::stream_client::{
    ConnectionState, EventStreamClient, RECENT_EVENTS, RECONNECT_DELAY,
};
use portfolio_gateway::domain::{
    HealthStatus, IntegrationError, PortfolioEvent, SourceKind, SourceRef, SourceSystem,
};
use portfolio_gateway::ports::{EventSource, EventStream, Notifier};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Scripted connections: each entry is either a connect failure or a finite list
/// of events after which the transport drops. When the script runs out, connect
/// hangs forever. Connecting and dropping each yield once, like real I/O, so state
/// watchers get to observe every transition.
#[derive(Default)]
struct ScriptedSource {
    script: Mutex<VecDeque<Option<Vec<PortfolioEvent>>>>,
    attempts: Mutex<Vec<Instant>>,
}

#[async_trait::async_trait]
impl EventSource for ScriptedSource {
    async fn connect(&self) -> Result<EventStream, IntegrationError> {
        self.attempts.lock().unwrap().push(Instant::now());
        tokio::task::yield_now().await;
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(events)) => {
                let items: Vec<Result<PortfolioEvent, IntegrationError>> =
                    events.into_iter().map(Ok).collect();
                let drop = stream::once(async {
                    tokio::task::yield_now().await;
                    Err(IntegrationError::Stream {
                        message: "connection reset".to_string(),
                    })
                });
                Ok(stream::iter(items).chain(drop).boxed())
            }
            Some(None) => Err(IntegrationError::Stream {
                message: "connection refused".to_string(),
            }),
            None => futures::future::pending().await,
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    toasts: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn toast(&self, text: &str) {
        self.toasts.lock().unwrap().push(text.to_string());
    }
}

fn health_change(id: &str) -> PortfolioEvent {
    PortfolioEvent::HealthChanged {
        account: SourceRef::new(SourceSystem::Metabase, SourceKind::Row, id),
        name: Some(format!("Operator {}", id)),
        from: HealthStatus::Healthy,
        to: HealthStatus::AtRisk,
        at: chrono::Utc::now(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_fixed_delay_without_backoff() {
    let source = Arc::new(ScriptedSource::default());
    {
        let mut script = source.script.lock().unwrap();
        script.push_back(None);
        script.push_back(None);
        script.push_back(None);
        script.push_back(Some(vec![PortfolioEvent::connected()]));
    }
    let client = Arc::new(EventStreamClient::new(
        source.clone(),
        Arc::new(RecordingNotifier::default()),
    ));
    let mut state = client.state();
    let shutdown = CancellationToken::new();

    let runner = {
        let client = Arc::clone(&client);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(shutdown).await })
    };

    // script exhausted: the fifth attempt hangs in connect
    tokio::time::sleep(RECONNECT_DELAY * 5 + Duration::from_millis(10)).await;

    let attempts = source.attempts.lock().unwrap().clone();
    assert_eq!(attempts.len(), 5);
    for pair in attempts.windows(2) {
        assert_eq!(pair[1] - pair[0], RECONNECT_DELAY);
    }
    assert_eq!(*state.borrow_and_update(), ConnectionState::Connecting);

    shutdown.cancel();
    runner.await.unwrap();
    assert_eq!(*state.borrow(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_fans_out_and_respects_notify_flag() {
    let source = Arc::new(ScriptedSource::default());
    source.script.lock().unwrap().push_back(Some(vec![
        PortfolioEvent::connected(),
        health_change("1"),
        health_change("2"),
    ]));
    let notifier = Arc::new(RecordingNotifier::default());
    let client = Arc::new(EventStreamClient::new(source, notifier.clone()));

    let mut loud = client.subscribe(true);
    let mut quiet = client.subscribe(false);
    let shutdown = CancellationToken::new();
    let runner = {
        let client = Arc::clone(&client);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(shutdown).await })
    };

    for _ in 0..3 {
        loud.recv().await.unwrap();
        quiet.recv().await.unwrap();
    }
    shutdown.cancel();
    runner.await.unwrap();

    // heartbeats never toast; only the notifying subscriber toasts
    assert_eq!(
        notifier.toasts.lock().unwrap().clone(),
        vec!["Operator 1 is now AtRisk", "Operator 2 is now AtRisk"]
    );
    let recent = client.recent_events();
    assert_eq!(recent.len(), 2);
    match &recent[0] {
        PortfolioEvent::HealthChanged { account, .. } => assert_eq!(account.id, "2"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(!client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_recent_events_capped() {
    let source = Arc::new(ScriptedSource::default());
    let events: Vec<PortfolioEvent> = (0..RECENT_EVENTS + 5)
        .map(|i| health_change(&i.to_string()))
        .collect();
    source.script.lock().unwrap().push_back(Some(events));
    let client = Arc::new(EventStreamClient::new(
        source,
        Arc::new(RecordingNotifier::default()),
    ));
    let mut rx = client.subscribe(false);
    let shutdown = CancellationToken::new();
    let runner = {
        let client = Arc::clone(&client);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(shutdown).await })
    };
    for _ in 0..RECENT_EVENTS + 5 {
        rx.recv().await.unwrap();
    }
    shutdown.cancel();
    runner.await.unwrap();

    let recent = client.recent_events();
    assert_eq!(recent.len(), RECENT_EVENTS);
    match &recent[0] {
        PortfolioEvent::HealthChanged { account, .. } => {
            assert_eq!(account.id, (RECENT_EVENTS + 4).to_string())
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_state_flag_reports_every_transition() {
    let source = Arc::new(ScriptedSource::default());
    {
        let mut script = source.script.lock().unwrap();
        script.push_back(Some(vec![PortfolioEvent::connected()]));
        script.push_back(Some(vec![PortfolioEvent::connected()]));
    }
    let client = Arc::new(EventStreamClient::new(
        source,
        Arc::new(RecordingNotifier::default()),
    ));
    assert_eq!(*client.state().borrow(), ConnectionState::Disconnected);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let mut state = client.state();
        let seen = Arc::clone(&seen);
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                seen.lock().unwrap().push(current);
            }
        })
    };
    let shutdown = CancellationToken::new();
    let runner = {
        let client = Arc::clone(&client);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(shutdown).await })
    };

    // two drops, then the third attempt hangs in connect
    tokio::time::sleep(RECONNECT_DELAY * 2 + Duration::from_millis(10)).await;
    shutdown.cancel();
    runner.await.unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    recorder.abort();

    use ConnectionState::*;
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![
            Connecting,
            Connected,
            Disconnected,
            Connecting,
            Connected,
            Disconnected,
            Connecting,
            Disconnected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_one_toast_per_event_with_several_notifying_subscribers() {
    let source = Arc::new(ScriptedSource::default());
    source
        .script
        .lock()
        .unwrap()
        .push_back(Some(vec![health_change("7")]));
    let notifier = Arc::new(RecordingNotifier::default());
    let client = Arc::new(EventStreamClient::new(source, notifier.clone()));

    let mut first = client.subscribe(true);
    let mut second = client.subscribe(true);
    let shutdown = CancellationToken::new();
    let runner = {
        let client = Arc::clone(&client);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(shutdown).await })
    };
    first.recv().await.unwrap();
    second.recv().await.unwrap();
    shutdown.cancel();
    runner.await.unwrap();

    assert_eq!(
        notifier.toasts.lock().unwrap().clone(),
        vec!["Operator 7 is now AtRisk"]
    );
}

/// Subscribes a new listener from inside the toast callback.
#[derive(Default)]
struct SubscribingNotifier {
    client: OnceLock<Arc<EventStreamClient>>,
    toasts: Mutex<usize>,
}

impl Notifier for SubscribingNotifier {
    fn toast(&self, _text: &str) {
        *self.toasts.lock().unwrap() += 1;
        if let Some(client) = self.client.get() {
            drop(client.subscribe(false));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_notifier_may_subscribe_during_toast() {
    let source = Arc::new(ScriptedSource::default());
    source
        .script
        .lock()
        .unwrap()
        .push_back(Some(vec![health_change("1"), health_change("2")]));
    let notifier = Arc::new(SubscribingNotifier::default());
    let client = Arc::new(EventStreamClient::new(source, notifier.clone()));
    assert!(notifier.client.set(Arc::clone(&client)).is_ok());

    let mut rx = client.subscribe(true);
    let shutdown = CancellationToken::new();
    let runner = {
        let client = Arc::clone(&client);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { client.run(shutdown).await })
    };
    rx.recv().await.unwrap();
    rx.recv().await.unwrap();
    shutdown.cancel();
    runner.await.unwrap();

    assert_eq!(*notifier.toasts.lock().unwrap(), 2);
}
