//! Latest-wins sequencing for type-ahead search.
//!
//! Each call starts a new generation and cancels the previous one, so a slow
//! response for an old term can never overwrite results for a newer term.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(250);
/// Shorter terms clear results instead of searching.
pub const MIN_TERM_LEN: usize = 2;

pub struct SearchSequencer {
    seq: AtomicU64,
    current: Mutex<CancellationToken>,
    debounce: Duration,
}

impl Default for SearchSequencer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl SearchSequencer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            seq: AtomicU64::new(0),
            current: Mutex::new(CancellationToken::new()),
            debounce,
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.cancel();
        *current = token.clone();
        (seq, token)
    }

    fn is_current(&self, seq: u64) -> bool {
        self.seq.load(Ordering::SeqCst) == seq
    }

    /// Debounce, then run `search` for `term`. `None` when the term is too short or
    /// a newer call superseded this one at any point.
    pub async fn run<F, Fut, T>(&self, term: &str, search: F) -> Option<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = T>,
    {
        let (seq, token) = self.begin();
        let term = term.trim();
        if term.chars().count() < MIN_TERM_LEN {
            return None;
        }

        tokio::select! {
            _ = token.cancelled() => {
                debug!(seq, "search superseded during debounce");
                return None;
            }
            _ = tokio::time::sleep(self.debounce) => {}
        }

        let result = tokio::select! {
            _ = token.cancelled() => None,
            out = search(term.to_string()) => Some(out),
        };

        if !self.is_current(seq) {
            debug!(seq, "dropping stale search result");
            return None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_newer_search_wins() {
        let seq = Arc::new(SearchSequencer::default());

        let slow = {
            let seq = Arc::clone(&seq);
            tokio::spawn(async move {
                seq.run("acme", |t| async move {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    t
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        let fast = seq.run("acme corp", |t| async move { t }).await;

        assert_eq!(fast.as_deref(), Some("acme corp"));
        assert_eq!(slow.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_drops_rapid_keystrokes() {
        let seq = Arc::new(SearchSequencer::default());
        let first = {
            let seq = Arc::clone(&seq);
            tokio::spawn(async move { seq.run("ac", |t| async move { t }).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = seq.run("acm", |t| async move { t }).await;
        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.as_deref(), Some("acm"));
    }

    #[tokio::test]
    async fn test_short_term_returns_none() {
        let seq = SearchSequencer::new(Duration::ZERO);
        assert_eq!(seq.run(" a ", |t| async move { t }).await, None);
    }
}
