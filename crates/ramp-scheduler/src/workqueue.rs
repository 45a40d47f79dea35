//! Delayed, deduplicating work queue keyed by configuration.
//!
//! Delivery guarantees:
//!
//! - at most one task per key is in progress at any time
//! - pending entries for the same key coalesce; the earliest due time wins
//! - a key re-enqueued while in flight is delivered again once the
//!   current run finishes (the latest wake wins, never a parallel one)
//! - a zero delay means "as soon as a worker is free"

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::trace;

use ramp_core::ObjectKey;

/// Base delay for error retries; doubles per consecutive failure.
const RETRY_BASE: Duration = Duration::from_millis(200);
/// Ceiling for error retries.
const RETRY_MAX: Duration = Duration::from_secs(60);

#[derive(Default)]
struct QueueState {
    /// Keys awaiting delivery, by due instant.
    pending: HashMap<ObjectKey, Instant>,
    /// Keys currently being processed.
    in_flight: HashSet<ObjectKey>,
    /// Consecutive failures per key.
    retries: HashMap<ObjectKey, u32>,
}

/// Shared handle to the queue; cheap to clone across tasks.
#[derive(Clone, Default)]
pub struct WorkQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule delivery of `key` as soon as a worker is free.
    pub fn enqueue(&self, key: &ObjectKey) {
        self.enqueue_after(key, Duration::ZERO);
    }

    /// Schedule delivery of `key` after `delay`.
    pub fn enqueue_after(&self, key: &ObjectKey, delay: Duration) {
        let due = Instant::now() + delay;
        {
            let mut state = self.lock();
            let entry = state.pending.entry(key.clone()).or_insert(due);
            if due < *entry {
                *entry = due;
            }
        }
        trace!(%key, ?delay, "enqueued");
        self.notify.notify_waiters();
    }

    /// Wait for the next due key and mark it in flight.
    ///
    /// The caller must pass the key back to [`WorkQueue::done`] when the
    /// work finishes, successfully or not.
    pub async fn next(&self) -> ObjectKey {
        loop {
            // Register interest before inspecting state, so an enqueue
            // racing with the scan cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = {
                let mut state = self.lock();
                let now = Instant::now();
                let candidate = {
                    let QueueState {
                        pending, in_flight, ..
                    } = &mut *state;
                    pending
                        .iter()
                        .filter(|(key, _)| !in_flight.contains(*key))
                        .min_by_key(|(_, due)| **due)
                        .map(|(key, due)| (key.clone(), *due))
                };
                match candidate {
                    Some((key, due)) if due <= now => {
                        state.pending.remove(&key);
                        state.in_flight.insert(key.clone());
                        return key;
                    }
                    Some((_, due)) => Some(due - now),
                    None => None,
                }
            };

            match wait {
                Some(delay) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = &mut notified => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Mark a key's in-flight work finished, re-arming any delivery that
    /// was requested while it ran.
    pub fn done(&self, key: &ObjectKey) {
        let rearm = {
            let mut state = self.lock();
            state.in_flight.remove(key);
            state.pending.contains_key(key)
        };
        if rearm {
            self.notify.notify_waiters();
        }
    }

    /// Schedule a retry with exponential backoff. Returns the delay used.
    pub fn requeue_with_backoff(&self, key: &ObjectKey) -> Duration {
        let attempts = {
            let mut state = self.lock();
            let attempts = state.retries.entry(key.clone()).or_insert(0);
            *attempts += 1;
            *attempts
        };
        let shift = (attempts - 1).min(16);
        let delay = RETRY_BASE.saturating_mul(1 << shift).min(RETRY_MAX);
        self.enqueue_after(key, delay);
        delay
    }

    /// Clear a key's failure history after a successful run.
    pub fn forget(&self, key: &ObjectKey) {
        self.lock().retries.remove(key);
    }

    /// Number of keys awaiting delivery.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().expect("work queue poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    async fn next_within(queue: &WorkQueue, limit: Duration) -> Option<ObjectKey> {
        timeout(limit, queue.next()).await.ok()
    }

    #[tokio::test]
    async fn enqueue_then_next_delivers() {
        let queue = WorkQueue::new();
        queue.enqueue(&key("a"));

        let got = next_within(&queue, Duration::from_secs(1)).await;
        assert_eq!(got, Some(key("a")));
        queue.done(&key("a"));
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn duplicate_pending_entries_coalesce() {
        let queue = WorkQueue::new();
        queue.enqueue(&key("a"));
        queue.enqueue(&key("a"));
        assert_eq!(queue.pending_len(), 1);

        let got = next_within(&queue, Duration::from_secs(1)).await;
        assert_eq!(got, Some(key("a")));
        queue.done(&key("a"));

        // Nothing left to deliver.
        assert!(next_within(&queue, Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test]
    async fn earlier_enqueue_pulls_the_due_time_forward() {
        let queue = WorkQueue::new();
        queue.enqueue_after(&key("a"), Duration::from_secs(30));
        queue.enqueue(&key("a"));

        let got = next_within(&queue, Duration::from_millis(200)).await;
        assert_eq!(got, Some(key("a")));
    }

    #[tokio::test]
    async fn later_enqueue_does_not_push_the_due_time_back() {
        let queue = WorkQueue::new();
        queue.enqueue_after(&key("a"), Duration::from_millis(50));
        queue.enqueue_after(&key("a"), Duration::from_secs(30));

        let got = next_within(&queue, Duration::from_millis(500)).await;
        assert_eq!(got, Some(key("a")));
    }

    #[tokio::test]
    async fn delayed_delivery_waits_for_the_due_time() {
        let queue = WorkQueue::new();
        let start = Instant::now();
        queue.enqueue_after(&key("a"), Duration::from_millis(120));

        let got = next_within(&queue, Duration::from_secs(2)).await;
        assert_eq!(got, Some(key("a")));
        assert!(start.elapsed() >= Duration::from_millis(110));
    }

    #[tokio::test]
    async fn in_flight_key_is_not_delivered_twice() {
        let queue = WorkQueue::new();
        queue.enqueue(&key("a"));
        let first = next_within(&queue, Duration::from_secs(1)).await;
        assert_eq!(first, Some(key("a")));

        // Re-enqueued while in flight: held back until done().
        queue.enqueue(&key("a"));
        assert!(next_within(&queue, Duration::from_millis(50)).await.is_none());

        queue.done(&key("a"));
        let second = next_within(&queue, Duration::from_secs(1)).await;
        assert_eq!(second, Some(key("a")));
        queue.done(&key("a"));
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let queue = WorkQueue::new();
        queue.enqueue(&key("a"));
        queue.enqueue(&key("b"));

        let first = next_within(&queue, Duration::from_secs(1)).await.unwrap();
        let second = next_within(&queue, Duration::from_secs(1)).await.unwrap();
        let mut names = [first.name, second.name];
        names.sort();
        assert_eq!(names, ["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn backoff_grows_until_forgotten() {
        let queue = WorkQueue::new();
        let first = queue.requeue_with_backoff(&key("a"));
        let second = queue.requeue_with_backoff(&key("a"));
        let third = queue.requeue_with_backoff(&key("a"));
        assert_eq!(first, RETRY_BASE);
        assert_eq!(second, RETRY_BASE * 2);
        assert_eq!(third, RETRY_BASE * 4);

        queue.forget(&key("a"));
        assert_eq!(queue.requeue_with_backoff(&key("a")), RETRY_BASE);
    }

    #[tokio::test]
    async fn backoff_is_capped() {
        let queue = WorkQueue::new();
        let mut delay = Duration::ZERO;
        for _ in 0..24 {
            delay = queue.requeue_with_backoff(&key("a"));
        }
        assert_eq!(delay, RETRY_MAX);
    }
}
