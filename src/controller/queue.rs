//! Per-controller work queue
//!
//! Holds the object keys waiting for a reconcile. The queue coalesces:
//! a key that is already queued, or currently being processed, is never
//! enqueued a second time. Events that arrive while a key is in flight
//! mark it dirty, and completing the in-flight reconcile re-queues it
//! exactly once. This guarantees at most one in-flight reconcile per
//! object key at any time.

use crate::kube::ObjectKey;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    in_flight: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
}

/// Coalescing work queue of object keys
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, coalescing against queued and in-flight entries
    ///
    /// Returns true if the key was actually added to the pending list.
    pub fn enqueue(&self, key: ObjectKey) -> bool {
        let mut state = self.state.lock().expect("work queue poisoned");
        if state.in_flight.contains(&key) {
            // Reconcile again after the in-flight one completes.
            state.dirty.insert(key);
            return false;
        }
        if state.queued.contains(&key) {
            return false;
        }
        state.queued.insert(key.clone());
        state.pending.push_back(key);
        self.notify.notify_one();
        true
    }

    /// Take the next key, marking it in flight
    ///
    /// Waits until a key is available; returns `None` once the
    /// cancellation token fires and the queue should stop.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<ObjectKey> {
        loop {
            {
                let mut state = self.state.lock().expect("work queue poisoned");
                if let Some(key) = state.pending.pop_front() {
                    state.queued.remove(&key);
                    state.in_flight.insert(key.clone());
                    return Some(key);
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    /// Mark an in-flight key finished
    ///
    /// If events arrived for the key while it was processing, it is
    /// re-queued exactly once.
    pub fn done(&self, key: &ObjectKey) {
        let mut state = self.state.lock().expect("work queue poisoned");
        state.in_flight.remove(key);
        if state.dirty.remove(key) && !state.queued.contains(key) {
            state.queued.insert(key.clone());
            state.pending.push_back(key.clone());
            self.notify.notify_one();
        }
    }

    /// Number of keys waiting (excludes in-flight)
    pub fn len(&self) -> usize {
        self.state.lock().expect("work queue poisoned").pending.len()
    }

    /// Whether no keys are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::ObjectKind;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::namespaced(ObjectKind::Deployment, "prod", name)
    }

    #[tokio::test]
    async fn test_enqueue_pop_done() {
        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();

        assert!(queue.enqueue(key("web")));
        let popped = queue.pop(&cancel).await.unwrap();
        assert_eq!(popped, key("web"));
        queue.done(&popped);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_queued_key_is_deduplicated() {
        let queue = WorkQueue::new();
        assert!(queue.enqueue(key("web")));
        assert!(!queue.enqueue(key("web")));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_events_coalesce_to_one_requeue() {
        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();

        queue.enqueue(key("web"));
        let popped = queue.pop(&cancel).await.unwrap();

        // Three rapid events while the reconcile is in flight
        assert!(!queue.enqueue(key("web")));
        assert!(!queue.enqueue(key("web")));
        assert!(!queue.enqueue(key("web")));
        assert!(queue.is_empty());

        // Completing the in-flight reconcile yields exactly one follow-up
        queue.done(&popped);
        assert_eq!(queue.len(), 1);

        let again = queue.pop(&cancel).await.unwrap();
        queue.done(&again);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let queue = WorkQueue::new();
        queue.enqueue(key("web"));
        queue.enqueue(key("api"));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_pop_returns_none_on_cancel() {
        let queue = WorkQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(queue.pop(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(WorkQueue::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop(&cancel).await })
        };

        tokio::task::yield_now().await;
        queue.enqueue(key("web"));
        let popped = waiter.await.unwrap();
        assert_eq!(popped, Some(key("web")));
    }
}
