use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error};

/// A finalized utterance waiting for its turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Trimmed, never empty
    pub text: String,
    /// Session the query belongs to, captured at enqueue time
    pub session_id: String,
    /// Epoch milliseconds at which the final transcript arrived
    pub final_received_at: i64,
}

impl Query {
    /// `None` when `text` is empty after trimming
    pub fn from_final(text: &str, session_id: &str, final_received_at: i64) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            session_id: session_id.to_string(),
            final_received_at,
        })
    }
}

/// Runs one turn. Must report its own failures; it cannot fail the queue.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn handle(&self, query: Query);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Processing,
    Closed,
}

struct Inner {
    pending: VecDeque<Query>,
    state: QueueState,
}

/// FIFO of queries with at most one turn in flight.
///
/// A worker task exists only while the queue is `Processing`; it is spawned on
/// the `Idle -> Processing` transition and drains the queue before going back
/// to `Idle`. `Closed` is terminal.
#[derive(Clone)]
pub struct QueryQueue {
    inner: Arc<Mutex<Inner>>,
    handler: Arc<dyn QueryHandler>,
}

impl QueryQueue {
    pub fn new(handler: Arc<dyn QueryHandler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: VecDeque::new(),
                state: QueueState::Idle,
            })),
            handler,
        }
    }

    /// Append `query`, starting the worker if none is running.
    ///
    /// Returns `false` when the queue is closed and the query was discarded.
    pub fn enqueue(&self, query: Query) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            QueueState::Closed => {
                debug!("Dropping query for closed queue");
                false
            }
            QueueState::Processing => {
                inner.pending.push_back(query);
                true
            }
            QueueState::Idle => {
                inner.pending.push_back(query);
                inner.state = QueueState::Processing;
                drop(inner);

                tokio::spawn(Self::run(self.inner.clone(), self.handler.clone()));
                true
            }
        }
    }

    /// Drop every pending query. A turn already in flight completes.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.pending.len();
        inner.pending.clear();
        if dropped > 0 {
            debug!("Cleared {} pending queries", dropped);
        }
    }

    /// Clear and reject all future queries
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.pending.clear();
        inner.state = QueueState::Closed;
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.lock().state == QueueState::Processing
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().state == QueueState::Closed
    }

    async fn run(inner: Arc<Mutex<Inner>>, handler: Arc<dyn QueryHandler>) {
        loop {
            let next = {
                let mut guard = inner.lock();
                if guard.state == QueueState::Closed {
                    break;
                }
                match guard.pending.pop_front() {
                    Some(query) => query,
                    None => {
                        guard.state = QueueState::Idle;
                        break;
                    }
                }
            };

            // a panicking turn must not stall the queue
            let handler = handler.clone();
            if let Err(e) = tokio::spawn(async move { handler.handle(next).await }).await {
                error!("Turn task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        handled: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl QueryHandler for RecordingHandler {
        async fn handle(&self, query: Query) {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if query.text == "panic" {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("turn exploded");
            }
            self.handled.lock().push(query.text);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn query(text: &str) -> Query {
        Query::from_final(text, "s1", 0).unwrap()
    }

    async fn wait_idle(queue: &QueryQueue) {
        for _ in 0..200 {
            if !queue.is_processing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue never went idle");
    }

    #[test]
    fn test_query_from_final_trims_and_rejects_empty() {
        let q = Query::from_final("  book a table  ", "s1", 42).unwrap();
        assert_eq!(q.text, "book a table");
        assert_eq!(q.session_id, "s1");
        assert_eq!(q.final_received_at, 42);

        assert!(Query::from_final("", "s1", 0).is_none());
        assert!(Query::from_final(" \n\t ", "s1", 0).is_none());
    }

    #[tokio::test]
    async fn test_queries_run_in_order_one_at_a_time() {
        let handler = Arc::new(RecordingHandler {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let queue = QueryQueue::new(handler.clone());

        for text in ["first", "second", "third"] {
            assert!(queue.enqueue(query(text)));
        }
        assert!(queue.is_processing());

        wait_idle(&queue).await;
        assert_eq!(*handler.handled.lock(), vec!["first", "second", "third"]);
        assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_clear_keeps_in_flight_turn() {
        let handler = Arc::new(RecordingHandler {
            delay: Duration::from_millis(40),
            ..Default::default()
        });
        let queue = QueryQueue::new(handler.clone());

        queue.enqueue(query("in flight"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(query("pending one"));
        queue.enqueue(query("pending two"));
        assert_eq!(queue.pending_len(), 2);

        queue.clear();
        wait_idle(&queue).await;
        assert_eq!(*handler.handled.lock(), vec!["in flight"]);

        // usable again after clear
        queue.enqueue(query("after clear"));
        wait_idle(&queue).await;
        assert_eq!(handler.handled.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_queries() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = QueryQueue::new(handler.clone());

        queue.close();
        assert!(queue.is_closed());
        assert!(!queue.enqueue(query("too late")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handler.handled.lock().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_turn_does_not_stall_queue() {
        let handler = Arc::new(RecordingHandler::default());
        let queue = QueryQueue::new(handler.clone());

        queue.enqueue(query("panic"));
        queue.enqueue(query("next"));

        wait_idle(&queue).await;
        assert_eq!(*handler.handled.lock(), vec!["next"]);
    }
}
