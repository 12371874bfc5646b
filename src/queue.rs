//! Ordered event queue for callback delivery and signaling emission
//!
//! All externally observable completions (success/failure callbacks,
//! subscribe-readiness resolution) and all outbound signaling sends run on a
//! single queue in strict submission order. User callbacks therefore never
//! execute inside the API call that registered them or inside a
//! transport-callback stack frame, and candidate messages posted in
//! generation order leave in generation order.

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum Task {
    Run(Box<dyn FnOnce() + Send>),
    Await(BoxFuture<'static, ()>),
    Barrier(oneshot::Sender<()>),
}

/// Single-consumer ordered task queue.
///
/// Cloning shares the same underlying queue. Tasks posted after the owning
/// runtime shuts down are silently dropped.
#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl EventQueue {
    /// Create a queue and spawn its drain loop on the current runtime
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                match task {
                    Task::Run(f) => f(),
                    Task::Await(fut) => fut.await,
                    Task::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("event queue drained and closed");
        });
        Self { tx }
    }

    /// Schedule a synchronous task
    pub fn post(&self, f: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Task::Run(Box::new(f)));
    }

    /// Schedule an async task; the queue awaits it before running later tasks
    pub fn post_async(&self, fut: BoxFuture<'static, ()>) {
        let _ = self.tx.send(Task::Await(fut));
    }

    /// Wait until every task posted before this call has completed
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Task::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let queue = EventQueue::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..10 {
            let log = Arc::clone(&log);
            queue.post(move || log.lock().push(i));
        }
        queue.flush().await;
        assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn async_tasks_serialize_with_sync_tasks() {
        let queue = EventQueue::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let l1 = Arc::clone(&log);
        queue.post(move || l1.lock().push("a"));
        let l2 = Arc::clone(&log);
        queue.post_async(Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            l2.lock().push("b");
        }));
        let l3 = Arc::clone(&log);
        queue.post(move || l3.lock().push("c"));
        queue.flush().await;
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn flush_is_a_barrier() {
        let queue = EventQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            queue.post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        queue.flush().await;
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }
}
