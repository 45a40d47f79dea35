//! Scheduler — drains the work queue through the reconciler.
//!
//! Each worker task pops one due configuration key at a time. The queue
//! guarantees a given key is never in two workers at once, so distinct
//! configurations reconcile in parallel while each configuration stays
//! strictly sequential.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::reconciler::Reconciler;
use crate::workqueue::WorkQueue;

/// Runs reconciliation workers over a shared queue.
pub struct Scheduler {
    queue: WorkQueue,
    reconciler: Arc<Reconciler>,
}

impl Scheduler {
    pub fn new(queue: WorkQueue, reconciler: Arc<Reconciler>) -> Self {
        Self { queue, reconciler }
    }

    /// Run `workers` drain loops until the shutdown signal flips.
    pub async fn run(&self, workers: usize, shutdown: watch::Receiver<bool>) {
        info!(workers, "scheduler started");
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = self.queue.clone();
            let reconciler = self.reconciler.clone();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        key = queue.next() => {
                            match reconciler.reconcile(&key).await {
                                Ok(()) => queue.forget(&key),
                                Err(error) => {
                                    let delay = queue.requeue_with_backoff(&key);
                                    warn!(
                                        config = %key,
                                        %error,
                                        ?delay,
                                        "reconciliation failed, will retry"
                                    );
                                }
                            }
                            queue.done(&key);
                        }
                        _ = shutdown.changed() => {
                            debug!(worker, "scheduler worker stopping");
                            break;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        info!("scheduler stopped");
    }
}
