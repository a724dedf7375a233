// src/queue/worker.rs
// =============================================================================
// Worker pool that executes queued jobs.
//
// Each slot runs the same loop:
// 1. Claim the next job from the queue
// 2. Run the handler on it
// 3. Mark the job completed or failed
// 4. When nothing can be claimed, sleep for poll_interval and try again
//
// The "drained" signal: a slot that was busy and then finds nothing to claim
// raises a notification. The notification holds at most one pending permit,
// so bursts of signals from several slots collapse into one wake-up.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CrawlJob, JobQueue};
use crate::error::QueueError;

/// Runs one job; an Err marks the job as failed
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &CrawlJob) -> anyhow::Result<()>;
}

/// Settings for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of jobs processed at the same time
    pub concurrency: usize,
    /// How long an idle slot waits before polling again
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Running pool of worker slots
pub struct Worker {
    cancel: CancellationToken,
    drained: Arc<Notify>,
    slots: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Starts `config.concurrency` slots on the current runtime
    pub fn spawn(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let drained = Arc::new(Notify::new());

        let slots = (0..config.concurrency.max(1))
            .map(|slot| {
                tokio::spawn(run_slot(
                    slot,
                    Arc::clone(&queue),
                    Arc::clone(&handler),
                    config.poll_interval,
                    Arc::clone(&drained),
                    cancel.clone(),
                ))
            })
            .collect();

        info!(concurrency = config.concurrency.max(1), "Worker started");

        Self {
            cancel,
            drained,
            slots,
        }
    }

    /// Waits for the next "drained" signal
    pub async fn drained(&self) {
        self.drained.notified().await;
    }

    /// Stops every slot and waits for them to exit
    ///
    /// A slot that is in the middle of a job finishes that job first.
    pub async fn close(self) {
        self.cancel.cancel();
        for result in join_all(self.slots).await {
            if let Err(e) = result {
                error!(error = %e, "Worker slot panicked");
            }
        }
        info!("Worker closed");
    }
}

async fn run_slot(
    slot: usize,
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
    drained: Arc<Notify>,
    cancel: CancellationToken,
) {
    // Starts out "busy" so that a slot which never finds work still reports
    // the empty queue once.
    let mut busy = true;

    while !cancel.is_cancelled() {
        match queue.claim().await {
            Ok(Some(claimed)) => {
                busy = true;
                debug!(slot, job_id = %claimed.id, url = %claimed.job.url, attempt = claimed.attempt, "Processing job");

                let outcome = match handler.handle(&claimed.job).await {
                    Ok(()) => queue.mark_completed(&claimed.id).await,
                    Err(e) => {
                        warn!(slot, url = %claimed.job.url, error = %e, "Job failed");
                        queue.mark_failed(&claimed.id, &e.to_string()).await
                    }
                };

                if let Err(e) = outcome {
                    warn!(slot, job_id = %claimed.id, error = %e, "Could not record job outcome");
                }
            }
            Ok(None) => {
                if busy {
                    busy = false;
                    debug!(slot, "Queue drained");
                    drained.notify_one();
                }
                idle(poll_interval, &cancel).await;
            }
            Err(QueueError::Closed) => break,
            Err(e) => {
                warn!(slot, error = %e, "Could not claim job");
                idle(poll_interval, &cancel).await;
            }
        }
    }

    debug!(slot, "Worker slot stopped");
}

async fn idle(poll_interval: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(poll_interval) => {}
    }
}
