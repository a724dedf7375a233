// src/crawl/drain.rs
// =============================================================================
// Decides whether a "drained" signal means the crawl is over.
//
// A drained signal only says that nothing is claimable right now. A job that
// just finished may have submitted children that have not been counted yet,
// so the monitor waits for a settling interval and then looks at the queue:
//
//   active + waiting + delayed == 0   ->  Finished
//   anything else                     ->  Continue (a later signal re-checks)
//
// The monitor never stops anything itself; the orchestrator acts on the
// decision.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::QueueError;
use crate::queue::{JobCounts, JobQueue};

/// Default wait between a drained signal and the completion check
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of one drain check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainDecision {
    /// Nothing left anywhere in the queue
    Finished(JobCounts),
    /// Jobs are still active, waiting or delayed
    Continue(JobCounts),
    /// Another check was already settling; this signal was ignored
    AlreadyChecking,
}

#[derive(Debug)]
pub struct DrainMonitor {
    settle_interval: Duration,
    checking: AtomicBool,
}

impl DrainMonitor {
    pub fn new(settle_interval: Duration) -> Self {
        Self {
            settle_interval,
            checking: AtomicBool::new(false),
        }
    }

    pub fn settle_interval(&self) -> Duration {
        self.settle_interval
    }

    /// Waits once, checks once, decides
    pub async fn check(&self, queue: &dyn JobQueue) -> Result<DrainDecision, QueueError> {
        if self.checking.swap(true, Ordering::AcqRel) {
            return Ok(DrainDecision::AlreadyChecking);
        }
        let _guard = CheckingGuard(&self.checking);

        let counts = self.settle_and_count(queue).await?;
        if counts.in_progress() == 0 {
            info!(completed = counts.completed, failed = counts.failed, "Queue settled with no outstanding jobs");
            Ok(DrainDecision::Finished(counts))
        } else {
            debug!(
                active = counts.active,
                waiting = counts.waiting,
                delayed = counts.delayed,
                "Jobs still outstanding after drain"
            );
            Ok(DrainDecision::Continue(counts))
        }
    }

    async fn settle_and_count(&self, queue: &dyn JobQueue) -> Result<JobCounts, QueueError> {
        tokio::time::sleep(self.settle_interval).await;
        queue.counts().await
    }
}

// Clears the in-flight flag even when a check is dropped mid-settle
struct CheckingGuard<'a>(&'a AtomicBool);

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for DrainMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_INTERVAL)
    }
}
