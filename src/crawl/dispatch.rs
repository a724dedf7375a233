// src/crawl/dispatch.rs
// =============================================================================
// Turns accepted URLs into queued jobs.
//
// admit() is the only way a URL enters the crawl:
//   frontier.try_admit(url)  ->  submit(url)
// A URL is never queued without being in the frontier, and never left in
// the frontier without a queued job (a failed submit takes it back out).
// =============================================================================

use std::sync::Arc;

use tracing::debug;

use super::frontier::Frontier;
use crate::error::QueueError;
use crate::queue::{CrawlJob, JobOptions, JobQueue, SubmitOutcome};

pub struct Dispatcher {
    frontier: Arc<Frontier>,
    queue: Arc<dyn JobQueue>,
    options: JobOptions,
}

impl Dispatcher {
    /// `options` are applied to every submitted job
    pub fn new(frontier: Arc<Frontier>, queue: Arc<dyn JobQueue>, options: JobOptions) -> Self {
        Self {
            frontier,
            queue,
            options,
        }
    }

    /// Admits `url` into the frontier and queues its job
    ///
    /// Returns Ok(false) when the frontier turned the URL away.
    ///
    /// The rollback after a failed submit is not atomic with the admission:
    /// a concurrent admit of the same URL that ran in between was already
    /// rejected as a duplicate, so that URL stays out of this run.
    pub async fn admit(&self, url: &str) -> Result<bool, QueueError> {
        if !self.frontier.try_admit(url) {
            return Ok(false);
        }

        match self.submit(url).await {
            Ok(_) => Ok(true),
            Err(e) => {
                self.frontier.forget(url);
                Err(e)
            }
        }
    }

    /// Pushes the job for `url`, keyed by the hash of the URL
    pub async fn submit(&self, url: &str) -> Result<SubmitOutcome, QueueError> {
        let outcome = self
            .queue
            .submit(CrawlJob::new(url), self.options.clone())
            .await?;

        debug!(url, job_id = %outcome.job_id(), created = outcome.is_created(), "Job submitted");
        Ok(outcome)
    }
}
