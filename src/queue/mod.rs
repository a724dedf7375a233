// src/queue/mod.rs
// =============================================================================
// The job queue the crawler runs on.
//
// The crawl core only needs a handful of operations from its queue:
// pause, obliterate (wipe everything), submit by id, count by state, close.
// Workers additionally claim jobs and report how they ended.
//
// Submodules:
// - memory: in-process JobQueue implementation
// - worker: pool of slots that claims jobs and raises the "drained" signal
// =============================================================================

mod memory;
mod worker;

pub use memory::MemoryQueue;
pub use worker::{JobHandler, Worker, WorkerConfig};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::QueueError;

/// Stable job identity: hex SHA-256 of the URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn for_url(url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        JobId(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of one crawl job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub url: String,
}

impl CrawlJob {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn id(&self) -> JobId {
        JobId::for_url(&self.url)
    }
}

/// Per-job retention and retry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    /// Drop the job record once it succeeds
    pub remove_on_complete: bool,
    /// Drop the job record once it has failed for good
    pub remove_on_fail: bool,
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Time spent in `delayed` between attempts
    pub backoff: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            remove_on_complete: false,
            remove_on_fail: true,
            attempts: 1,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Where a job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
}

/// What submit() did with a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new job was queued
    Created(JobId),
    /// A job with this id already exists; nothing changed
    Duplicate(JobId),
}

impl SubmitOutcome {
    pub fn job_id(&self) -> &JobId {
        match self {
            SubmitOutcome::Created(id) | SubmitOutcome::Duplicate(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SubmitOutcome::Created(_))
    }
}

/// Number of jobs in each state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub active: usize,
    pub waiting: usize,
    pub delayed: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobCounts {
    /// Jobs that may still produce work
    pub fn in_progress(&self) -> usize {
        self.active + self.waiting + self.delayed
    }
}

/// A job handed to a worker slot
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: JobId,
    pub job: CrawlJob,
    /// 1 on the first attempt
    pub attempt: u32,
}

/// Operations the crawler and its workers need from a queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Stop handing out jobs
    async fn pause(&self) -> Result<(), QueueError>;

    /// Hand out jobs again
    async fn resume(&self) -> Result<(), QueueError>;

    /// Remove every job in every state
    ///
    /// Fails with `QueueError::ActiveJobs` while any job is active.
    async fn obliterate(&self) -> Result<(), QueueError>;

    /// Queue `job` under its URL-derived id
    ///
    /// Submitting an id that already exists is a no-op reported as
    /// `SubmitOutcome::Duplicate`.
    async fn submit(&self, job: CrawlJob, options: JobOptions) -> Result<SubmitOutcome, QueueError>;

    /// Take the next waiting job, if any, and mark it active
    async fn claim(&self) -> Result<Option<ClaimedJob>, QueueError>;

    async fn mark_completed(&self, id: &JobId) -> Result<(), QueueError>;

    /// Record a failed attempt; the queue decides between retry and discard
    async fn mark_failed(&self, id: &JobId, reason: &str) -> Result<(), QueueError>;

    async fn counts(&self) -> Result<JobCounts, QueueError>;

    /// Release the queue; later calls fail with `QueueError::Closed`
    async fn close(&self) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_is_deterministic() {
        let a = CrawlJob::new("https://example.com/page").id();
        let b = JobId::for_url("https://example.com/page");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_job_id_differs_per_url() {
        assert_ne!(
            JobId::for_url("https://example.com/a"),
            JobId::for_url("https://example.com/b")
        );
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        assert_eq!(
            JobId::for_url("abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_in_progress_ignores_finished_jobs() {
        let counts = JobCounts {
            active: 1,
            waiting: 2,
            delayed: 3,
            completed: 10,
            failed: 4,
        };
        assert_eq!(counts.in_progress(), 6);
    }
}
