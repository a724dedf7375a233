// src/queue/memory.rs
// =============================================================================
// In-process job queue.
//
// All state sits behind one mutex:
// - jobs: every job record we still hold, keyed by JobId
// - waiting: FIFO of ids ready to be claimed
// - paused / closed flags
//
// Retries: when a job fails and has attempts left it moves to `delayed`;
// a small timer task moves it back to `waiting` after the backoff.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ClaimedJob, CrawlJob, JobCounts, JobId, JobOptions, JobQueue, JobState, SubmitOutcome};
use crate::error::QueueError;

#[derive(Debug)]
struct JobRecord {
    job: CrawlJob,
    options: JobOptions,
    state: JobState,
    attempts_started: u32,
    failed_reason: Option<String>,
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobId, JobRecord>,
    waiting: VecDeque<JobId>,
    paused: bool,
    closed: bool,
}

impl QueueState {
    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }

    fn active_record(&mut self, id: &JobId) -> Result<&mut JobRecord, QueueError> {
        match self.jobs.get_mut(id) {
            Some(record) if record.state == JobState::Active => Ok(record),
            _ => Err(QueueError::UnknownJob(id.to_string())),
        }
    }
}

/// Queue that lives entirely in this process
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Mutex<QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Moves a delayed job back to waiting once its backoff has passed
    fn schedule_retry(&self, id: JobId, backoff: std::time::Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;

            let mut state = queue.lock();
            let ready = matches!(
                state.jobs.get(&id).map(|record| record.state),
                Some(JobState::Delayed)
            );
            if ready {
                if let Some(record) = state.jobs.get_mut(&id) {
                    record.state = JobState::Waiting;
                }
                state.waiting.push_back(id);
            }
        });
    }
}

// Inspection helpers for tests
#[cfg(test)]
impl MemoryQueue {
    /// Current state of a job, if the queue still holds it
    pub fn state_of(&self, id: &JobId) -> Option<JobState> {
        self.lock().jobs.get(id).map(|record| record.state)
    }

    /// Reason recorded for the last failed attempt of a job
    pub fn failed_reason(&self, id: &JobId) -> Option<String> {
        self.lock()
            .jobs
            .get(id)
            .and_then(|record| record.failed_reason.clone())
    }

    /// Number of job records held, in any state
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn pause(&self) -> Result<(), QueueError> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), QueueError> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.paused = false;
        Ok(())
    }

    async fn obliterate(&self) -> Result<(), QueueError> {
        let mut state = self.lock();
        state.ensure_open()?;

        let active = state
            .jobs
            .values()
            .filter(|record| record.state == JobState::Active)
            .count();
        if active > 0 {
            return Err(QueueError::ActiveJobs(active));
        }

        let removed = state.jobs.len();
        state.jobs.clear();
        state.waiting.clear();
        debug!(removed, "Queue obliterated");
        Ok(())
    }

    async fn submit(&self, job: CrawlJob, options: JobOptions) -> Result<SubmitOutcome, QueueError> {
        let mut state = self.lock();
        state.ensure_open()?;

        let id = job.id();
        if state.jobs.contains_key(&id) {
            return Ok(SubmitOutcome::Duplicate(id));
        }

        state.jobs.insert(
            id.clone(),
            JobRecord {
                job,
                options,
                state: JobState::Waiting,
                attempts_started: 0,
                failed_reason: None,
            },
        );
        state.waiting.push_back(id.clone());
        Ok(SubmitOutcome::Created(id))
    }

    async fn claim(&self) -> Result<Option<ClaimedJob>, QueueError> {
        let mut state = self.lock();
        state.ensure_open()?;

        if state.paused {
            return Ok(None);
        }

        while let Some(id) = state.waiting.pop_front() {
            let Some(record) = state.jobs.get_mut(&id) else {
                continue;
            };
            if record.state != JobState::Waiting {
                continue;
            }

            record.state = JobState::Active;
            record.attempts_started += 1;
            if let Some(reason) = &record.failed_reason {
                debug!(job_id = %id, attempt = record.attempts_started, last_error = %reason, "Retrying job");
            }
            return Ok(Some(ClaimedJob {
                id,
                job: record.job.clone(),
                attempt: record.attempts_started,
            }));
        }

        Ok(None)
    }

    async fn mark_completed(&self, id: &JobId) -> Result<(), QueueError> {
        let mut state = self.lock();
        let record = state.active_record(id)?;

        if record.options.remove_on_complete {
            state.jobs.remove(id);
        } else {
            record.state = JobState::Completed;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &JobId, reason: &str) -> Result<(), QueueError> {
        let retry_after = {
            let mut state = self.lock();
            let record = state.active_record(id)?;
            record.failed_reason = Some(reason.to_string());

            if record.attempts_started < record.options.attempts {
                record.state = JobState::Delayed;
                Some(record.options.backoff)
            } else if record.options.remove_on_fail {
                state.jobs.remove(id);
                None
            } else {
                record.state = JobState::Failed;
                None
            }
        };

        match retry_after {
            Some(backoff) => {
                debug!(job_id = %id, ?backoff, "Job failed, retrying after backoff");
                self.schedule_retry(id.clone(), backoff);
            }
            None => warn!(job_id = %id, reason, "Job failed permanently"),
        }
        Ok(())
    }

    async fn counts(&self) -> Result<JobCounts, QueueError> {
        let state = self.lock();
        state.ensure_open()?;

        let mut counts = JobCounts::default();
        for record in state.jobs.values() {
            match record.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Delayed => counts.delayed += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.lock().closed = true;
        Ok(())
    }
}
