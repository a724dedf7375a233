// src/error.rs
// =============================================================================
// Error types for the crawler core.
//
// Each concern gets its own enum so callers can match on what went wrong:
// - ConfigError: bad domain, start page, limit or link pattern
// - QueueError: the job substrate refused an operation
// - FetchError: a page could not be downloaded
//
// CrawlError wraps all three. The binary converts it into anyhow::Error at
// the very top (see main.rs).
// =============================================================================

use thiserror::Error;

/// Rejected crawl configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid domain format: '{0}'")]
    InvalidDomain(String),

    #[error("Invalid start page format: '{0}'")]
    InvalidStartPage(String),

    #[error("Invalid crawl limit {0} (use -1 for unbounded)")]
    InvalidLimit(i64),

    #[error("Invalid link pattern: {0}")]
    InvalidPattern(String),
}

/// Failures reported by the job queue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Obliterate refuses to run while jobs are being processed
    #[error("cannot obliterate queue: {0} job(s) still active")]
    ActiveJobs(usize),

    #[error("queue is closed")]
    Closed,

    #[error("unknown job {0}")]
    UnknownJob(String),
}

/// Failures while downloading a page
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("could not connect to {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Top-level crawl error
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// start() was called on a crawler that already ran
    #[error("crawler cannot start from state {0}")]
    InvalidState(&'static str),
}

impl CrawlError {
    /// True when the crawl never got going because the queue was not clean
    pub fn is_precondition(&self) -> bool {
        matches!(self, CrawlError::Queue(QueueError::ActiveJobs(_)))
    }
}
