// src/crawl/frontier.rs
// =============================================================================
// The frontier: every URL admitted for crawling during the current run.
//
// Rules enforced by try_admit():
// - A URL is admitted at most once per run
// - Once the ledger holds crawl_limit entries, nothing new gets in
//   (jobs that are already queued still run to completion)
//
// The check and the insert happen under one lock, so two pages that
// discover the same URL at the same moment cannot both admit it.
// =============================================================================

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::config::CrawlLimit;

/// Shared ledger of admitted URLs
#[derive(Debug, Default)]
pub struct Frontier {
    limit: CrawlLimit,
    seen: Mutex<HashSet<String>>,
}

impl Frontier {
    pub fn new(limit: CrawlLimit) -> Self {
        Self {
            limit,
            seen: Mutex::new(HashSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admits `url` unless it was seen before or the limit has been reached
    pub fn try_admit(&self, url: &str) -> bool {
        let mut seen = self.lock();

        if seen.contains(url) || !self.limit.admits(seen.len()) {
            return false;
        }

        seen.insert(url.to_string())
    }

    /// Records a URL as visited regardless of the limit
    ///
    /// Normally a no-op because the URL was admitted before its job ran.
    pub fn mark_visited(&self, url: &str) {
        let mut seen = self.lock();
        if !seen.contains(url) {
            seen.insert(url.to_string());
        }
    }

    /// Takes back an admission whose job could not be submitted
    pub fn forget(&self, url: &str) -> bool {
        self.lock().remove(url)
    }

    /// Empties the ledger for a fresh run
    pub fn reset(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of every URL in the ledger
    pub fn snapshot(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.lock().iter().cloned().collect();
        urls.sort();
        urls
    }
}
