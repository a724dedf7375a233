// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every flag can also come from an environment variable (CRAWLER_*), which
// is handy when the crawler runs in a container.
//
// The raw values are turned into a CrawlConfig (what to crawl) and
// CrawlerSettings (how to run it). Validation of the domain, start page and
// limit lives in config.rs.
// =============================================================================

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::{CrawlConfig, LinkPattern};
use crate::crawl::CrawlerSettings;
use crate::error::ConfigError;
use crate::queue::{JobOptions, WorkerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "domain-crawler",
    version,
    about = "Crawl every page of one domain, breadth-first",
    long_about = "domain-crawler starts from one page, follows every https link that stays on the \
                  target domain, and prints the set of visited URLs once the crawl has drained."
)]
pub struct Cli {
    /// The domain to crawl (e.g. example.com); a leading http(s):// is stripped
    #[arg(long, env = "CRAWLER_DOMAIN")]
    pub domain: String,

    /// Number of pages to admit before no more jobs are added (-1 = no limit)
    ///
    /// Not a hard stop: jobs already queued when the limit is reached still run.
    #[arg(long, env = "CRAWLER_LIMIT", allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// The page to start from (default: https://{domain})
    #[arg(long, env = "CRAWLER_START_PAGE")]
    pub start_page: Option<String>,

    /// Pages fetched at the same time
    #[arg(long, env = "CRAWLER_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Seconds to wait after the queue drains before deciding the crawl is done
    #[arg(long, env = "CRAWLER_SETTLE_SECS", default_value_t = 10)]
    pub settle_secs: u64,

    /// Milliseconds an idle worker waits before polling the queue again
    #[arg(long, env = "CRAWLER_POLL_MS", default_value_t = 100)]
    pub poll_ms: u64,

    /// Attempts per page before its job is discarded
    #[arg(long, env = "CRAWLER_ATTEMPTS", default_value_t = 1)]
    pub attempts: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "CRAWLER_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// How links are found in a page
    #[arg(long, value_enum, default_value_t = MatcherKind::Regex)]
    pub matcher: MatcherKind,

    /// Custom regex for the regex matcher
    #[arg(long, env = "CRAWLER_LINK_PATTERN", conflicts_with = "matcher")]
    pub link_pattern: Option<String>,

    /// Output results in JSON format instead of tables
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherKind {
    /// One regex over the raw page text
    Regex,
    /// href attributes of <a> tags
    Anchors,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Cli {
    /// What to crawl
    pub fn crawl_config(&self) -> Result<CrawlConfig, ConfigError> {
        let pattern = match (self.matcher, &self.link_pattern) {
            (_, Some(custom)) => LinkPattern::Regex(custom.clone()),
            (MatcherKind::Anchors, None) => LinkPattern::Anchors,
            (MatcherKind::Regex, None) => LinkPattern::default(),
        };

        Ok(CrawlConfig::new(&self.domain, self.start_page.as_deref(), self.limit)?
            .with_link_pattern(pattern))
    }

    /// How to run the crawl
    pub fn settings(&self) -> CrawlerSettings {
        CrawlerSettings {
            worker: WorkerConfig {
                concurrency: self.concurrency.max(1),
                poll_interval: Duration::from_millis(self.poll_ms),
            },
            settle_interval: Duration::from_secs(self.settle_secs),
            job_options: JobOptions {
                attempts: self.attempts.max(1),
                ..JobOptions::default()
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
