// src/config.rs
// =============================================================================
// Crawl configuration.
//
// CrawlConfig is built once, before the crawl starts, and never changes:
// - target_domain: lowercase host, no scheme (e.g. "example.com")
// - start_page: absolute URL, defaults to https://{target_domain}
// - crawl_limit: how many URLs may ever be admitted (-1 = no limit)
// - link_pattern: which matcher finds URLs in a page body
//
// The command line (cli.rs) is the usual producer, but the checks live here
// so that any caller gets the same validation.
// =============================================================================

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use url::Url;

use crate::crawl::{AnchorMatcher, LinkMatcher, RegexMatcher, DEFAULT_LINK_PATTERN};
use crate::error::ConfigError;

// Hostname rule: dot-separated labels of letters, digits and inner hyphens
const DOMAIN_PATTERN: &str =
    r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]$";

fn domain_regex() -> &'static Regex {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN.get_or_init(|| Regex::new(DOMAIN_PATTERN).expect("domain pattern is valid"))
}

/// Upper bound on the number of URLs admitted during one crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlLimit {
    #[default]
    Unbounded,
    Max(usize),
}

impl CrawlLimit {
    /// Converts the raw command-line value; -1 means unbounded
    pub fn from_raw(raw: i64) -> Result<Self, ConfigError> {
        match raw {
            -1 => Ok(CrawlLimit::Unbounded),
            n if n >= 0 => Ok(CrawlLimit::Max(n as usize)),
            n => Err(ConfigError::InvalidLimit(n)),
        }
    }

    /// Whether a ledger of `size` entries may still grow
    pub fn admits(&self, size: usize) -> bool {
        match self {
            CrawlLimit::Unbounded => true,
            CrawlLimit::Max(max) => size < *max,
        }
    }
}

impl fmt::Display for CrawlLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlLimit::Unbounded => write!(f, "none"),
            CrawlLimit::Max(n) => write!(f, "{}", n),
        }
    }
}

/// Which strategy pulls candidate URLs out of a page body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPattern {
    /// One regex over the raw text
    Regex(String),
    /// href values of <a> elements
    Anchors,
}

impl Default for LinkPattern {
    fn default() -> Self {
        LinkPattern::Regex(DEFAULT_LINK_PATTERN.to_string())
    }
}

impl LinkPattern {
    /// Builds the matcher for this pattern
    pub fn build(&self) -> Result<Arc<dyn LinkMatcher>, ConfigError> {
        match self {
            LinkPattern::Regex(source) => Ok(Arc::new(RegexMatcher::new(source)?)),
            LinkPattern::Anchors => Ok(Arc::new(AnchorMatcher::new())),
        }
    }
}

/// Immutable settings for one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub target_domain: String,
    pub start_page: String,
    pub crawl_limit: CrawlLimit,
    pub link_pattern: LinkPattern,
}

impl CrawlConfig {
    /// Normalizes and validates the raw inputs
    ///
    /// Example:
    ///   domain = "HTTPS://Example.COM", no start page, no limit
    ///   -> target_domain = "example.com"
    ///      start_page = "https://example.com"
    ///      crawl_limit = Unbounded
    pub fn new(
        domain: &str,
        start_page: Option<&str>,
        crawl_limit: Option<i64>,
    ) -> Result<Self, ConfigError> {
        let target_domain = normalize_domain(domain)?;

        let start_page = match start_page {
            Some(page) => normalize_start_page(page)?,
            None => format!("https://{}", target_domain),
        };

        let crawl_limit = match crawl_limit {
            Some(raw) => CrawlLimit::from_raw(raw)?,
            None => CrawlLimit::Unbounded,
        };

        Ok(Self {
            target_domain,
            start_page,
            crawl_limit,
            link_pattern: LinkPattern::default(),
        })
    }

    /// Replaces the link pattern
    pub fn with_link_pattern(mut self, pattern: LinkPattern) -> Self {
        self.link_pattern = pattern;
        self
    }
}

/// Lowercases a domain, strips any http(s) scheme and validates the host
pub fn normalize_domain(raw: &str) -> Result<String, ConfigError> {
    let lowered = raw.trim().to_lowercase();
    let host = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered)
        .trim_end_matches('/');

    if host.is_empty() || !domain_regex().is_match(host) {
        return Err(ConfigError::InvalidDomain(raw.to_string()));
    }

    Ok(host.to_string())
}

/// Lowercases a start page and makes it an absolute https URL if needed
///
/// Examples:
///   "EXAMPLE.com/Page"        -> "https://example.com/page"
///   "http://example.com/docs" -> "http://example.com/docs"
///   "not a url"               -> Err
pub fn normalize_start_page(raw: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidStartPage(raw.to_string());

    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() || lowered.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let absolute = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        lowered
    } else {
        format!("https://{}", lowered)
    };

    let parsed = Url::parse(&absolute).map_err(|_| invalid())?;
    match parsed.host_str() {
        Some(host) if host.contains('.') => Ok(absolute),
        _ => Err(invalid()),
    }
}
