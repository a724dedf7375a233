// src/crawl/extract.rs
// =============================================================================
// This module finds in-domain links in a page body.
//
// Two steps:
// 1. A LinkMatcher pulls URL-shaped candidates out of the body
// 2. extract_links() keeps only the candidates that start with
//    https://{target_domain} (compared case-insensitively)
//
// The default matcher is a single regex over the raw text, so it also picks
// up URLs that are not inside <a> tags (scripts, JSON blobs, plain text).
// AnchorMatcher is the structured alternative built on `scraper`.
//
// Neither matcher resolves relative links against the page URL.
// =============================================================================

use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};

use crate::error::ConfigError;

/// Permissive URL pattern, matched case-insensitively over ASCII only
pub const DEFAULT_LINK_PATTERN: &str = r"(?-u)(?:(?:https?|ftp|file)://|www\.|ftp\.)(?:\([-A-Z0-9+&@#/%=~_|$?!:,.]*\)|[-A-Z0-9+&@#/%=~_|$?!:,.])*(?:\([-A-Z0-9+&@#/%=~_|$?!:,.]*\)|[A-Z0-9+&@#/%=~_|$])";

/// Strategy for finding candidate URLs in a page body
///
/// Implementations must return candidates in order of first appearance and
/// must not deduplicate them.
pub trait LinkMatcher: Send + Sync {
    fn candidates(&self, body: &str) -> Vec<String>;
}

/// Regex-based matcher over the raw page text
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Compiles `pattern` case-insensitively and multi-line
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }
}

impl Default for RegexMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_PATTERN).expect("default link pattern compiles")
    }
}

impl LinkMatcher for RegexMatcher {
    fn candidates(&self, body: &str) -> Vec<String> {
        self.regex
            .find_iter(body)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Collects the href of every <a> element, verbatim
#[derive(Debug, Clone)]
pub struct AnchorMatcher {
    selector: Selector,
}

impl AnchorMatcher {
    pub fn new() -> Self {
        // "a[href]" is a constant, known-good selector
        let selector = Selector::parse("a[href]").expect("anchor selector parses");
        Self { selector }
    }
}

impl Default for AnchorMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkMatcher for AnchorMatcher {
    fn candidates(&self, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        document
            .select(&self.selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|href| href.trim().to_string())
            .collect()
    }
}

/// Returns the candidates that belong to `target_domain`
///
/// Example:
///   body = <a href="https://example.com/a">..</a> <a href="https://other.com/b">..</a>
///   target_domain = "example.com"
///   result = ["https://example.com/a"]
pub fn extract_links(body: &str, target_domain: &str, matcher: &dyn LinkMatcher) -> Vec<String> {
    let prefix = format!("https://{}", target_domain.to_lowercase());

    matcher
        .candidates(body)
        .into_iter()
        .filter(|candidate| candidate.to_lowercase().starts_with(&prefix))
        .collect()
}
