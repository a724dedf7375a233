// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from one page
// - Same-domain restriction (links to other sites are dropped)
// - Optional limit on the number of pages ever admitted
// - Completion detection through the queue's "drained" signal
//
// Submodules, leaves first:
// - extract: finds in-domain links in a page body
// - frontier: remembers every admitted URL
// - dispatch: frontier admission + job submission
// - fetch: downloads pages
// - drain: decides when the crawl is really over
// - orchestrator: the Crawler that ties it all together
// =============================================================================

mod dispatch;
mod drain;
mod extract;
mod fetch;
mod frontier;
mod orchestrator;

pub use extract::{AnchorMatcher, LinkMatcher, RegexMatcher, DEFAULT_LINK_PATTERN};
pub use fetch::HttpFetcher;
pub use orchestrator::{Crawler, CrawlerSettings};
