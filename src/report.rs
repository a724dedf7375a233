// src/report.rs
// =============================================================================
// Reporting: what the user sees on stdout.
//
// Two moments get reported:
// - after each page: the in-domain links found on it
// - at the end: the full set of visited URLs
//
// ConsoleReporter prints either a table or pretty JSON. Logs (tracing) go to
// stderr, so JSON on stdout stays machine-readable.
// =============================================================================

use serde::Serialize;
use tracing::error;

/// Final outcome of a crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub target_domain: String,
    /// Every URL admitted during the run, sorted
    pub visited: Vec<String>,
    /// Jobs that finished successfully
    pub completed: usize,
    /// Jobs that failed and were kept by the queue
    pub failed: usize,
}

/// Receives crawl progress
pub trait CrawlReporter: Send + Sync {
    /// Called once per successfully fetched page
    fn page_processed(&self, page: &str, links: &[String]);

    /// Called once, when the crawl has drained
    fn crawl_finished(&self, summary: &CrawlSummary);
}

/// Prints to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    json: bool,
}

// Width of the URL column in table output
const URL_WIDTH: usize = 80;

#[derive(Serialize)]
struct PageReport<'a> {
    page: &'a str,
    links: &'a [String],
}

impl ConsoleReporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(output) => println!("{}", output),
            Err(e) => error!(error = %e, "Could not serialize report"),
        }
    }
}

impl CrawlReporter for ConsoleReporter {
    fn page_processed(&self, page: &str, links: &[String]) {
        if self.json {
            self.print_json(&PageReport { page, links });
            return;
        }

        let mut table = String::new();
        table.push_str(&format!("{}\n", page));
        table.push_str(&format!("{}\n", "=".repeat(URL_WIDTH)));
        for link in links {
            table.push_str(&format!("  {}\n", truncate(link, URL_WIDTH - 2)));
        }
        table.push_str(&format!("  ({} link(s))\n", links.len()));
        // One println! so concurrent pages do not interleave line by line
        println!("{}", table);
    }

    fn crawl_finished(&self, summary: &CrawlSummary) {
        if self.json {
            self.print_json(summary);
            return;
        }

        println!("Visited URLs");
        println!("{}", "=".repeat(URL_WIDTH));
        for url in &summary.visited {
            println!("  {}", truncate(url, URL_WIDTH - 2));
        }
        println!();
        println!("📊 Summary for {}:", summary.target_domain);
        println!("   📋 Visited: {}", summary.visited.len());
        println!("   ✅ Completed: {}", summary.completed);
        println!("   ❌ Failed (kept): {}", summary.failed);
    }
}

// Cuts long URLs for display, on a char boundary
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}
