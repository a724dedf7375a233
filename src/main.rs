// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing, to stderr)
// 3. Build the crawler and run it until the queue has drained
// 4. Exit with proper code (0 = crawl finished, 2 = error)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;      // src/cli.rs - command-line parsing
mod config;   // src/config.rs - crawl configuration
mod crawl;    // src/crawl/ - frontier, extraction, orchestration
mod error;    // src/error.rs - error types
mod queue;    // src/queue/ - job queue and workers
mod report;   // src/report.rs - stdout output

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, LogFormat};
use crawl::{Crawler, HttpFetcher};
use queue::MemoryQueue;
use report::ConsoleReporter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(cli.log_format, cli.verbose) {
        eprintln!("Warning: could not set up logging: {}", e);
    }

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Crawl failed");
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = the crawl drained and every page was processed
//   Err   = bad configuration, or the queue could not be prepared
async fn run(cli: Cli) -> Result<i32> {
    let config = cli.crawl_config().context("Invalid crawl configuration")?;
    let settings = cli.settings();

    println!(
        "🔍 Crawling {}, starting from {} with the following limit: {}.",
        config.target_domain, config.start_page, config.crawl_limit
    );

    let fetcher = HttpFetcher::new(cli.request_timeout()).context("Could not build HTTP client")?;
    let crawler = Crawler::new(
        config,
        settings,
        Arc::new(MemoryQueue::new()),
        Arc::new(fetcher),
        Arc::new(ConsoleReporter::new(cli.json)),
    )?;

    let crawler = Arc::new(crawler);
    let summary = match Arc::clone(&crawler).run().await {
        Ok(summary) => summary,
        Err(e) if e.is_precondition() => {
            return Err(anyhow::Error::new(e)
                .context("Error while obliterating the queue. This may be because there are active jobs"));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Crawl did not complete")),
    };
    tracing::info!(
        domain = %summary.target_domain,
        visited = summary.visited.len(),
        state = crawler.state().as_str(),
        "Crawl finished"
    );

    Ok(0)
}

// RUST_LOG wins when set; otherwise our own crate logs at info (or debug)
fn setup_tracing(format: LogFormat, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "domain_crawler=debug,warn"
    } else {
        "domain_crawler=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
    }

    Ok(())
}
