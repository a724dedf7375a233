// src/crawl/orchestrator.rs
// =============================================================================
// The crawler itself: lifecycle plus the per-page routine.
//
// Lifecycle:
//   Idle -> Started -> Running <-> Draining -> Terminated
//
// - start(): pause and wipe the queue, reset the frontier, admit the start
//   page, resume the queue
// - process_page(): runs once per job (fetch -> extract -> admit)
// - run(): start, spawn the worker, then wait for drained signals and let
//   the DrainMonitor decide when everything is done
//
// Terminated is final. The binary turns the result of run() into an exit
// code; nothing in here ends the process.
// =============================================================================

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::dispatch::Dispatcher;
use super::drain::{DrainDecision, DrainMonitor, DEFAULT_SETTLE_INTERVAL};
use super::extract::{extract_links, LinkMatcher};
use super::fetch::PageFetcher;
use super::frontier::Frontier;
use crate::config::CrawlConfig;
use crate::error::{CrawlError, QueueError};
use crate::queue::{CrawlJob, JobCounts, JobHandler, JobOptions, JobQueue, Worker, WorkerConfig};
use crate::report::{CrawlReporter, CrawlSummary};

/// Where the crawler is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Started,
    Running,
    Draining,
    Terminated,
}

impl CrawlState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlState::Idle => "idle",
            CrawlState::Started => "started",
            CrawlState::Running => "running",
            CrawlState::Draining => "draining",
            CrawlState::Terminated => "terminated",
        }
    }
}

/// Runtime knobs that are not part of the crawl definition
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    pub worker: WorkerConfig,
    pub settle_interval: Duration,
    pub job_options: JobOptions,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            settle_interval: DEFAULT_SETTLE_INTERVAL,
            job_options: JobOptions::default(),
        }
    }
}

/// What one call to process_page() did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    /// In-domain links found on the page
    pub discovered: usize,
    /// Links that made it into the frontier
    pub admitted: usize,
}

pub struct Crawler {
    config: CrawlConfig,
    settings: CrawlerSettings,
    frontier: Arc<Frontier>,
    dispatcher: Dispatcher,
    queue: Arc<dyn JobQueue>,
    fetcher: Arc<dyn PageFetcher>,
    matcher: Arc<dyn LinkMatcher>,
    reporter: Arc<dyn CrawlReporter>,
    monitor: DrainMonitor,
    state: Mutex<CrawlState>,
}

impl Crawler {
    /// Builds a crawler; the link matcher comes from `config.link_pattern`
    pub fn new(
        config: CrawlConfig,
        settings: CrawlerSettings,
        queue: Arc<dyn JobQueue>,
        fetcher: Arc<dyn PageFetcher>,
        reporter: Arc<dyn CrawlReporter>,
    ) -> Result<Self, CrawlError> {
        let matcher = config.link_pattern.build()?;
        let frontier = Arc::new(Frontier::new(config.crawl_limit));
        let dispatcher = Dispatcher::new(
            Arc::clone(&frontier),
            Arc::clone(&queue),
            settings.job_options.clone(),
        );
        let monitor = DrainMonitor::new(settings.settle_interval);

        Ok(Self {
            config,
            settings,
            frontier,
            dispatcher,
            queue,
            fetcher,
            matcher,
            reporter,
            monitor,
            state: Mutex::new(CrawlState::Idle),
        })
    }

    #[cfg(test)]
    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn state(&self) -> CrawlState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // Moves to `to`; Terminated never changes again
    fn transition(&self, to: CrawlState) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == CrawlState::Terminated || *state == to {
            return;
        }
        debug!(from = state.as_str(), to = to.as_str(), "Crawler state change");
        *state = to;
    }

    /// Prepares a clean run and queues the start page
    ///
    /// Fails, without queueing anything, when the queue cannot be wiped
    /// (usually because jobs from an earlier run are still active).
    pub async fn start(&self) -> Result<(), CrawlError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *state != CrawlState::Idle {
                return Err(CrawlError::InvalidState(state.as_str()));
            }
            *state = CrawlState::Started;
        }

        if let Err(e) = self.begin_run().await {
            *self.state.lock().unwrap_or_else(|p| p.into_inner()) = CrawlState::Idle;
            return Err(e);
        }

        self.transition(CrawlState::Running);
        info!(
            domain = %self.config.target_domain,
            start_page = %self.config.start_page,
            limit = %self.config.crawl_limit,
            "Crawl started"
        );
        Ok(())
    }

    async fn begin_run(&self) -> Result<(), CrawlError> {
        self.clear_queue().await.map_err(|e| {
            error!(error = %e, "Error while obliterating the queue. This may be because there are active jobs.");
            e
        })?;

        self.frontier.reset();
        if !self.dispatcher.admit(&self.config.start_page).await? {
            warn!(start_page = %self.config.start_page, "Start page not admitted; crawl limit is 0");
        }

        self.queue.resume().await?;
        Ok(())
    }

    async fn clear_queue(&self) -> Result<(), QueueError> {
        self.queue.pause().await?;
        self.queue.obliterate().await
    }

    /// The per-job routine: fetch a page, extract links, admit them
    ///
    /// A fetch error is returned untouched so that the job fails.
    pub async fn process_page(&self, url: &str) -> Result<PageOutcome, CrawlError> {
        self.frontier.mark_visited(url);
        info!(url, "Crawling page");

        let body = self.fetcher.fetch(url).await?;
        let links = extract_links(&body, &self.config.target_domain, self.matcher.as_ref());
        self.reporter.page_processed(url, &links);

        let mut admitted = 0;
        for link in &links {
            if self.dispatcher.admit(link).await? {
                admitted += 1;
            }
        }

        debug!(url, discovered = links.len(), admitted, frontier = self.frontier.len(), "Page processed");
        Ok(PageOutcome {
            discovered: links.len(),
            admitted,
        })
    }

    /// Runs the whole crawl and returns once the queue has drained for good
    pub async fn run(self: Arc<Self>) -> Result<CrawlSummary, CrawlError> {
        self.start().await?;

        let handler: Arc<dyn JobHandler> = Arc::clone(&self) as Arc<dyn JobHandler>;
        let worker = Worker::spawn(Arc::clone(&self.queue), handler, self.settings.worker.clone());

        loop {
            worker.drained().await;
            self.transition(CrawlState::Draining);
            debug!(settle = ?self.monitor.settle_interval(), "Drain signal received");

            match self.monitor.check(self.queue.as_ref()).await {
                Ok(DrainDecision::Finished(counts)) => return self.finish(worker, counts).await,
                Ok(DrainDecision::Continue(_)) | Ok(DrainDecision::AlreadyChecking) => {
                    self.transition(CrawlState::Running);
                }
                Err(e) => {
                    error!(error = %e, "Drain check failed");
                    worker.close().await;
                    if let Err(close_err) = self.queue.close().await {
                        warn!(error = %close_err, "Could not close queue");
                    }
                    self.transition(CrawlState::Terminated);
                    return Err(e.into());
                }
            }
        }
    }

    async fn finish(&self, worker: Worker, counts: JobCounts) -> Result<CrawlSummary, CrawlError> {
        let summary = CrawlSummary {
            target_domain: self.config.target_domain.clone(),
            visited: self.frontier.snapshot(),
            completed: counts.completed,
            failed: counts.failed,
        };
        self.reporter.crawl_finished(&summary);

        info!(visited = summary.visited.len(), "All jobs processed. Closing...");
        worker.close().await;
        let closed = self.queue.close().await;
        self.transition(CrawlState::Terminated);
        closed?;

        Ok(summary)
    }
}

#[async_trait]
impl JobHandler for Crawler {
    async fn handle(&self, job: &CrawlJob) -> anyhow::Result<()> {
        self.process_page(&job.url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkPattern;
    use crate::error::FetchError;
    use crate::queue::{ClaimedJob, JobId, MemoryQueue, SubmitOutcome};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // Serves canned pages; unknown URLs are 404s
    #[derive(Default)]
    struct StaticFetcher {
        pages: HashMap<String, String>,
        fetches: Mutex<HashMap<String, usize>>,
        latency: Duration,
    }

    impl StaticFetcher {
        fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn fetch_count(&self, url: &str) -> usize {
            *self.fetches.lock().unwrap().get(url).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        pages: Mutex<Vec<(String, Vec<String>)>>,
        summaries: Mutex<Vec<CrawlSummary>>,
    }

    impl CrawlReporter for RecordingReporter {
        fn page_processed(&self, page: &str, links: &[String]) {
            self.pages.lock().unwrap().push((page.to_string(), links.to_vec()));
        }

        fn crawl_finished(&self, summary: &CrawlSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }

    // MemoryQueue that counts lifecycle calls and can refuse to obliterate
    #[derive(Default)]
    struct CountingQueue {
        inner: MemoryQueue,
        busy_from_earlier_run: AtomicBool,
        submits: AtomicUsize,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl JobQueue for CountingQueue {
        async fn pause(&self) -> Result<(), QueueError> {
            self.inner.pause().await
        }

        async fn resume(&self) -> Result<(), QueueError> {
            self.inner.resume().await
        }

        async fn obliterate(&self) -> Result<(), QueueError> {
            if self.busy_from_earlier_run.load(Ordering::SeqCst) {
                return Err(QueueError::ActiveJobs(2));
            }
            self.inner.obliterate().await
        }

        async fn submit(&self, job: CrawlJob, options: JobOptions) -> Result<SubmitOutcome, QueueError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            self.inner.submit(job, options).await
        }

        async fn claim(&self) -> Result<Option<ClaimedJob>, QueueError> {
            self.inner.claim().await
        }

        async fn mark_completed(&self, id: &JobId) -> Result<(), QueueError> {
            self.inner.mark_completed(id).await
        }

        async fn mark_failed(&self, id: &JobId, reason: &str) -> Result<(), QueueError> {
            self.inner.mark_failed(id, reason).await
        }

        async fn counts(&self) -> Result<JobCounts, QueueError> {
            self.inner.counts().await
        }

        async fn close(&self) -> Result<(), QueueError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }
    }

    struct Harness {
        crawler: Arc<Crawler>,
        queue: Arc<CountingQueue>,
        fetcher: Arc<StaticFetcher>,
        reporter: Arc<RecordingReporter>,
    }

    fn harness(limit: Option<i64>, fetcher: StaticFetcher) -> Harness {
        let config = CrawlConfig::new("example.com", None, limit).unwrap();
        harness_for(config, fetcher)
    }

    fn harness_for(config: CrawlConfig, fetcher: StaticFetcher) -> Harness {
        let queue = Arc::new(CountingQueue::default());
        let fetcher = Arc::new(fetcher);
        let reporter = Arc::new(RecordingReporter::default());
        let settings = CrawlerSettings {
            worker: WorkerConfig {
                concurrency: 3,
                poll_interval: Duration::from_millis(50),
            },
            ..CrawlerSettings::default()
        };

        let crawler = Crawler::new(
            config,
            settings,
            queue.clone(),
            fetcher.clone(),
            reporter.clone(),
        )
        .unwrap();

        Harness {
            crawler: Arc::new(crawler),
            queue,
            fetcher,
            reporter,
        }
    }

    const HOME: &str = "https://example.com";

    const HOME_BODY: &str = r#"
        <a href="https://example.com/page1">Link 1</a>
        <a href="https://example.com/page2">Link 2</a>
        <a href="https://other.com/page3">Link 3</a>
    "#;

    #[tokio::test]
    async fn test_start_queues_start_page() {
        let h = harness(Some(10), StaticFetcher::default());
        assert_eq!(h.crawler.state(), CrawlState::Idle);

        h.crawler.start().await.unwrap();

        assert_eq!(h.crawler.state(), CrawlState::Running);
        assert!(h.crawler.frontier().contains(HOME));
        assert_eq!(h.queue.submits.load(Ordering::SeqCst), 1);
        assert!(!h.queue.inner.is_paused());
    }

    #[tokio::test]
    async fn test_page_links_in_domain_are_admitted() {
        let h = harness(None, StaticFetcher::default().with_page(HOME, HOME_BODY));
        h.crawler.start().await.unwrap();

        let outcome = h.crawler.process_page(HOME).await.unwrap();

        assert_eq!(outcome, PageOutcome { discovered: 2, admitted: 2 });
        assert!(h.crawler.frontier().contains("https://example.com/page1"));
        assert!(h.crawler.frontier().contains("https://example.com/page2"));
        assert!(!h.crawler.frontier().contains("https://other.com/page3"));

        let pages = h.reporter.pages.lock().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_reached_before_page_admits_nothing() {
        let h = harness(Some(1), StaticFetcher::default().with_page(HOME, HOME_BODY));
        h.crawler.start().await.unwrap();

        let outcome = h.crawler.process_page(HOME).await.unwrap();

        assert_eq!(outcome, PageOutcome { discovered: 2, admitted: 0 });
        assert_eq!(h.crawler.frontier().len(), 1);
        assert_eq!(h.queue.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_limit_reached_mid_page_drops_the_rest() {
        let body = (1..=6)
            .map(|i| format!("https://example.com/p{} ", i))
            .collect::<String>();
        let h = harness(Some(3), StaticFetcher::default().with_page(HOME, &body));
        h.crawler.start().await.unwrap();

        let outcome = h.crawler.process_page(HOME).await.unwrap();

        assert_eq!(outcome, PageOutcome { discovered: 6, admitted: 2 });
        assert_eq!(h.crawler.frontier().len(), 3);
    }

    #[tokio::test]
    async fn test_start_fails_when_queue_busy() {
        let h = harness(None, StaticFetcher::default());
        h.queue.busy_from_earlier_run.store(true, Ordering::SeqCst);

        let err = h.crawler.start().await.unwrap_err();

        assert!(err.is_precondition());
        assert_eq!(h.queue.submits.load(Ordering::SeqCst), 0);
        assert!(h.crawler.frontier().is_empty());
        assert_eq!(h.crawler.state(), CrawlState::Idle);
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_the_page() {
        let h = harness(None, StaticFetcher::default());
        h.crawler.start().await.unwrap();

        let err = h.crawler.process_page(HOME).await.unwrap_err();

        assert!(matches!(err, CrawlError::Fetch(FetchError::Status { status: 404, .. })));
        assert!(h.reporter.pages.lock().unwrap().is_empty());
        assert_eq!(h.crawler.frontier().len(), 1);
    }

    #[tokio::test]
    async fn test_processing_marks_unadmitted_url_visited() {
        let h = harness(None, StaticFetcher::default().with_page("https://example.com/x", ""));
        h.crawler.process_page("https://example.com/x").await.unwrap();
        assert!(h.crawler.frontier().contains("https://example.com/x"));
    }

    #[tokio::test]
    async fn test_custom_link_pattern_replaces_default() {
        let config = CrawlConfig::new("example.com", None, None)
            .unwrap()
            .with_link_pattern(LinkPattern::Regex(r"https://example\.com/keep-[a-z]+".to_string()));
        let body = "https://example.com/keep-a https://example.com/drop-b https://example.com/keep-c";
        let h = harness_for(config, StaticFetcher::default().with_page(HOME, body));
        h.crawler.start().await.unwrap();

        let outcome = h.crawler.process_page(HOME).await.unwrap();

        assert_eq!(outcome.admitted, 2);
        assert!(h.crawler.frontier().contains("https://example.com/keep-a"));
        assert!(h.crawler.frontier().contains("https://example.com/keep-c"));
        assert!(!h.crawler.frontier().contains("https://example.com/drop-b"));
    }

    #[tokio::test]
    async fn test_anchor_pattern_ignores_text_urls() {
        let config = CrawlConfig::new("example.com", None, None)
            .unwrap()
            .with_link_pattern(LinkPattern::Anchors);
        let body = r#"https://example.com/in-text <a href="https://example.com/linked">x</a>"#;
        let h = harness_for(config, StaticFetcher::default().with_page(HOME, body));
        h.crawler.start().await.unwrap();

        let outcome = h.crawler.process_page(HOME).await.unwrap();

        assert_eq!(outcome.discovered, 1);
        assert!(h.crawler.frontier().contains("https://example.com/linked"));
        assert!(!h.crawler.frontier().contains("https://example.com/in-text"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_drains_and_terminates_once() {
        let fetcher = StaticFetcher::default()
            .with_page(HOME, HOME_BODY)
            .with_page(
                "https://example.com/page1",
                "https://example.com https://example.com/page2 https://example.com/page1",
            )
            .with_page("https://example.com/page2", "https://other.com/elsewhere");
        let h = harness(None, fetcher);

        let summary = Arc::clone(&h.crawler).run().await.unwrap();

        assert_eq!(
            summary.visited,
            vec![
                "https://example.com",
                "https://example.com/page1",
                "https://example.com/page2"
            ]
        );
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.failed, 0);

        assert_eq!(h.crawler.state(), CrawlState::Terminated);
        assert_eq!(h.queue.closes.load(Ordering::SeqCst), 1);
        assert!(h.queue.inner.is_closed());
        assert_eq!(h.reporter.summaries.lock().unwrap().len(), 1);

        for url in &summary.visited {
            assert_eq!(h.fetcher.fetch_count(url), 1, "{} fetched more than once", url);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pages_outlive_early_drain_checks() {
        // Every fetch outlasts the settle interval, so the first drain
        // checks see active jobs and must let the crawl keep running
        let fetcher = StaticFetcher::default()
            .with_page(HOME, "https://example.com/a https://example.com/b")
            .with_page("https://example.com/a", "https://example.com/b")
            .with_page("https://example.com/b", "")
            .with_latency(Duration::from_secs(25));
        let h = harness(None, fetcher);
        let started = tokio::time::Instant::now();

        let summary = Arc::clone(&h.crawler).run().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(50));
        assert_eq!(
            summary.visited,
            vec!["https://example.com", "https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(summary.completed, 3);
        assert_eq!(h.queue.closes.load(Ordering::SeqCst), 1);
        assert_eq!(h.reporter.summaries.lock().unwrap().len(), 1);
        assert_eq!(h.crawler.state(), CrawlState::Terminated);
        for url in &summary.visited {
            assert_eq!(h.fetcher.fetch_count(url), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_honours_limit() {
        let body = (1..=10)
            .map(|i| format!("https://example.com/p{} ", i))
            .collect::<String>();
        let mut fetcher = StaticFetcher::default().with_page(HOME, &body);
        for i in 1..=10 {
            fetcher = fetcher.with_page(&format!("https://example.com/p{}", i), &body);
        }
        let h = harness(Some(4), fetcher);

        let summary = Arc::clone(&h.crawler).run().await.unwrap();

        assert_eq!(summary.visited.len(), 4);
        assert_eq!(summary.completed, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pages_do_not_stop_the_crawl() {
        // page1 is missing and turns into a failed, discarded job
        let fetcher = StaticFetcher::default()
            .with_page(HOME, HOME_BODY)
            .with_page("https://example.com/page2", "");
        let h = harness(None, fetcher);

        let summary = Arc::clone(&h.crawler).run().await.unwrap();

        assert_eq!(summary.visited.len(), 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(h.fetcher.fetch_count("https://example.com/page1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_finishes_without_jobs() {
        let h = harness(Some(0), StaticFetcher::default().with_page(HOME, HOME_BODY));

        let summary = Arc::clone(&h.crawler).run().await.unwrap();

        assert!(summary.visited.is_empty());
        assert_eq!(h.fetcher.fetch_count(HOME), 0);
        assert_eq!(h.crawler.state(), CrawlState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminated_crawler_cannot_restart() {
        let h = harness(None, StaticFetcher::default().with_page(HOME, ""));
        Arc::clone(&h.crawler).run().await.unwrap();

        let err = h.crawler.start().await.unwrap_err();
        assert!(matches!(err, CrawlError::InvalidState("terminated")));
    }
}
