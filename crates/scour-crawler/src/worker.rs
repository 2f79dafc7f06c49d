//! The Crawl Worker loop (§4.3): a fixed-concurrency pool that pulls
//! ready URLs from the [`Scheduler`], consults robots, fetches, parses,
//! submits to the Index Job Queue, discovers outlinks, and reports
//! completion back to the URL Store and Scheduler.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use scour_queue::IndexJobQueue;
use scour_scheduler::{score_url, Scheduler};
use scour_store::{LinkStore, UrlStore};
use scour_types::{domain_of, Result, ScourError, UrlRecord, UrlStatus};
use tracing::{error, info, warn};

use crate::robots::RobotsCache;
use crate::traits::{ExtractedPage, FetchOutcome, Fetcher, HtmlExtractor, RobotsDecision};

/// Tuning mirroring `CrawlerConfig`'s worker-relevant fields
/// (`scour-config::crawler`).
#[derive(Debug, Clone)]
pub struct CrawlWorkerConfig {
    pub max_retries: u32,
    pub priority_decrement: f64,
    pub priority_floor: f64,
    pub max_outlinks_per_page: usize,
    pub recrawl_threshold: chrono::Duration,
}

impl Default for CrawlWorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            priority_decrement: 5.0,
            priority_floor: -100.0,
            max_outlinks_per_page: 50,
            recrawl_threshold: chrono::Duration::days(7),
        }
    }
}

/// A single dead-letter record: a URL that exhausted its retries. Kept
/// in-memory so tests can assert on it directly in addition to the
/// `tracing::error!` emitted at the same point (§7: background failures
/// log with context but never crash the worker loop).
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterEntry {
    pub url: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// HTTP status codes and transport errors that are retryable (§4.3,
/// §4.3 retry classification).
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub struct CrawlWorker {
    url_store: UrlStore,
    link_store: LinkStore,
    scheduler: std::sync::Arc<Scheduler>,
    queue: IndexJobQueue,
    robots: RobotsCache,
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn HtmlExtractor>,
    config: CrawlWorkerConfig,
    retry_counts: Mutex<HashMap<String, u32>>,
    dead_letters: Mutex<Vec<DeadLetterEntry>>,
    domain_visits: DashMap<String, u64>,
}

impl CrawlWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url_store: UrlStore,
        link_store: LinkStore,
        scheduler: std::sync::Arc<Scheduler>,
        queue: IndexJobQueue,
        robots: RobotsCache,
        fetcher: Box<dyn Fetcher>,
        extractor: Box<dyn HtmlExtractor>,
        config: CrawlWorkerConfig,
    ) -> Self {
        Self {
            url_store,
            link_store,
            scheduler,
            queue,
            robots,
            fetcher,
            extractor,
            config,
            retry_counts: Mutex::new(HashMap::new()),
            dead_letters: Mutex::new(Vec::new()),
            domain_visits: DashMap::new(),
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.dead_letters.lock().unwrap().clone()
    }

    /// Runs the fixed-concurrency loop until `shutdown` fires: ask for
    /// ready work, spawn a bounded number of per-URL tasks, and keep
    /// polling. A `graceful` shutdown lets in-flight tasks drain; a
    /// non-graceful one abandons them when the join set is dropped.
    pub async fn run(self: std::sync::Arc<Self>, concurrency: usize, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut tasks = tokio::task::JoinSet::new();
        loop {
            if *shutdown.borrow() {
                break;
            }

            while tasks.len() < concurrency {
                let ready = match self.scheduler.get_ready(1).await {
                    Ok(items) => items,
                    Err(e) => {
                        error!(error = %e, "scheduler poll failed");
                        break;
                    }
                };
                let Some(item) = ready.into_iter().next() else {
                    break;
                };
                let this = self.clone();
                tasks.spawn(async move {
                    if let Err(e) = this.process_one(item).await {
                        error!(error = %e, "crawl task failed");
                    }
                });
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                _ = tokio::time::sleep(StdDuration::from_millis(50)), if tasks.is_empty() => {}
            }
        }

        // Graceful: drain in-flight tasks. Abandoning them (non-graceful)
        // is the caller's choice, made by not awaiting this join loop.
        while tasks.join_next().await.is_some() {}
    }

    /// The per-URL task, steps (a)-(g) of §4.3.
    pub async fn process_one(&self, item: UrlRecord) -> Result<()> {
        let domain = item.domain.clone();
        let item_url = item.url.clone();
        self.scheduler.record_start(&domain);

        let outcome = self.process_inner(item).await;
        let success = outcome.is_ok();

        if let Err(e) = &outcome {
            warn!(url = %item_url, error = %e, "crawl attempt failed");
        }

        self.scheduler.record_complete(&domain, success);
        outcome
    }

    async fn process_inner(&self, item: UrlRecord) -> Result<()> {
        let url = item.url.clone();
        let domain = item.domain.clone();
        let path = url::Url::parse(&url).map(|u| u.path().to_string()).unwrap_or_else(|_| "/".to_string());

        // (a) consult robots.
        let (decision, crawl_delay) = match self.robots.check(&domain, &path).await {
            Ok(v) => v,
            Err(e) => return self.handle_retryable(&item, &format!("robots fetch failed: {e}")).await,
        };
        if let Some(delay) = crawl_delay {
            self.scheduler.set_crawl_delay(&domain, delay);
        }
        if decision == RobotsDecision::Disallowed {
            self.url_store.record(&url, UrlStatus::Failed).await?;
            info!(url = %url, "blocked by robots.txt");
            return Err(ScourError::Validation("blocked by robots.txt".into()));
        }

        // (b) HTTP GET, classified by the injected Fetcher.
        let fetch_result = self.fetcher.fetch(&url).await;
        let body = match fetch_result {
            Ok(FetchOutcome::Html { body }) => body,
            Ok(FetchOutcome::Retryable { reason }) => return self.handle_retryable(&item, &reason).await,
            Ok(FetchOutcome::Permanent { reason }) => {
                self.url_store.record(&url, UrlStatus::Failed).await?;
                return Err(ScourError::Validation(reason));
            }
            Err(e) => return self.handle_retryable(&item, &e.to_string()).await,
        };

        // (c) parse. CPU-bound per §5; the extractor is an injected,
        // out-of-scope collaborator (§1), so offloading it onto
        // `spawn_blocking` is that implementation's responsibility, not
        // this loop's — mirroring how the spec frames HTML parsing as an
        // external collaborator reached through a narrow interface.
        let ExtractedPage { title, text, outlinks } = self.extractor.extract(&url, &body);

        // (d) submit to the Index Job Queue.
        let outlinks_truncated: Vec<String> = outlinks.iter().take(self.config.max_outlinks_per_page).cloned().collect();
        self.queue.enqueue(&url, &title, &text, &outlinks_truncated).await?;

        // (e) extract outlinks, score, and add to the URL Store.
        self.link_store.record_edges(&url, &outlinks_truncated).await?;
        let parent_score = item.priority.max(1.0);
        for link in &outlinks_truncated {
            let Ok(link_domain) = domain_of(link) else { continue };
            let visits = *self.domain_visits.get(&link_domain).as_deref().unwrap_or(&0);
            let score = score_url(link, parent_score, visits);
            if let Err(e) = self.url_store.add(link, score, Some(&url), self.config.recrawl_threshold).await {
                warn!(link = %link, error = %e, "failed to add discovered outlink");
            }
        }

        // (f) record success.
        self.url_store.record(&url, UrlStatus::Done).await?;
        *self.domain_visits.entry(domain).or_insert(0) += 1;
        self.retry_counts.lock().unwrap().remove(&url);
        Ok(())
    }

    /// Re-adds the URL with a decremented priority and a process-local
    /// retry counter capped at `max_retries`; on exhaustion records
    /// `failed` and logs a dead-letter entry (§4.3, §7).
    async fn handle_retryable(&self, item: &UrlRecord, reason: &str) -> Result<()> {
        let mut counts = self.retry_counts.lock().unwrap();
        let count = counts.entry(item.url.clone()).or_insert(0);
        *count += 1;
        let attempt = *count;
        drop(counts);

        if attempt >= self.config.max_retries {
            self.url_store.record(&item.url, UrlStatus::Failed).await?;
            let entry = DeadLetterEntry {
                url: item.url.clone(),
                reason: format!("max retries ({}) exceeded: {reason}", self.config.max_retries),
                at: Utc::now(),
            };
            error!(url = %entry.url, reason = %entry.reason, "dead-lettering url after max retries");
            self.dead_letters.lock().unwrap().push(entry);
            self.retry_counts.lock().unwrap().remove(&item.url);
            return Err(ScourError::Unavailable(reason.to_string()));
        }

        let new_priority = (item.priority - self.config.priority_decrement).max(self.config.priority_floor);
        self.url_store
            .add(&item.url, new_priority, item.source_url.as_deref(), self.config.recrawl_threshold)
            .await?;
        Err(ScourError::Unavailable(reason.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{HtmlExtractor, RobotsFetcher, RobotsRules};
    use async_trait::async_trait;
    use scour_queue::QueuePolicy;
    use scour_scheduler::SchedulerConfig;
    use scour_store::DbPool;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct StaticHtml {
        body: String,
    }
    #[async_trait]
    impl Fetcher for StaticHtml {
        async fn fetch(&self, _url: &str) -> Result<FetchOutcome> {
            Ok(FetchOutcome::Html { body: self.body.clone() })
        }
    }

    struct AlwaysRetryable;
    #[async_trait]
    impl Fetcher for AlwaysRetryable {
        async fn fetch(&self, _url: &str) -> Result<FetchOutcome> {
            Ok(FetchOutcome::Retryable { reason: "503 service unavailable".into() })
        }
    }

    struct SimpleExtractor;
    impl HtmlExtractor for SimpleExtractor {
        fn extract(&self, base_url: &str, html: &str) -> ExtractedPage {
            let title = html
                .split("<title>").nth(1).and_then(|s| s.split("</title>").next())
                .unwrap_or("").to_string();
            let text = html
                .split("<body>").nth(1).and_then(|s| s.split("</body>").next())
                .unwrap_or("").to_string();
            let base = url::Url::parse(base_url).unwrap();
            let mut outlinks = Vec::new();
            for part in html.split("href='").skip(1) {
                if let Some(href) = part.split('\'').next() {
                    if let Ok(joined) = base.join(href) {
                        outlinks.push(joined.to_string());
                    }
                }
            }
            ExtractedPage { title, text, outlinks }
        }
    }

    struct AllowAllRobots;
    #[async_trait]
    impl RobotsFetcher for AllowAllRobots {
        async fn fetch_robots(&self, _domain: &str) -> Result<Option<RobotsRules>> {
            Ok(None)
        }
    }

    async fn harness(fetcher: impl Fetcher + 'static) -> (CrawlWorker, UrlStore) {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let db = DbPool::Sqlite(pool);
        db.init_schema().await.unwrap();
        let url_store = UrlStore::new(db.clone());
        let link_store = LinkStore::new(db.clone());
        let scheduler = Arc::new(Scheduler::new(url_store.clone(), SchedulerConfig::default()));
        let queue = IndexJobQueue::new(db, QueuePolicy::default());
        let robots = RobotsCache::new(Box::new(AllowAllRobots), 64);

        let worker = CrawlWorker::new(
            url_store.clone(),
            link_store,
            scheduler,
            queue,
            robots,
            Box::new(fetcher),
            Box::new(SimpleExtractor),
            CrawlWorkerConfig::default(),
        );
        (worker, url_store)
    }

    #[tokio::test]
    async fn seed_to_search_discovers_document_and_outlink() {
        let html = "<title>Hello</title><body>the cat sat</body><a href='/b'>b</a>".to_string();
        let (worker, url_store) = harness(StaticHtml { body: html }).await;

        url_store.add("https://host.test/", 10.0, None, chrono::Duration::days(7)).await.unwrap();
        let items = url_store.claim_batch(1).await.unwrap();
        worker.process_one(items.into_iter().next().unwrap()).await.unwrap();

        let record = url_store.history("https://host.test/").await.unwrap();
        assert_eq!(record[0].status, UrlStatus::Done);

        let pending = url_store.peek(10).await.unwrap();
        assert!(pending.iter().any(|r| r.url == "https://host.test/b"));
    }

    #[tokio::test]
    async fn retry_then_dead_letter_after_three_failures() {
        let (worker, url_store) = harness(AlwaysRetryable).await;
        url_store.add("https://flaky.test/", 10.0, None, chrono::Duration::days(7)).await.unwrap();

        for _ in 0..3 {
            let items = url_store.claim_batch(1).await.unwrap();
            if let Some(item) = items.into_iter().next() {
                let _ = worker.process_one(item).await;
            }
        }

        let record = url_store.history("https://flaky.test/").await.unwrap();
        assert_eq!(record[0].status, UrlStatus::Failed);
        let letters = worker.dead_letters();
        assert_eq!(letters.len(), 1);
        assert!(letters[0].reason.contains("max retries"));
    }

    #[tokio::test]
    async fn robots_block_records_failed_without_fetching() {
        struct DisallowPrivate;
        #[async_trait]
        impl RobotsFetcher for DisallowPrivate {
            async fn fetch_robots(&self, _domain: &str) -> Result<Option<RobotsRules>> {
                Ok(Some(RobotsRules::new(None, vec!["/private".to_string()])))
            }
        }
        struct NeverCalled(Arc<AtomicU32>);
        #[async_trait]
        impl Fetcher for NeverCalled {
            async fn fetch(&self, _url: &str) -> Result<FetchOutcome> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(FetchOutcome::Html { body: String::new() })
            }
        }

        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let db = DbPool::Sqlite(pool);
        db.init_schema().await.unwrap();
        let url_store = UrlStore::new(db.clone());
        let link_store = LinkStore::new(db.clone());
        let scheduler = Arc::new(Scheduler::new(url_store.clone(), SchedulerConfig::default()));
        let queue = IndexJobQueue::new(db, QueuePolicy::default());
        let robots = RobotsCache::new(Box::new(DisallowPrivate), 64);
        let calls = Arc::new(AtomicU32::new(0));

        let worker = CrawlWorker::new(
            url_store.clone(),
            link_store,
            scheduler,
            queue,
            robots,
            Box::new(NeverCalled(calls.clone())),
            Box::new(SimpleExtractor),
            CrawlWorkerConfig::default(),
        );

        url_store.add("https://blocked.test/private/foo", 5.0, None, chrono::Duration::days(7)).await.unwrap();
        let items = url_store.claim_batch(1).await.unwrap();
        let result = worker.process_one(items.into_iter().next().unwrap()).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "fetcher must not be called for a disallowed path");

        let record = url_store.history("https://blocked.test/private/foo").await.unwrap();
        assert_eq!(record[0].status, UrlStatus::Failed);
    }
}
