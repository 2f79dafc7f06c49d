use std::sync::Arc;

use scour_config::CrawlerConfig;
use scour_crawler::{CrawlWorker, CrawlWorkerConfig, RobotsCache};
use scour_scheduler::{Scheduler, SchedulerConfig};
use scour_store::{DbPool, LinkStore, SeedStore, UrlStore};
use tokio::sync::{watch, Mutex};

use crate::fetch::{CircuitFetcher, CircuitRobotsFetcher, ReqwestFetcher, ReqwestRobotsFetcher, ScraperHtmlExtractor};

const ROBOTS_CACHE_CAPACITY: usize = 4096;

struct RunningWorker {
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

pub struct AppState {
    pub url_store: UrlStore,
    pub seed_store: SeedStore,
    pub link_store: LinkStore,
    pub scheduler: Arc<Scheduler>,
    pub config: CrawlerConfig,
    worker: Arc<CrawlWorker>,
    running: Mutex<Option<RunningWorker>>,
}

impl AppState {
    pub fn new(pool: DbPool, config: CrawlerConfig) -> anyhow::Result<Self> {
        let url_store = UrlStore::new(pool.clone());
        let seed_store = SeedStore::new(pool.clone());
        let link_store = LinkStore::new(pool.clone());

        let scheduler_config = SchedulerConfig {
            batch_size: 64,
            default_min_interval: chrono::Duration::milliseconds(
                (config.min_crawl_delay_secs * 1000.0) as i64,
            ),
            default_concurrency_limit: config.max_concurrent_per_host,
        };
        let scheduler = Arc::new(Scheduler::new(url_store.clone(), scheduler_config));

        let fetcher = Box::new(CircuitFetcher::new(ReqwestFetcher::new(
            &config.user_agent,
            config.request_timeout,
            config.max_response_bytes,
        )?));
        let robots_fetcher = Box::new(CircuitRobotsFetcher::new(ReqwestRobotsFetcher::new(
            &config.user_agent,
            config.request_timeout,
        )?));
        let robots = RobotsCache::new(robots_fetcher, ROBOTS_CACHE_CAPACITY);
        let queue = scour_queue::IndexJobQueue::new(pool.clone(), scour_queue::QueuePolicy::default());

        let worker_config = CrawlWorkerConfig {
            max_retries: 3,
            priority_decrement: 5.0,
            priority_floor: -100.0,
            max_outlinks_per_page: config.max_outlinks_per_page,
            recrawl_threshold: chrono::Duration::days(config.recrawl_threshold_days),
        };

        let worker = Arc::new(CrawlWorker::new(
            url_store.clone(),
            link_store.clone(),
            scheduler.clone(),
            queue,
            robots,
            fetcher,
            Box::new(ScraperHtmlExtractor),
            worker_config,
        ));

        Ok(Self {
            url_store,
            seed_store,
            link_store,
            scheduler,
            config,
            worker,
            running: Mutex::new(None),
        })
    }

    pub async fn start_worker(&self, concurrency: usize) -> bool {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return false;
        }
        let (tx, rx) = watch::channel(false);
        let worker = self.worker.clone();
        let handle = tokio::spawn(async move {
            worker.run(concurrency.max(1), rx).await;
        });
        *running = Some(RunningWorker { shutdown: tx, handle });
        true
    }

    /// Stops the worker. `graceful` lets in-flight tasks drain;
    /// non-graceful aborts the loop task outright.
    pub async fn stop_worker(&self, graceful: bool) -> bool {
        let mut running = self.running.lock().await;
        let Some(worker) = running.take() else {
            return false;
        };
        let _ = worker.shutdown.send(true);
        if graceful {
            let _ = worker.handle.await;
        } else {
            worker.handle.abort();
        }
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.worker.dead_letters().len()
    }
}
