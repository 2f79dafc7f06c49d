//! The buffered scheduler (§4.2): the single in-process decision point
//! between the URL Store and the Crawl Worker.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use scour_store::UrlStore;
use scour_types::{Result, UrlRecord};
use tokio::sync::Mutex as AsyncMutex;

use crate::host_gate::HostGate;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Buffer refills from the store whenever it holds fewer than
    /// `batch_size / 2` items.
    pub batch_size: usize,
    pub default_min_interval: Duration,
    pub default_concurrency_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            default_min_interval: Duration::seconds(1),
            default_concurrency_limit: 2,
        }
    }
}

pub struct Scheduler {
    store: UrlStore,
    config: SchedulerConfig,
    buffer: AsyncMutex<VecDeque<UrlRecord>>,
    gates: Mutex<HashMap<String, HostGate>>,
}

impl Scheduler {
    pub fn new(store: UrlStore, config: SchedulerConfig) -> Self {
        Self {
            store,
            config,
            buffer: AsyncMutex::new(VecDeque::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Returns up to `count` items whose domain gate currently allows a
    /// fetch. Items left behind keep their relative order; rate-limit
    /// rejections skip items but never reorder the buffer (§4.2).
    pub async fn get_ready(&self, count: usize) -> Result<Vec<UrlRecord>> {
        let mut buf = self.buffer.lock().await;
        if buf.len() < self.config.batch_size / 2 {
            let need = self.config.batch_size - buf.len();
            let fetched = self.store.claim_batch(need as i64).await?;
            buf.extend(fetched);
        }

        let now = Utc::now();
        let mut gates = self.gates.lock().unwrap();
        let mut ready = Vec::with_capacity(count);
        let mut remaining = VecDeque::with_capacity(buf.len());

        while let Some(item) = buf.pop_front() {
            if ready.len() >= count {
                remaining.push_back(item);
                continue;
            }
            let gate = gates
                .entry(item.domain.clone())
                .or_insert_with(|| HostGate::new(self.config.default_min_interval, self.config.default_concurrency_limit));
            if gate.allowed(now) {
                ready.push(item);
            } else {
                remaining.push_back(item);
            }
        }
        *buf = remaining;
        Ok(ready)
    }

    pub fn record_start(&self, domain: &str) {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(domain.to_string())
            .or_insert_with(|| HostGate::new(self.config.default_min_interval, self.config.default_concurrency_limit))
            .record_start();
    }

    pub fn record_complete(&self, domain: &str, success: bool) {
        let now = Utc::now();
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(domain.to_string())
            .or_insert_with(|| HostGate::new(self.config.default_min_interval, self.config.default_concurrency_limit))
            .record_complete(success, now);
    }

    pub fn set_crawl_delay(&self, domain: &str, seconds: i64) {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(domain.to_string())
            .or_insert_with(|| HostGate::new(self.config.default_min_interval, self.config.default_concurrency_limit))
            .set_crawl_delay(seconds);
    }

    /// Reinsert at the head of the buffer (used for robots-retryable
    /// items): they are tried again before anything else already queued.
    pub async fn return_to_buffer(&self, item: UrlRecord) {
        let mut buf = self.buffer.lock().await;
        buf.push_front(item);
    }

    pub async fn buffer_len(&self) -> usize {
        self.buffer.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scour_store::DbPool;
    use scour_types::AddOutcome;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_scheduler(config: SchedulerConfig) -> Scheduler {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = DbPool::Sqlite(pool);
        db.init_schema().await.unwrap();
        Scheduler::new(UrlStore::new(db), config)
    }

    #[tokio::test]
    async fn get_ready_respects_concurrency_limit() {
        let scheduler = memory_scheduler(SchedulerConfig {
            batch_size: 8,
            default_min_interval: Duration::seconds(0),
            default_concurrency_limit: 1,
        })
        .await;
        for i in 0..3 {
            let outcome = scheduler
                .store
                .add(&format!("https://a.test/{i}"), 1.0, None, Duration::days(7))
                .await
                .unwrap();
            assert_eq!(outcome, AddOutcome::Inserted);
        }

        let first = scheduler.get_ready(5).await.unwrap();
        assert_eq!(first.len(), 3, "all same-domain items are buffered together");

        // Simulate releasing only one at a time due to the concurrency gate.
        scheduler.return_to_buffer(first[2].clone()).await;
        scheduler.return_to_buffer(first[1].clone()).await;
        scheduler.record_start("a.test");

        let second = scheduler.get_ready(5).await.unwrap();
        assert!(second.is_empty(), "domain is already at its concurrency limit");
    }

    #[tokio::test]
    async fn failed_host_backs_off_before_next_ready() {
        let scheduler = memory_scheduler(SchedulerConfig {
            batch_size: 8,
            default_min_interval: Duration::seconds(3600),
            default_concurrency_limit: 5,
        })
        .await;
        scheduler
            .store
            .add("https://a.test/", 1.0, None, Duration::days(7))
            .await
            .unwrap();

        let first = scheduler.get_ready(5).await.unwrap();
        assert_eq!(first.len(), 1);
        scheduler.record_start("a.test");
        scheduler.record_complete("a.test", false);
        scheduler.return_to_buffer(first.into_iter().next().unwrap()).await;

        let second = scheduler.get_ready(5).await.unwrap();
        assert!(second.is_empty(), "host is backed off after a failure");
    }
}
