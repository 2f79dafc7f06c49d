//! Per-worker robots cache (§4.3.1): an LRU of at most `M` parsed robots
//! records, plus a TTL set of hosts blocked after repeated fetch
//! failures. In-memory only, per §5's shared-resource policy — lost
//! freely on worker restart.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use scour_types::Result;

use crate::traits::{RobotsDecision, RobotsFetcher, RobotsRules};

/// Consecutive robots-fetch failures before a host is blocked.
const FAILURE_THRESHOLD: u32 = 3;
/// How long a blocked host stays blocked.
const BLOCK_TTL: Duration = Duration::hours(1);

struct Lru {
    capacity: usize,
    /// Most-recently-used at the back.
    order: Vec<String>,
    entries: HashMap<String, RobotsRules>,
}

impl Lru {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, domain: &str) -> Option<RobotsRules> {
        if let Some(rules) = self.entries.get(domain).cloned() {
            self.touch(domain);
            Some(rules)
        } else {
            None
        }
    }

    fn put(&mut self, domain: String, rules: RobotsRules) {
        if !self.entries.contains_key(&domain) && self.entries.len() >= self.capacity {
            if let Some(evict) = self.order.first().cloned() {
                self.order.remove(0);
                self.entries.remove(&evict);
            }
        }
        self.entries.insert(domain.clone(), rules);
        self.touch(&domain);
    }

    fn touch(&mut self, domain: &str) {
        if let Some(pos) = self.order.iter().position(|d| d == domain) {
            self.order.remove(pos);
        }
        self.order.push(domain.to_string());
    }
}

struct BlockEntry {
    blocked_until: DateTime<Utc>,
}

pub struct RobotsCache {
    fetcher: Box<dyn RobotsFetcher>,
    lru: Mutex<Lru>,
    blocked: Mutex<HashMap<String, BlockEntry>>,
    failure_counts: Mutex<HashMap<String, u32>>,
}

impl RobotsCache {
    pub fn new(fetcher: Box<dyn RobotsFetcher>, capacity: usize) -> Self {
        Self {
            fetcher,
            lru: Mutex::new(Lru::new(capacity)),
            blocked: Mutex::new(HashMap::new()),
            failure_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a fetch of `path` on `domain` is currently permitted, per
    /// §4.3.1: a blocked host denies everything until its TTL elapses; a
    /// 404 robots.txt allows everything; otherwise the cached rules are
    /// consulted. Also returns the rules' `Crawl-delay`, if any, so the
    /// caller can wire it into the scheduler (§9 open question 4).
    pub async fn check(&self, domain: &str, path: &str) -> Result<(RobotsDecision, Option<i64>)> {
        {
            let mut blocked = self.blocked.lock().unwrap();
            if let Some(entry) = blocked.get(domain) {
                if Utc::now() < entry.blocked_until {
                    return Ok((RobotsDecision::Disallowed, None));
                }
                blocked.remove(domain);
            }
        }

        if let Some(rules) = self.lru.lock().unwrap().get(domain) {
            return Ok((rules.is_allowed(path), rules.crawl_delay_secs));
        }

        match self.fetcher.fetch_robots(domain).await {
            Ok(Some(rules)) => {
                self.failure_counts.lock().unwrap().remove(domain);
                let decision = rules.is_allowed(path);
                let delay = rules.crawl_delay_secs;
                self.lru.lock().unwrap().put(domain.to_string(), rules);
                Ok((decision, delay))
            }
            Ok(None) => {
                // 404 (or equivalent "no robots.txt"): allow all (§4.3.1).
                self.failure_counts.lock().unwrap().remove(domain);
                let rules = RobotsRules::allow_all();
                self.lru.lock().unwrap().put(domain.to_string(), rules);
                Ok((RobotsDecision::Allowed, None))
            }
            Err(e) => {
                let mut failures = self.failure_counts.lock().unwrap();
                let count = failures.entry(domain.to_string()).or_insert(0);
                *count += 1;
                if *count >= FAILURE_THRESHOLD {
                    tracing::warn!(domain, failures = *count, "blocking host after repeated robots fetch failures");
                    self.blocked.lock().unwrap().insert(
                        domain.to_string(),
                        BlockEntry { blocked_until: Utc::now() + BLOCK_TTL },
                    );
                    return Ok((RobotsDecision::Disallowed, None));
                }
                Err(e)
            }
        }
    }

    pub fn is_blocked(&self, domain: &str) -> bool {
        let blocked = self.blocked.lock().unwrap();
        blocked.get(domain).is_some_and(|e| Utc::now() < e.blocked_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scour_types::ScourError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AllowAll;
    #[async_trait]
    impl RobotsFetcher for AllowAll {
        async fn fetch_robots(&self, _domain: &str) -> Result<Option<RobotsRules>> {
            Ok(None)
        }
    }

    struct DisallowPrivate;
    #[async_trait]
    impl RobotsFetcher for DisallowPrivate {
        async fn fetch_robots(&self, _domain: &str) -> Result<Option<RobotsRules>> {
            Ok(Some(RobotsRules::new(None, vec!["/private".to_string()])))
        }
    }

    struct AlwaysFails {
        calls: Arc<AtomicU32>,
    }
    #[async_trait]
    impl RobotsFetcher for AlwaysFails {
        async fn fetch_robots(&self, _domain: &str) -> Result<Option<RobotsRules>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ScourError::Unavailable("boom".into()))
        }
    }

    #[tokio::test]
    async fn missing_robots_allows_everything() {
        let cache = RobotsCache::new(Box::new(AllowAll), 8);
        let (decision, _) = cache.check("a.test", "/anything").await.unwrap();
        assert_eq!(decision, RobotsDecision::Allowed);
    }

    #[tokio::test]
    async fn disallowed_prefix_is_denied() {
        let cache = RobotsCache::new(Box::new(DisallowPrivate), 8);
        let (decision, _) = cache.check("a.test", "/private/foo").await.unwrap();
        assert_eq!(decision, RobotsDecision::Disallowed);
        let (decision, _) = cache.check("a.test", "/public").await.unwrap();
        assert_eq!(decision, RobotsDecision::Allowed);
    }

    #[tokio::test]
    async fn blocks_host_after_three_consecutive_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let cache = RobotsCache::new(Box::new(AlwaysFails { calls: calls.clone() }), 8);

        assert!(cache.check("a.test", "/x").await.is_err());
        assert!(cache.check("a.test", "/x").await.is_err());
        // Third failure blocks instead of propagating an error.
        let (decision, _) = cache.check("a.test", "/x").await.unwrap();
        assert_eq!(decision, RobotsDecision::Disallowed);
        assert!(cache.is_blocked("a.test"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Further calls are denied without calling the fetcher again.
        let (decision, _) = cache.check("a.test", "/x").await.unwrap();
        assert_eq!(decision, RobotsDecision::Disallowed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn lru_evicts_least_recently_used() {
        let cache = RobotsCache::new(Box::new(AllowAll), 2);
        cache.check("a.test", "/").await.unwrap();
        cache.check("b.test", "/").await.unwrap();
        cache.check("a.test", "/").await.unwrap(); // touch a, making b the LRU victim
        cache.check("c.test", "/").await.unwrap(); // evicts b

        let mut lru = cache.lru.lock().unwrap();
        assert!(lru.get("a.test").is_some());
        assert!(lru.get("c.test").is_some());
        assert!(lru.get("b.test").is_none());
    }
}
