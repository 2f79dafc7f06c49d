//! `crawler-service` configuration: scheduler politeness knobs, URL Store
//! recrawl threshold, and the HTTP fetch limits handed to the injected
//! `Fetcher`/`HtmlExtractor`/`RobotsFetcher` implementations.

use crate::database::DatabaseConfig;
use scour_types::{Result, ScourError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub database: DatabaseConfig,

    /// Server bind address. Environment variable: `BIND_ADDRESS`.
    pub bind_address: String,

    /// Days since `last_crawled_at` before a `done` URL becomes eligible
    /// for recrawl again. Environment variable: `RECRAWL_THRESHOLD_DAYS`.
    pub recrawl_threshold_days: i64,

    /// Minimum seconds between two fetches of the same domain.
    /// Environment variable: `MIN_CRAWL_DELAY_SECS`.
    pub min_crawl_delay_secs: f64,

    /// Maximum in-flight requests for a single domain at once.
    /// Environment variable: `MAX_CONCURRENT_PER_HOST`.
    pub max_concurrent_per_host: u32,

    /// Upper bound of the exponential host backoff. Environment variable:
    /// `MAX_BACKOFF_SECS`.
    pub max_backoff_secs: f64,

    /// Maximum outlinks recorded per crawled page. Environment variable:
    /// `MAX_OUTLINKS_PER_PAGE`.
    pub max_outlinks_per_page: usize,

    /// Response body ceiling in bytes; larger bodies are treated as a
    /// permanent transport failure. Environment variable:
    /// `MAX_RESPONSE_BYTES`.
    pub max_response_bytes: usize,

    /// Per-request HTTP timeout. Environment variable: `REQUEST_TIMEOUT_SECS`.
    pub request_timeout: Duration,

    /// User-Agent string sent with every request and consulted against
    /// robots.txt. Environment variable: `USER_AGENT`.
    pub user_agent: String,

    /// How many URLs the worker pool claims per scheduler poll.
    /// Environment variable: `WORKER_CONCURRENCY`.
    pub worker_concurrency: usize,
}

impl CrawlerConfig {
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig::from_env()?;
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8081".to_string());
        let recrawl_threshold_days = env_parse("RECRAWL_THRESHOLD_DAYS", 7)?;
        let min_crawl_delay_secs = env_parse("MIN_CRAWL_DELAY_SECS", 1.0)?;
        let max_concurrent_per_host = env_parse("MAX_CONCURRENT_PER_HOST", 2)?;
        let max_backoff_secs = env_parse("MAX_BACKOFF_SECS", 3600.0)?;
        let max_outlinks_per_page = env_parse("MAX_OUTLINKS_PER_PAGE", 200)?;
        let max_response_bytes = env_parse("MAX_RESPONSE_BYTES", 10 * 1024 * 1024)?;
        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 10)?;
        let user_agent = std::env::var("USER_AGENT")
            .unwrap_or_else(|_| "scour-crawler/0.1 (+https://example.invalid/bot)".to_string());
        let worker_concurrency = env_parse("WORKER_CONCURRENCY", 8)?;

        Ok(Self {
            database,
            bind_address,
            recrawl_threshold_days,
            min_crawl_delay_secs,
            max_concurrent_per_host,
            max_backoff_secs,
            max_outlinks_per_page,
            max_response_bytes,
            request_timeout: Duration::from_secs(request_timeout_secs),
            user_agent,
            worker_concurrency,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        if self.recrawl_threshold_days < 0 {
            return Err(ScourError::Config(
                "RECRAWL_THRESHOLD_DAYS must not be negative".into(),
            ));
        }
        if self.min_crawl_delay_secs <= 0.0 {
            return Err(ScourError::Config(
                "MIN_CRAWL_DELAY_SECS must be positive".into(),
            ));
        }
        if self.max_concurrent_per_host == 0 {
            return Err(ScourError::Config(
                "MAX_CONCURRENT_PER_HOST must be at least 1".into(),
            ));
        }
        if self.max_backoff_secs < self.min_crawl_delay_secs {
            return Err(ScourError::Config(
                "MAX_BACKOFF_SECS must be >= MIN_CRAWL_DELAY_SECS".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ScourError::Config("USER_AGENT must not be empty".into()));
        }
        if self.worker_concurrency == 0 {
            return Err(ScourError::Config(
                "WORKER_CONCURRENCY must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ScourError::Config(format!("{var} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CrawlerConfig {
        CrawlerConfig {
            database: DatabaseConfig {
                url: "sqlite://data.db".into(),
                backend: crate::database::DbBackend::Sqlite,
                max_connections: 5,
            },
            bind_address: "0.0.0.0:8081".into(),
            recrawl_threshold_days: 7,
            min_crawl_delay_secs: 1.0,
            max_concurrent_per_host: 2,
            max_backoff_secs: 3600.0,
            max_outlinks_per_page: 200,
            max_response_bytes: 1024,
            request_timeout: Duration::from_secs(10),
            user_agent: "test-agent".into(),
            worker_concurrency: 4,
        }
    }

    #[test]
    fn default_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_backoff_below_min_delay() {
        let mut cfg = base();
        cfg.max_backoff_secs = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut cfg = base();
        cfg.max_concurrent_per_host = 0;
        assert!(cfg.validate().is_err());
    }
}
