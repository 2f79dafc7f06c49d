//! `indexer-service` configuration: job queue lease/retry knobs and the
//! `X-API-Key` auth guard for `POST /indexer/page`.

use crate::database::DatabaseConfig;
use scour_types::{Result, ScourError};
use serde::{Deserialize, Serialize};

/// API key comparison config for the indexer's write endpoint.
///
/// Trimmed to the single key the indexer needs: outside test builds a
/// missing key is a hard startup error rather than "auth disabled".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerAuthConfig {
    pub api_key: Option<String>,
    pub require_auth: bool,
}

impl IndexerAuthConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("INDEXER_API_KEY").ok().filter(|s| !s.is_empty());
        let require_auth = std::env::var("REQUIRE_AUTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);
        Self {
            api_key,
            require_auth,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.require_auth && self.api_key.is_none() {
            return Err(ScourError::Config(
                "INDEXER_API_KEY is required when REQUIRE_AUTH is true".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub database: DatabaseConfig,
    pub auth: IndexerAuthConfig,

    /// Server bind address. Environment variable: `BIND_ADDRESS`.
    pub bind_address: String,

    /// Lease duration granted to a claimed job. Environment variable:
    /// `JOB_LEASE_SECS`.
    pub job_lease_secs: i64,

    /// Retries allowed before a job is marked permanently failed.
    /// Environment variable: `JOB_MAX_RETRIES`.
    pub job_max_retries: i32,

    /// Base backoff for job retry scheduling. Environment variable:
    /// `JOB_RETRY_BASE_SECS`.
    pub job_retry_base_secs: f64,

    /// Cap for job retry backoff. Environment variable:
    /// `JOB_RETRY_MAX_SECS`.
    pub job_retry_max_secs: f64,

    /// How many jobs a worker claims per poll. Environment variable:
    /// `WORKER_BATCH_SIZE`.
    pub worker_batch_size: i64,

    /// Interval between PageRank / domain-rank job runs (§4.8).
    /// Environment variable: `PAGERANK_INTERVAL_SECS`.
    pub pagerank_interval_secs: u64,
}

impl IndexerConfig {
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig::from_env()?;
        let auth = IndexerAuthConfig::from_env();
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8082".to_string());
        let job_lease_secs = env_parse("JOB_LEASE_SECS", 300)?;
        let job_max_retries = env_parse("JOB_MAX_RETRIES", 5)?;
        let job_retry_base_secs = env_parse("JOB_RETRY_BASE_SECS", 10.0)?;
        let job_retry_max_secs = env_parse("JOB_RETRY_MAX_SECS", 3600.0)?;
        let worker_batch_size = env_parse("WORKER_BATCH_SIZE", 16)?;
        let pagerank_interval_secs = env_parse("PAGERANK_INTERVAL_SECS", 300)?;

        Ok(Self {
            database,
            auth,
            bind_address,
            job_lease_secs,
            job_max_retries,
            job_retry_base_secs,
            job_retry_max_secs,
            worker_batch_size,
            pagerank_interval_secs,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.auth.validate()?;
        if self.job_lease_secs <= 0 {
            return Err(ScourError::Config("JOB_LEASE_SECS must be positive".into()));
        }
        if self.job_max_retries < 0 {
            return Err(ScourError::Config(
                "JOB_MAX_RETRIES must not be negative".into(),
            ));
        }
        if self.job_retry_max_secs < self.job_retry_base_secs {
            return Err(ScourError::Config(
                "JOB_RETRY_MAX_SECS must be >= JOB_RETRY_BASE_SECS".into(),
            ));
        }
        if self.worker_batch_size <= 0 {
            return Err(ScourError::Config(
                "WORKER_BATCH_SIZE must be positive".into(),
            ));
        }
        if self.pagerank_interval_secs == 0 {
            return Err(ScourError::Config(
                "PAGERANK_INTERVAL_SECS must be positive".into(),
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

    fn base() -> IndexerConfig {
        IndexerConfig {
            database: DatabaseConfig {
                url: "sqlite://data.db".into(),
                backend: crate::database::DbBackend::Sqlite,
                max_connections: 5,
            },
            auth: IndexerAuthConfig {
                api_key: Some("k".into()),
                require_auth: true,
            },
            bind_address: "0.0.0.0:8082".into(),
            job_lease_secs: 300,
            job_max_retries: 5,
            job_retry_base_secs: 10.0,
            job_retry_max_secs: 3600.0,
            worker_batch_size: 16,
            pagerank_interval_secs: 300,
        }
    }

    #[test]
    fn default_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn missing_key_with_auth_required_is_invalid() {
        let mut cfg = base();
        cfg.auth.api_key = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_key_with_auth_disabled_is_valid() {
        let mut cfg = base();
        cfg.auth.api_key = None;
        cfg.auth.require_auth = false;
        assert!(cfg.validate().is_ok());
    }
}
