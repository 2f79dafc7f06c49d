//! `frontend-service` configuration: BM25/PageRank blend weights and
//! search-result pagination defaults.

use crate::database::DatabaseConfig;
use scour_types::{Result, ScourError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// BM25 term-frequency saturation. Environment variable: `BM25_K1`.
    pub k1: f64,
    /// BM25 length normalization. Environment variable: `BM25_B`.
    pub b: f64,
    /// Multiplicative boost for title-field matches. Environment
    /// variable: `TITLE_BOOST`.
    pub title_boost: f64,
    /// Multiplicative boost for content-field matches. Environment
    /// variable: `CONTENT_BOOST`.
    pub content_boost: f64,
    /// Weight applied to page PageRank in the additive blend.
    /// Environment variable: `PAGERANK_WEIGHT`.
    pub pagerank_weight: f64,
    /// RRF constant `k` used by hybrid mode. Environment variable: `RRF_K`.
    pub rrf_k: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            title_boost: 3.0,
            content_boost: 1.0,
            pagerank_weight: 0.5,
            rrf_k: 60.0,
        }
    }
}

impl RankingConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            k1: env_parse("BM25_K1", defaults.k1)?,
            b: env_parse("BM25_B", defaults.b)?,
            title_boost: env_parse("TITLE_BOOST", defaults.title_boost)?,
            content_boost: env_parse("CONTENT_BOOST", defaults.content_boost)?,
            pagerank_weight: env_parse("PAGERANK_WEIGHT", defaults.pagerank_weight)?,
            rrf_k: env_parse("RRF_K", defaults.rrf_k)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.k1 < 0.0 {
            return Err(ScourError::Config("BM25_K1 must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(ScourError::Config("BM25_B must be in [0, 1]".into()));
        }
        if self.rrf_k <= 0.0 {
            return Err(ScourError::Config("RRF_K must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub database: DatabaseConfig,
    pub ranking: RankingConfig,

    /// Server bind address. Environment variable: `BIND_ADDRESS`.
    pub bind_address: String,

    /// Default results per page when the client omits `per_page`.
    /// Environment variable: `DEFAULT_PAGE_SIZE`.
    pub default_page_size: i64,

    /// Maximum results per page a client may request. Environment
    /// variable: `MAX_PAGE_SIZE`.
    pub max_page_size: i64,

    /// Salt mixed into the session cookie before hashing for
    /// `session_hash`. Environment variable: `SESSION_HASH_SALT`.
    pub session_hash_salt: String,

    /// Base URL of the crawler service, used by `GET /api/predict` to
    /// proxy into `POST /score/predict` (§6). Environment variable:
    /// `CRAWLER_SERVICE_URL`.
    pub crawler_service_url: String,
}

impl FrontendConfig {
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig::from_env()?;
        let ranking = RankingConfig::from_env()?;
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8083".to_string());
        let default_page_size = env_parse("DEFAULT_PAGE_SIZE", 10)?;
        let max_page_size = env_parse("MAX_PAGE_SIZE", 100)?;
        let session_hash_salt =
            std::env::var("SESSION_HASH_SALT").unwrap_or_else(|_| "scour-default-salt".to_string());
        let crawler_service_url = std::env::var("CRAWLER_SERVICE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8081".to_string());

        Ok(Self {
            database,
            ranking,
            bind_address,
            default_page_size,
            max_page_size,
            session_hash_salt,
            crawler_service_url,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;
        self.ranking.validate()?;
        if self.default_page_size <= 0 {
            return Err(ScourError::Config(
                "DEFAULT_PAGE_SIZE must be positive".into(),
            ));
        }
        if self.max_page_size < self.default_page_size {
            return Err(ScourError::Config(
                "MAX_PAGE_SIZE must be >= DEFAULT_PAGE_SIZE".into(),
            ));
        }
        if self.session_hash_salt.trim().is_empty() {
            return Err(ScourError::Config(
                "SESSION_HASH_SALT must not be empty".into(),
            ));
        }
        if self.crawler_service_url.trim().is_empty() {
            return Err(ScourError::Config(
                "CRAWLER_SERVICE_URL must not be empty".into(),
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

    #[test]
    fn ranking_defaults_match_spec() {
        let r = RankingConfig::default();
        assert_eq!(r.k1, 1.2);
        assert_eq!(r.b, 0.75);
        assert_eq!(r.title_boost, 3.0);
        assert_eq!(r.content_boost, 1.0);
        assert_eq!(r.pagerank_weight, 0.5);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn rejects_b_out_of_range() {
        let mut r = RankingConfig::default();
        r.b = 1.5;
        assert!(r.validate().is_err());
    }

    #[test]
    fn frontend_rejects_max_below_default_page_size() {
        let cfg = FrontendConfig {
            database: DatabaseConfig {
                url: "sqlite://data.db".into(),
                backend: crate::database::DbBackend::Sqlite,
                max_connections: 5,
            },
            ranking: RankingConfig::default(),
            bind_address: "0.0.0.0:8083".into(),
            default_page_size: 50,
            max_page_size: 10,
            session_hash_salt: "salt".into(),
            crawler_service_url: "http://127.0.0.1:8081".into(),
        };
        assert!(cfg.validate().is_err());
    }
}
