//! Search analytics (§4.10): append-only impression/click events keyed by
//! `request_id`, and the rolled-up quality-summary metrics the admin
//! dashboard reads (dashboard itself is out of scope, §1).

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hdrhistogram::Histogram;
use scour_store::DbPool;
use scour_types::{content_hash, normalize_query, EventType, Result, ScourError};
use uuid::Uuid;

/// Salted hash of an anonymous session cookie, used as `session_hash`
/// (§3, §4.10). Plain SHA-256 over `salt ++ cookie`, matching the
/// digest style already used for URL/content keys
/// (`scour_types::digest`).
pub fn hash_session(cookie: &str, salt: &str) -> String {
    let mut buf = String::with_capacity(salt.len() + cookie.len());
    buf.push_str(salt);
    buf.push_str(cookie);
    scour_types::digest16(buf.as_bytes())
}

/// The two windows `GET /api/quality/summary?window=` accepts (§4.10,
/// §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityWindow {
    Day,
    Week,
}

impl QualityWindow {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "24h" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            other => Err(ScourError::Validation(format!("unknown window: {other}"))),
        }
    }

    fn duration(&self) -> ChronoDuration {
        match self {
            Self::Day => ChronoDuration::hours(24),
            Self::Week => ChronoDuration::days(7),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualitySummary {
    pub impressions: i64,
    pub zero_hit_rate: f64,
    pub click_through_rate: f64,
    pub avg_click_rank: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub indexed_count: i64,
    pub pending_count: i64,
    pub crawl_success_rate: f64,
    pub short_content_rate: f64,
    pub duplicate_content_rate: f64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsStore {
    pool: DbPool,
}

impl AnalyticsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Records an impression for a search request that returned results,
    /// minting a fresh `request_id` (§4.10).
    pub async fn record_impression(
        &self,
        query: &str,
        result_count: i64,
        session_hash: &str,
        latency_ms: i64,
    ) -> Result<String> {
        let request_id = Uuid::new_v4().to_string();
        let query_norm = normalize_query(query);
        let now = Utc::now();

        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO search_events \
                     (event_type, query, query_norm, request_id, session_hash, result_count, clicked_url, clicked_rank, latency_ms, created_at) \
                     VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)",
                )
                .bind(EventType::Impression.as_db_str())
                .bind(query)
                .bind(&query_norm)
                .bind(&request_id)
                .bind(session_hash)
                .bind(result_count)
                .bind(latency_ms)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO search_events \
                     (event_type, query, query_norm, request_id, session_hash, result_count, clicked_url, clicked_rank, latency_ms, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL, $7, $8)",
                )
                .bind(EventType::Impression.as_db_str())
                .bind(query)
                .bind(&query_norm)
                .bind(&request_id)
                .bind(session_hash)
                .bind(result_count)
                .bind(latency_ms)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(request_id)
    }

    /// Records a client-reported click callback (§4.10, `POST
    /// /api/search/click`).
    pub async fn record_click(
        &self,
        request_id: &str,
        query: &str,
        clicked_url: &str,
        clicked_rank: i64,
        session_hash: &str,
    ) -> Result<()> {
        let query_norm = normalize_query(query);
        let now = Utc::now();

        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO search_events \
                     (event_type, query, query_norm, request_id, session_hash, result_count, clicked_url, clicked_rank, latency_ms, created_at) \
                     VALUES (?, ?, ?, ?, ?, NULL, ?, ?, NULL, ?)",
                )
                .bind(EventType::Click.as_db_str())
                .bind(query)
                .bind(&query_norm)
                .bind(request_id)
                .bind(session_hash)
                .bind(clicked_url)
                .bind(clicked_rank)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO search_events \
                     (event_type, query, query_norm, request_id, session_hash, result_count, clicked_url, clicked_rank, latency_ms, created_at) \
                     VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, NULL, $8)",
                )
                .bind(EventType::Click.as_db_str())
                .bind(query)
                .bind(&query_norm)
                .bind(request_id)
                .bind(session_hash)
                .bind(clicked_url)
                .bind(clicked_rank)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }

    /// Computes the §4.10 quality summary over `window`. Search-event
    /// metrics (impressions, CTR, latency) are windowed; crawl/index
    /// gauges (`indexed_count`, `pending_count`, ...) reflect current
    /// store-wide state, since they describe standing inventory rather
    /// than activity within a period.
    pub async fn quality_summary(&self, window: QualityWindow) -> Result<QualitySummary> {
        let since = Utc::now() - window.duration();

        let impressions = self.count_events(EventType::Impression, since).await?;
        let zero_hit = self.count_zero_hit_impressions(since).await?;
        let clicked_requests = self.count_distinct_clicked_requests(since).await?;
        let avg_click_rank = self.avg_click_rank(since).await?;
        let (p50, p95) = self.latency_percentiles(since).await?;

        let zero_hit_rate = safe_ratio(zero_hit, impressions);
        let click_through_rate = safe_ratio(clicked_requests, impressions);

        let indexed_count = self.indexed_count().await?;
        let (pending_count, done_count, failed_count) = self.url_counts().await?;
        let crawl_success_rate = safe_ratio(done_count, done_count + failed_count);
        let short_content_rate = self.short_content_rate().await?;
        let duplicate_content_rate = self.duplicate_content_rate().await?;

        Ok(QualitySummary {
            impressions,
            zero_hit_rate,
            click_through_rate,
            avg_click_rank,
            latency_p50_ms: p50,
            latency_p95_ms: p95,
            indexed_count,
            pending_count,
            crawl_success_rate,
            short_content_rate,
            duplicate_content_rate,
        })
    }

    async fn count_events(&self, event_type: EventType, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar(
                "SELECT COUNT(*) FROM search_events WHERE event_type = ? AND created_at >= ?",
            )
            .bind(event_type.as_db_str())
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar(
                "SELECT COUNT(*) FROM search_events WHERE event_type = $1 AND created_at >= $2",
            )
            .bind(event_type.as_db_str())
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
        };
        Ok(count)
    }

    async fn count_zero_hit_impressions(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar(
                "SELECT COUNT(*) FROM search_events WHERE event_type = 'impression' AND result_count = 0 AND created_at >= ?",
            )
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar(
                "SELECT COUNT(*) FROM search_events WHERE event_type = 'impression' AND result_count = 0 AND created_at >= $1",
            )
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
        };
        Ok(count)
    }

    async fn count_distinct_clicked_requests(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar(
                "SELECT COUNT(DISTINCT request_id) FROM search_events WHERE event_type = 'click' AND created_at >= ?",
            )
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar(
                "SELECT COUNT(DISTINCT request_id) FROM search_events WHERE event_type = 'click' AND created_at >= $1",
            )
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
        };
        Ok(count)
    }

    async fn avg_click_rank(&self, since: DateTime<Utc>) -> Result<f64> {
        let avg: Option<f64> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar(
                "SELECT AVG(clicked_rank) FROM search_events WHERE event_type = 'click' AND created_at >= ?",
            )
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar(
                "SELECT AVG(clicked_rank) FROM search_events WHERE event_type = 'click' AND created_at >= $1",
            )
            .bind(since)
            .fetch_one(pool)
            .await
            .map_err(db_err)?,
        };
        Ok(avg.unwrap_or(0.0))
    }

    /// p50/p95 of impression `latency_ms`, computed with an HDR histogram.
    async fn latency_percentiles(&self, since: DateTime<Utc>) -> Result<(f64, f64)> {
        let rows: Vec<i64> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar(
                "SELECT latency_ms FROM search_events WHERE event_type = 'impression' AND latency_ms IS NOT NULL AND created_at >= ?",
            )
            .bind(since)
            .fetch_all(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar(
                "SELECT latency_ms FROM search_events WHERE event_type = 'impression' AND latency_ms IS NOT NULL AND created_at >= $1",
            )
            .bind(since)
            .fetch_all(pool)
            .await
            .map_err(db_err)?,
        };
        if rows.is_empty() {
            return Ok((0.0, 0.0));
        }
        let mut hist = Histogram::<u64>::new_with_bounds(1, 3_600_000, 3).map_err(|e| ScourError::Storage(e.to_string()))?;
        for v in rows {
            let _ = hist.record(v.max(0) as u64);
        }
        Ok((hist.value_at_percentile(50.0) as f64, hist.value_at_percentile(95.0) as f64))
    }

    async fn indexed_count(&self) -> Result<i64> {
        let count: i64 = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT COUNT(*) FROM documents")
                .fetch_one(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT COUNT(*) FROM documents")
                .fetch_one(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(count)
    }

    /// `(pending_count, done_count, failed_count)` over `urls`.
    async fn url_counts(&self) -> Result<(i64, i64, i64)> {
        let rows: Vec<(String, i64)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as("SELECT status, COUNT(*) FROM urls GROUP BY status")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as("SELECT status, COUNT(*) FROM urls GROUP BY status")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };
        let mut counts: HashMap<String, i64> = rows.into_iter().collect();
        Ok((
            counts.remove("pending").unwrap_or(0),
            counts.remove("done").unwrap_or(0),
            counts.remove("failed").unwrap_or(0),
        ))
    }

    async fn short_content_rate(&self) -> Result<f64> {
        let (short, total): (i64, i64) = match &self.pool {
            DbPool::Sqlite(pool) => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents").fetch_one(pool).await.map_err(db_err)?;
                let short: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE word_count < 80")
                    .fetch_one(pool)
                    .await
                    .map_err(db_err)?;
                (short, total)
            }
            DbPool::Postgres(pool) => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents").fetch_one(pool).await.map_err(db_err)?;
                let short: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE word_count < 80")
                    .fetch_one(pool)
                    .await
                    .map_err(db_err)?;
                (short, total)
            }
        };
        Ok(safe_ratio(short, total))
    }

    /// Fraction of documents whose content hash collides with at least
    /// one other document's. There is no stored `content_hash` column on
    /// `documents` (only the index job queue dedupes on content hash), so
    /// this reads and hashes the full corpus; acceptable at the scale
    /// this core targets (§1), but a candidate for a materialized column
    /// if the corpus grows large enough to make the scan expensive.
    async fn duplicate_content_rate(&self) -> Result<f64> {
        let contents: Vec<String> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT content FROM documents")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT content FROM documents")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };
        if contents.is_empty() {
            return Ok(0.0);
        }
        let mut counts: HashMap<String, i64> = HashMap::new();
        for content in &contents {
            *counts.entry(content_hash(content)).or_insert(0) += 1;
        }
        let duplicates: i64 = counts.values().filter(|&&c| c > 1).sum();
        Ok(safe_ratio(duplicates, contents.len() as i64))
    }
}

fn safe_ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scour_store::DbPool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> AnalyticsStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let db = DbPool::Sqlite(pool);
        db.init_schema().await.unwrap();
        AnalyticsStore::new(db)
    }

    #[test]
    fn session_hash_is_deterministic_and_salted() {
        let a = hash_session("cookie-1", "salt-a");
        let b = hash_session("cookie-1", "salt-b");
        assert_ne!(a, b);
        assert_eq!(a, hash_session("cookie-1", "salt-a"));
    }

    #[test]
    fn window_parses_known_values_only() {
        assert_eq!(QualityWindow::parse("24h").unwrap(), QualityWindow::Day);
        assert_eq!(QualityWindow::parse("7d").unwrap(), QualityWindow::Week);
        assert!(QualityWindow::parse("1m").is_err());
    }

    #[tokio::test]
    async fn impression_then_click_raises_ctr() {
        let store = memory_store().await;
        let request_id = store.record_impression("rust guide", 3, "sess-1", 42).await.unwrap();
        store.record_click(&request_id, "rust guide", "https://a.test/", 1, "sess-1").await.unwrap();

        let summary = store.quality_summary(QualityWindow::Day).await.unwrap();
        assert_eq!(summary.impressions, 1);
        assert_eq!(summary.click_through_rate, 1.0);
        assert_eq!(summary.avg_click_rank, 1.0);
    }

    #[tokio::test]
    async fn zero_hit_impressions_raise_zero_hit_rate() {
        let store = memory_store().await;
        store.record_impression("no such query", 0, "sess-2", 10).await.unwrap();
        let summary = store.quality_summary(QualityWindow::Day).await.unwrap();
        assert_eq!(summary.zero_hit_rate, 1.0);
    }

    #[tokio::test]
    async fn empty_store_yields_zeroed_summary() {
        let store = memory_store().await;
        let summary = store.quality_summary(QualityWindow::Week).await.unwrap();
        assert_eq!(summary, QualitySummary::default());
    }
}
