//! The URL lifecycle store (§3, §4.1): pending → crawling → done/failed,
//! with recrawl scheduling and crash recovery.

use chrono::{DateTime, Duration, Utc};
use scour_types::{url_digest, AddOutcome, Result, ScourError, UrlRecord, UrlStatus};
use sqlx::Row;

use crate::db::DbPool;

#[derive(Debug, Clone)]
pub struct UrlStore {
    pool: DbPool,
}

/// Read-only aggregate counts, §4.1 `stats()`.
#[derive(Debug, Clone, Default)]
pub struct UrlStoreStats {
    pub pending: i64,
    pub crawling: i64,
    pub done: i64,
    pub failed: i64,
}

impl UrlStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert fresh as `pending`, or restore a `done`/`failed` row older
    /// than `recrawl_threshold`; otherwise a no-op. Atomic per call.
    pub async fn add(
        &self,
        url: &str,
        priority: f64,
        source: Option<&str>,
        recrawl_threshold: Duration,
    ) -> Result<AddOutcome> {
        let domain = scour_types::domain_of(url)?;
        let digest = url_digest(url);
        let now = Utc::now();

        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                let existing = sqlx::query(
                    "SELECT status, last_crawled_at FROM urls WHERE url_digest = ?",
                )
                .bind(&digest)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

                let outcome = match existing {
                    None => {
                        sqlx::query(
                            "INSERT INTO urls (url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at) \
                             VALUES (?, ?, ?, ?, ?, ?, 0, ?, NULL)",
                        )
                        .bind(&digest)
                        .bind(url)
                        .bind(&domain)
                        .bind(UrlStatus::Pending.as_db_str())
                        .bind(priority)
                        .bind(source)
                        .bind(now)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                        AddOutcome::Inserted
                    }
                    Some(row) => {
                        let status = UrlStatus::from_db_str(row.try_get::<String, _>("status").map_err(db_err)?.as_str())
                            .ok_or_else(|| ScourError::Storage("unknown url status".into()))?;
                        let last_crawled_at: Option<DateTime<Utc>> =
                            row.try_get("last_crawled_at").map_err(db_err)?;
                        if is_terminal(status) && is_stale(last_crawled_at, now, recrawl_threshold) {
                            sqlx::query(
                                "UPDATE urls SET status = ?, priority = ?, source_url = ? WHERE url_digest = ?",
                            )
                            .bind(UrlStatus::Pending.as_db_str())
                            .bind(priority)
                            .bind(source)
                            .bind(&digest)
                            .execute(&mut *tx)
                            .await
                            .map_err(db_err)?;
                            AddOutcome::Restored
                        } else {
                            AddOutcome::NoOp
                        }
                    }
                };
                tx.commit().await.map_err(db_err)?;
                Ok(outcome)
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                let existing = sqlx::query(
                    "SELECT status, last_crawled_at FROM urls WHERE url_digest = $1",
                )
                .bind(&digest)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

                let outcome = match existing {
                    None => {
                        sqlx::query(
                            "INSERT INTO urls (url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at) \
                             VALUES ($1, $2, $3, $4, $5, $6, 0, $7, NULL)",
                        )
                        .bind(&digest)
                        .bind(url)
                        .bind(&domain)
                        .bind(UrlStatus::Pending.as_db_str())
                        .bind(priority)
                        .bind(source)
                        .bind(now)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                        AddOutcome::Inserted
                    }
                    Some(row) => {
                        let status = UrlStatus::from_db_str(row.try_get::<String, _>("status").map_err(db_err)?.as_str())
                            .ok_or_else(|| ScourError::Storage("unknown url status".into()))?;
                        let last_crawled_at: Option<DateTime<Utc>> =
                            row.try_get("last_crawled_at").map_err(db_err)?;
                        if is_terminal(status) && is_stale(last_crawled_at, now, recrawl_threshold) {
                            sqlx::query(
                                "UPDATE urls SET status = $1, priority = $2, source_url = $3 WHERE url_digest = $4",
                            )
                            .bind(UrlStatus::Pending.as_db_str())
                            .bind(priority)
                            .bind(source)
                            .bind(&digest)
                            .execute(&mut *tx)
                            .await
                            .map_err(db_err)?;
                            AddOutcome::Restored
                        } else {
                            AddOutcome::NoOp
                        }
                    }
                };
                tx.commit().await.map_err(db_err)?;
                Ok(outcome)
            }
        }
    }

    /// Same semantics as [`UrlStore::add`], one call per URL, but the
    /// whole batch is one logical unit: a storage error aborts the entire
    /// batch rather than leaving a partial add.
    pub async fn add_batch(
        &self,
        urls: &[(String, f64, Option<String>)],
        recrawl_threshold: Duration,
    ) -> Result<usize> {
        let mut added = 0usize;
        for (url, priority, source) in urls {
            let outcome = self
                .add(url, *priority, source.as_deref(), recrawl_threshold)
                .await?;
            if outcome.was_added() {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Select up to `n` highest-priority `pending` rows, flip them to
    /// `crawling`, and return them — atomically, with no row returned to
    /// two concurrent callers.
    pub async fn claim_batch(&self, n: i64) -> Result<Vec<UrlRecord>> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut conn = pool.acquire().await.map_err(db_err)?;
                sqlx::query("BEGIN IMMEDIATE")
                    .execute(&mut *conn)
                    .await
                    .map_err(db_err)?;

                let rows = sqlx::query(
                    "SELECT url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at \
                     FROM urls WHERE status = 'pending' ORDER BY priority DESC, created_at ASC LIMIT ?",
                )
                .bind(n)
                .fetch_all(&mut *conn)
                .await
                .map_err(db_err)?;

                let mut claimed = Vec::with_capacity(rows.len());
                for row in &rows {
                    let digest: String = row.try_get("url_digest").map_err(db_err)?;
                    sqlx::query("UPDATE urls SET status = 'crawling' WHERE url_digest = ?")
                        .bind(&digest)
                        .execute(&mut *conn)
                        .await
                        .map_err(db_err)?;
                    claimed.push(row_to_record_sqlite(row, UrlStatus::Crawling)?);
                }

                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(db_err)?;
                Ok(claimed)
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                let rows = sqlx::query(
                    "SELECT url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at \
                     FROM urls WHERE status = 'pending' \
                     ORDER BY priority DESC, created_at ASC LIMIT $1 FOR UPDATE SKIP LOCKED",
                )
                .bind(n)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;

                let mut claimed = Vec::with_capacity(rows.len());
                let mut digests = Vec::with_capacity(rows.len());
                for row in &rows {
                    let digest: String = row.try_get("url_digest").map_err(db_err)?;
                    claimed.push(row_to_record_pg(row, UrlStatus::Crawling)?);
                    digests.push(digest);
                }
                if !digests.is_empty() {
                    sqlx::query("UPDATE urls SET status = 'crawling' WHERE url_digest = ANY($1)")
                        .bind(&digests)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                tx.commit().await.map_err(db_err)?;
                Ok(claimed)
            }
        }
    }

    /// Set terminal status, bump `crawl_count`, stamp `last_crawled_at`.
    /// Inserts the row in its terminal state if it was never known.
    pub async fn record(&self, url: &str, status: UrlStatus) -> Result<()> {
        debug_assert!(matches!(status, UrlStatus::Done | UrlStatus::Failed));
        let digest = url_digest(url);
        let domain = scour_types::domain_of(url)?;
        let now = Utc::now();

        match &self.pool {
            DbPool::Sqlite(pool) => {
                let updated = sqlx::query(
                    "UPDATE urls SET status = ?, last_crawled_at = ?, crawl_count = crawl_count + 1 WHERE url_digest = ?",
                )
                .bind(status.as_db_str())
                .bind(now)
                .bind(&digest)
                .execute(pool)
                .await
                .map_err(db_err)?;
                if updated.rows_affected() == 0 {
                    sqlx::query(
                        "INSERT INTO urls (url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at) \
                         VALUES (?, ?, ?, ?, 0.0, NULL, 1, ?, ?)",
                    )
                    .bind(&digest)
                    .bind(url)
                    .bind(&domain)
                    .bind(status.as_db_str())
                    .bind(now)
                    .bind(now)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
                }
            }
            DbPool::Postgres(pool) => {
                let updated = sqlx::query(
                    "UPDATE urls SET status = $1, last_crawled_at = $2, crawl_count = crawl_count + 1 WHERE url_digest = $3",
                )
                .bind(status.as_db_str())
                .bind(now)
                .bind(&digest)
                .execute(pool)
                .await
                .map_err(db_err)?;
                if updated.rows_affected() == 0 {
                    sqlx::query(
                        "INSERT INTO urls (url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at) \
                         VALUES ($1, $2, $3, $4, 0.0, NULL, 1, $5, $6)",
                    )
                    .bind(&digest)
                    .bind(url)
                    .bind(&domain)
                    .bind(status.as_db_str())
                    .bind(now)
                    .bind(now)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
                }
            }
        }
        Ok(())
    }

    /// Crash-recovery point: every `crawling` row becomes `pending` again.
    /// There is deliberately no per-row lease (§4.1) — the Crawl Worker is
    /// the only process that sets `crawling`, so a blanket reset on
    /// startup is correct.
    pub async fn recover_stale_crawling(&self) -> Result<u64> {
        let result = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query("UPDATE urls SET status = 'pending' WHERE status = 'crawling'")
                .execute(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query("UPDATE urls SET status = 'pending' WHERE status = 'crawling'")
                .execute(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(result.rows_affected())
    }

    pub async fn is_recently_crawled(&self, url: &str, recrawl_threshold: Duration) -> Result<bool> {
        let digest = url_digest(url);
        let last_crawled_at: Option<DateTime<Utc>> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT last_crawled_at FROM urls WHERE url_digest = ?")
                .bind(&digest)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?
                .flatten(),
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT last_crawled_at FROM urls WHERE url_digest = $1")
                .bind(&digest)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?
                .flatten(),
        };
        Ok(!is_stale(last_crawled_at, Utc::now(), recrawl_threshold))
    }

    pub async fn stats(&self) -> Result<UrlStoreStats> {
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
        let mut stats = UrlStoreStats::default();
        for (status, count) in rows {
            match UrlStatus::from_db_str(&status) {
                Some(UrlStatus::Pending) => stats.pending = count,
                Some(UrlStatus::Crawling) => stats.crawling = count,
                Some(UrlStatus::Done) => stats.done = count,
                Some(UrlStatus::Failed) => stats.failed = count,
                None => {}
            }
        }
        Ok(stats)
    }

    pub async fn peek(&self, n: i64) -> Result<Vec<UrlRecord>> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let rows = sqlx::query(
                    "SELECT url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at \
                     FROM urls WHERE status = 'pending' ORDER BY priority DESC, created_at ASC LIMIT ?",
                )
                .bind(n)
                .fetch_all(pool)
                .await
                .map_err(db_err)?;
                rows.iter().map(|r| row_to_record_sqlite(r, UrlStatus::Pending)).collect()
            }
            DbPool::Postgres(pool) => {
                let rows = sqlx::query(
                    "SELECT url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at \
                     FROM urls WHERE status = 'pending' ORDER BY priority DESC, created_at ASC LIMIT $1",
                )
                .bind(n)
                .fetch_all(pool)
                .await
                .map_err(db_err)?;
                rows.iter().map(|r| row_to_record_pg(r, UrlStatus::Pending)).collect()
            }
        }
    }

    pub async fn domain_counts(&self, limit: i64) -> Result<Vec<(String, i64)>> {
        match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as(
                "SELECT domain, COUNT(*) as c FROM urls GROUP BY domain ORDER BY c DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(db_err),
            DbPool::Postgres(pool) => sqlx::query_as(
                "SELECT domain, COUNT(*) as c FROM urls GROUP BY domain ORDER BY c DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(db_err),
        }
    }

    /// Attempts for `url`, most recent first. Approximated from the
    /// single-row URL record (this store keeps no per-attempt log), so
    /// the result is at most one entry; a dedicated `crawl_history` table
    /// would be needed for a true multi-attempt log, which is out of
    /// scope for the core URL lifecycle (§1).
    pub async fn history(&self, url: &str) -> Result<Vec<UrlRecord>> {
        let digest = url_digest(url);
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let row = sqlx::query(
                    "SELECT url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at \
                     FROM urls WHERE url_digest = ?",
                )
                .bind(&digest)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?;
                match row {
                    Some(r) => {
                        let status = UrlStatus::from_db_str(
                            r.try_get::<String, _>("status").map_err(db_err)?.as_str(),
                        )
                        .ok_or_else(|| ScourError::Storage("unknown url status".into()))?;
                        Ok(vec![row_to_record_sqlite(&r, status)?])
                    }
                    None => Ok(vec![]),
                }
            }
            DbPool::Postgres(pool) => {
                let row = sqlx::query(
                    "SELECT url_digest, url, domain, status, priority, source_url, crawl_count, created_at, last_crawled_at \
                     FROM urls WHERE url_digest = $1",
                )
                .bind(&digest)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?;
                match row {
                    Some(r) => {
                        let status = UrlStatus::from_db_str(
                            r.try_get::<String, _>("status").map_err(db_err)?.as_str(),
                        )
                        .ok_or_else(|| ScourError::Storage("unknown url status".into()))?;
                        Ok(vec![row_to_record_pg(&r, status)?])
                    }
                    None => Ok(vec![]),
                }
            }
        }
    }
}

fn is_terminal(status: UrlStatus) -> bool {
    matches!(status, UrlStatus::Done | UrlStatus::Failed)
}

fn is_stale(last_crawled_at: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match last_crawled_at {
        None => true,
        Some(t) => now - t > threshold,
    }
}

fn row_to_record_sqlite(row: &sqlx::sqlite::SqliteRow, status: UrlStatus) -> Result<UrlRecord> {
    Ok(UrlRecord {
        url: row.try_get("url").map_err(db_err)?,
        domain: row.try_get("domain").map_err(db_err)?,
        status,
        priority: row.try_get("priority").map_err(db_err)?,
        source_url: row.try_get("source_url").map_err(db_err)?,
        crawl_count: row.try_get("crawl_count").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        last_crawled_at: row.try_get("last_crawled_at").map_err(db_err)?,
    })
}

fn row_to_record_pg(row: &sqlx::postgres::PgRow, status: UrlStatus) -> Result<UrlRecord> {
    Ok(UrlRecord {
        url: row.try_get("url").map_err(db_err)?,
        domain: row.try_get("domain").map_err(db_err)?,
        status,
        priority: row.try_get("priority").map_err(db_err)?,
        source_url: row.try_get("source_url").map_err(db_err)?,
        crawl_count: row.try_get("crawl_count").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        last_crawled_at: row.try_get("last_crawled_at").map_err(db_err)?,
    })
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}
