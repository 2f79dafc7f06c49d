//! The durable Index Job Queue (§4.5): dedupe-keyed, lease-based,
//! at-least-once delivery, backed by the same relational store as the URL
//! Store.

use chrono::{DateTime, Duration, Utc};
use scour_store::DbPool;
use scour_types::{content_hash, dedupe_key, IndexJob, IndexJobStatus, Result, ScourError};
use scour_utils::exponential_backoff_secs;
use sqlx::Row;
use uuid::Uuid;

/// Tuning that would otherwise be re-derived on every call; mirrors
/// `IndexerConfig`'s job fields (`scour-config::indexer`).
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub max_retries: i32,
    pub retry_base_secs: f64,
    pub retry_max_secs: f64,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_base_secs: 10.0,
            retry_max_secs: 3600.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexJobQueue {
    pool: DbPool,
    policy: QueuePolicy,
}

/// Result of [`IndexJobQueue::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOutcome {
    pub job_id: String,
    pub created: bool,
}

impl IndexJobQueue {
    pub fn new(pool: DbPool, policy: QueuePolicy) -> Self {
        Self { pool, policy }
    }

    /// Computes `content_hash` and `dedupe_key`; on unique-violation
    /// returns the pre-existing job rather than erroring, converting the
    /// expected "already queued" outcome into data instead of an error
    /// path (§7).
    pub async fn enqueue(
        &self,
        url: &str,
        title: &str,
        content: &str,
        outlinks: &[String],
    ) -> Result<EnqueueOutcome> {
        let hash = content_hash(content);
        let dedupe = dedupe_key(url, &hash);
        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let outlinks_json =
            serde_json::to_string(outlinks).map_err(|e| ScourError::Validation(e.to_string()))?;

        let inserted = match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO index_jobs \
                     (job_id, url, title, content, outlinks, content_hash, dedupe_key, status, retry_count, max_retries, available_at, lease_until, worker_id, last_error, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, NULL, NULL, NULL, ?, ?) \
                     ON CONFLICT(dedupe_key) DO NOTHING",
                )
                .bind(&job_id)
                .bind(url)
                .bind(title)
                .bind(content)
                .bind(&outlinks_json)
                .bind(&hash)
                .bind(&dedupe)
                .bind(IndexJobStatus::Pending.as_db_str())
                .bind(self.policy.max_retries)
                .bind(now)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO index_jobs \
                     (job_id, url, title, content, outlinks, content_hash, dedupe_key, status, retry_count, max_retries, available_at, lease_until, worker_id, last_error, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, NULL, NULL, NULL, $11, $12) \
                     ON CONFLICT (dedupe_key) DO NOTHING",
                )
                .bind(&job_id)
                .bind(url)
                .bind(title)
                .bind(content)
                .bind(&outlinks_json)
                .bind(&hash)
                .bind(&dedupe)
                .bind(IndexJobStatus::Pending.as_db_str())
                .bind(self.policy.max_retries)
                .bind(now)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?
            }
        };

        if inserted.rows_affected() == 1 {
            return Ok(EnqueueOutcome { job_id, created: true });
        }

        // Already queued: look up the existing job id by dedupe_key.
        let existing_id: String = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT job_id FROM index_jobs WHERE dedupe_key = ?")
                .bind(&dedupe)
                .fetch_one(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT job_id FROM index_jobs WHERE dedupe_key = $1")
                .bind(&dedupe)
                .fetch_one(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(EnqueueOutcome {
            job_id: existing_id,
            created: false,
        })
    }

    /// Recovers expired leases, then atomically claims up to `limit`
    /// claimable jobs for `worker_id`.
    pub async fn claim(&self, limit: i64, lease_seconds: i64, worker_id: &str) -> Result<Vec<IndexJob>> {
        self.recover_expired_leases(Utc::now()).await?;
        let now = Utc::now();
        let lease_until = now + Duration::seconds(lease_seconds);

        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut conn = pool.acquire().await.map_err(db_err)?;
                sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.map_err(db_err)?;

                let rows = sqlx::query(
                    "SELECT job_id, url, title, content, outlinks, content_hash, dedupe_key, status, retry_count, max_retries, available_at, lease_until, worker_id, last_error, created_at, updated_at \
                     FROM index_jobs \
                     WHERE status IN ('pending', 'failed_retry') AND available_at <= ? \
                     ORDER BY available_at ASC, created_at ASC LIMIT ?",
                )
                .bind(now)
                .bind(limit)
                .fetch_all(&mut *conn)
                .await
                .map_err(db_err)?;

                let mut claimed = Vec::with_capacity(rows.len());
                for row in &rows {
                    let job_id: String = row.try_get("job_id").map_err(db_err)?;
                    sqlx::query(
                        "UPDATE index_jobs SET status = 'processing', lease_until = ?, worker_id = ?, updated_at = ? WHERE job_id = ?",
                    )
                    .bind(lease_until)
                    .bind(worker_id)
                    .bind(now)
                    .bind(&job_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(db_err)?;
                    claimed.push(row_to_job_sqlite(row, IndexJobStatus::Processing)?);
                }
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(db_err)?;
                Ok(claimed)
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                let rows = sqlx::query(
                    "SELECT job_id, url, title, content, outlinks, content_hash, dedupe_key, status, retry_count, max_retries, available_at, lease_until, worker_id, last_error, created_at, updated_at \
                     FROM index_jobs \
                     WHERE status IN ('pending', 'failed_retry') AND available_at <= $1 \
                     ORDER BY available_at ASC, created_at ASC LIMIT $2 FOR UPDATE SKIP LOCKED",
                )
                .bind(now)
                .bind(limit)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;

                let mut claimed = Vec::with_capacity(rows.len());
                let mut ids = Vec::with_capacity(rows.len());
                for row in &rows {
                    let job_id: String = row.try_get("job_id").map_err(db_err)?;
                    claimed.push(row_to_job_pg(row, IndexJobStatus::Processing)?);
                    ids.push(job_id);
                }
                if !ids.is_empty() {
                    sqlx::query(
                        "UPDATE index_jobs SET status = 'processing', lease_until = $1, worker_id = $2, updated_at = $3 WHERE job_id = ANY($4)",
                    )
                    .bind(lease_until)
                    .bind(worker_id)
                    .bind(now)
                    .bind(&ids)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }
                tx.commit().await.map_err(db_err)?;
                Ok(claimed)
            }
        }
    }

    pub async fn mark_done(&self, job_id: &str) -> Result<()> {
        let now = Utc::now();
        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query("UPDATE index_jobs SET status = 'done', lease_until = NULL, updated_at = ? WHERE job_id = ?")
                    .bind(now)
                    .bind(job_id)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query("UPDATE index_jobs SET status = 'done', lease_until = NULL, updated_at = $1 WHERE job_id = $2")
                    .bind(now)
                    .bind(job_id)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub async fn mark_failure(&self, job_id: &str, error: &str) -> Result<()> {
        let retry_count: i32 = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT retry_count FROM index_jobs WHERE job_id = ?")
                .bind(job_id)
                .fetch_one(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT retry_count FROM index_jobs WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(pool)
                .await
                .map_err(db_err)?,
        };
        let new_retry_count = retry_count + 1;
        let now = Utc::now();

        if new_retry_count >= self.policy.max_retries {
            self.apply_failure(job_id, error, new_retry_count, IndexJobStatus::FailedPermanent, now)
                .await
        } else {
            let delay = exponential_backoff_secs(
                self.policy.retry_base_secs,
                (new_retry_count - 1).max(0) as u32,
                self.policy.retry_max_secs,
            );
            let available_at = now + Duration::milliseconds((delay * 1000.0) as i64);
            self.apply_failure_with_availability(job_id, error, new_retry_count, available_at, now)
                .await
        }
    }

    async fn apply_failure(
        &self,
        job_id: &str,
        error: &str,
        retry_count: i32,
        status: IndexJobStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "UPDATE index_jobs SET status = ?, retry_count = ?, last_error = ?, lease_until = NULL, updated_at = ? WHERE job_id = ?",
                )
                .bind(status.as_db_str())
                .bind(retry_count)
                .bind(error)
                .bind(now)
                .bind(job_id)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "UPDATE index_jobs SET status = $1, retry_count = $2, last_error = $3, lease_until = NULL, updated_at = $4 WHERE job_id = $5",
                )
                .bind(status.as_db_str())
                .bind(retry_count)
                .bind(error)
                .bind(now)
                .bind(job_id)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }

    async fn apply_failure_with_availability(
        &self,
        job_id: &str,
        error: &str,
        retry_count: i32,
        available_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "UPDATE index_jobs SET status = 'failed_retry', retry_count = ?, last_error = ?, available_at = ?, lease_until = NULL, updated_at = ? WHERE job_id = ?",
                )
                .bind(retry_count)
                .bind(error)
                .bind(available_at)
                .bind(now)
                .bind(job_id)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "UPDATE index_jobs SET status = 'failed_retry', retry_count = $1, last_error = $2, available_at = $3, lease_until = NULL, updated_at = $4 WHERE job_id = $5",
                )
                .bind(retry_count)
                .bind(error)
                .bind(available_at)
                .bind(now)
                .bind(job_id)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }

    /// Every `processing` row whose lease has expired is treated as a
    /// failure with the same retry arithmetic as [`IndexJobQueue::mark_failure`].
    pub async fn recover_expired_leases(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired_ids: Vec<String> = match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar("SELECT job_id FROM index_jobs WHERE status = 'processing' AND lease_until < ?")
                    .bind(now)
                    .fetch_all(pool)
                    .await
                    .map_err(db_err)?
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar("SELECT job_id FROM index_jobs WHERE status = 'processing' AND lease_until < $1")
                    .bind(now)
                    .fetch_all(pool)
                    .await
                    .map_err(db_err)?
            }
        };
        for job_id in &expired_ids {
            self.mark_failure(job_id, "lease expired").await?;
        }
        Ok(expired_ids.len())
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<IndexJob>> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let row = sqlx::query(
                    "SELECT job_id, url, title, content, outlinks, content_hash, dedupe_key, status, retry_count, max_retries, available_at, lease_until, worker_id, last_error, created_at, updated_at \
                     FROM index_jobs WHERE job_id = ?",
                )
                .bind(job_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?;
                row.as_ref().map(|r| {
                    let status = status_from_row(r.try_get("status").map_err(db_err)?)?;
                    row_to_job_sqlite(r, status)
                }).transpose()
            }
            DbPool::Postgres(pool) => {
                let row = sqlx::query(
                    "SELECT job_id, url, title, content, outlinks, content_hash, dedupe_key, status, retry_count, max_retries, available_at, lease_until, worker_id, last_error, created_at, updated_at \
                     FROM index_jobs WHERE job_id = $1",
                )
                .bind(job_id)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?;
                row.as_ref().map(|r| {
                    let status = status_from_row(r.try_get("status").map_err(db_err)?)?;
                    row_to_job_pg(r, status)
                }).transpose()
            }
        }
    }

    /// Counts by status, plus the age in seconds of the oldest pending
    /// job, for `GET /indexer/health`.
    pub async fn health(&self) -> Result<QueueHealth> {
        let rows: Vec<(String, i64)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as("SELECT status, COUNT(*) FROM index_jobs GROUP BY status")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as("SELECT status, COUNT(*) FROM index_jobs GROUP BY status")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };
        let mut health = QueueHealth::default();
        for (status, count) in rows {
            match IndexJobStatus::from_db_str(&status) {
                Some(IndexJobStatus::Pending) => health.pending = count,
                Some(IndexJobStatus::Processing) => health.processing = count,
                Some(IndexJobStatus::Done) => health.done = count,
                Some(IndexJobStatus::FailedRetry) => health.failed_retry = count,
                Some(IndexJobStatus::FailedPermanent) => health.failed_permanent = count,
                None => {}
            }
        }
        let oldest_pending: Option<DateTime<Utc>> = match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar("SELECT MIN(created_at) FROM index_jobs WHERE status IN ('pending', 'failed_retry')")
                    .fetch_one(pool)
                    .await
                    .map_err(db_err)?
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar("SELECT MIN(created_at) FROM index_jobs WHERE status IN ('pending', 'failed_retry')")
                    .fetch_one(pool)
                    .await
                    .map_err(db_err)?
            }
        };
        health.oldest_pending_seconds = oldest_pending.map(|t| (Utc::now() - t).num_seconds().max(0));
        Ok(health)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueHealth {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed_retry: i64,
    pub failed_permanent: i64,
    pub oldest_pending_seconds: Option<i64>,
}

fn status_from_row(s: String) -> Result<IndexJobStatus> {
    IndexJobStatus::from_db_str(&s).ok_or_else(|| ScourError::Storage("unknown job status".into()))
}

fn row_to_job_sqlite(row: &sqlx::sqlite::SqliteRow, status: IndexJobStatus) -> Result<IndexJob> {
    let outlinks_json: String = row.try_get("outlinks").map_err(db_err)?;
    Ok(IndexJob {
        job_id: row.try_get("job_id").map_err(db_err)?,
        url: row.try_get("url").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        outlinks: serde_json::from_str(&outlinks_json).unwrap_or_default(),
        content_hash: row.try_get("content_hash").map_err(db_err)?,
        dedupe_key: row.try_get("dedupe_key").map_err(db_err)?,
        status,
        retry_count: row.try_get("retry_count").map_err(db_err)?,
        max_retries: row.try_get("max_retries").map_err(db_err)?,
        available_at: row.try_get("available_at").map_err(db_err)?,
        lease_until: row.try_get("lease_until").map_err(db_err)?,
        worker_id: row.try_get("worker_id").map_err(db_err)?,
        last_error: row.try_get("last_error").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn row_to_job_pg(row: &sqlx::postgres::PgRow, status: IndexJobStatus) -> Result<IndexJob> {
    let outlinks_json: String = row.try_get("outlinks").map_err(db_err)?;
    Ok(IndexJob {
        job_id: row.try_get("job_id").map_err(db_err)?,
        url: row.try_get("url").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        outlinks: serde_json::from_str(&outlinks_json).unwrap_or_default(),
        content_hash: row.try_get("content_hash").map_err(db_err)?,
        dedupe_key: row.try_get("dedupe_key").map_err(db_err)?,
        status,
        retry_count: row.try_get("retry_count").map_err(db_err)?,
        max_retries: row.try_get("max_retries").map_err(db_err)?,
        available_at: row.try_get("available_at").map_err(db_err)?,
        lease_until: row.try_get("lease_until").map_err(db_err)?,
        worker_id: row.try_get("worker_id").map_err(db_err)?,
        last_error: row.try_get("last_error").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}
