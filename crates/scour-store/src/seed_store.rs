//! The durable seed set (§3): entry points that survive "clear the crawl
//! history" because they live in their own table, separate from `urls`.

use std::io::Read;

use chrono::{Duration, Utc};
use scour_types::{Result, ScourError, SeedRecord};
use sqlx::Row;

use crate::db::DbPool;
use crate::url_store::UrlStore;

#[derive(Debug, Clone)]
pub struct SeedStore {
    pool: DbPool,
}

impl SeedStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn add_seed(&self, url: &str) -> Result<()> {
        let now = Utc::now();
        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO seeds (url, added_at, last_queued) VALUES (?, ?, NULL) \
                     ON CONFLICT(url) DO NOTHING",
                )
                .bind(url)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO seeds (url, added_at, last_queued) VALUES ($1, $2, NULL) \
                     ON CONFLICT (url) DO NOTHING",
                )
                .bind(url)
                .bind(now)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub async fn remove_seed(&self, url: &str) -> Result<()> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query("DELETE FROM seeds WHERE url = ?")
                    .bind(url)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query("DELETE FROM seeds WHERE url = $1")
                    .bind(url)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub async fn list_seeds(&self) -> Result<Vec<SeedRecord>> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let rows = sqlx::query("SELECT url, added_at, last_queued FROM seeds ORDER BY added_at ASC")
                    .fetch_all(pool)
                    .await
                    .map_err(db_err)?;
                rows.iter().map(row_to_seed_sqlite).collect()
            }
            DbPool::Postgres(pool) => {
                let rows = sqlx::query("SELECT url, added_at, last_queued FROM seeds ORDER BY added_at ASC")
                    .fetch_all(pool)
                    .await
                    .map_err(db_err)?;
                rows.iter().map(row_to_seed_pg).collect()
            }
        }
    }

    /// Re-`add`s every seed at a fixed high priority, bumping
    /// `last_queued`. Returns how many were truly added/restored.
    pub async fn requeue_seeds(&self, url_store: &UrlStore, priority: f64, recrawl_threshold: Duration) -> Result<usize> {
        let seeds = self.list_seeds().await?;
        let mut requeued = 0usize;
        let now = Utc::now();
        for seed in &seeds {
            let outcome = url_store.add(&seed.url, priority, None, recrawl_threshold).await?;
            if outcome.was_added() {
                requeued += 1;
            }
            match &self.pool {
                DbPool::Sqlite(pool) => {
                    sqlx::query("UPDATE seeds SET last_queued = ? WHERE url = ?")
                        .bind(now)
                        .bind(&seed.url)
                        .execute(pool)
                        .await
                        .map_err(db_err)?;
                }
                DbPool::Postgres(pool) => {
                    sqlx::query("UPDATE seeds SET last_queued = $1 WHERE url = $2")
                        .bind(now)
                        .bind(&seed.url)
                        .execute(pool)
                        .await
                        .map_err(db_err)?;
                }
            }
        }
        Ok(requeued)
    }

    /// Unzips `zip_bytes`, reads the Tranco `rank,domain` CSV inside it,
    /// takes the first `n` rows, converts each row to `https://{domain}/`
    /// and adds it as both a seed and a URL Store entry. Priority rewards
    /// well-known domains: `priority = max(1.0, 100.0 - ln(rank))`.
    pub async fn import_tranco(
        &self,
        zip_bytes: &[u8],
        n: usize,
        url_store: &UrlStore,
        recrawl_threshold: Duration,
    ) -> Result<usize> {
        let cursor = std::io::Cursor::new(zip_bytes);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|e| ScourError::Validation(format!("invalid tranco zip: {e}")))?;
        if archive.len() == 0 {
            return Err(ScourError::Validation("tranco zip contains no files".into()));
        }
        let mut file = archive
            .by_index(0)
            .map_err(|e| ScourError::Validation(format!("invalid tranco zip entry: {e}")))?;
        let mut csv_bytes = Vec::new();
        file.read_to_end(&mut csv_bytes)
            .map_err(|e| ScourError::Validation(format!("failed reading tranco csv: {e}")))?;
        drop(file);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(csv_bytes.as_slice());

        let mut imported = 0usize;
        for result in reader.records() {
            if imported >= n {
                break;
            }
            let record = result.map_err(|e| ScourError::Validation(format!("invalid tranco csv row: {e}")))?;
            let rank: f64 = record
                .get(0)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| ScourError::Validation("tranco row missing numeric rank".into()))?;
            let domain = record
                .get(1)
                .ok_or_else(|| ScourError::Validation("tranco row missing domain".into()))?;
            let url = format!("https://{domain}/");
            let priority = (100.0 - rank.max(1.0).ln()).max(1.0);

            self.add_seed(&url).await?;
            url_store.add(&url, priority, None, recrawl_threshold).await?;
            imported += 1;
        }
        Ok(imported)
    }
}

fn row_to_seed_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<SeedRecord> {
    Ok(SeedRecord {
        url: row.try_get("url").map_err(db_err)?,
        added_at: row.try_get("added_at").map_err(db_err)?,
        last_queued: row.try_get("last_queued").map_err(db_err)?,
    })
}

fn row_to_seed_pg(row: &sqlx::postgres::PgRow) -> Result<SeedRecord> {
    Ok(SeedRecord {
        url: row.try_get("url").map_err(db_err)?,
        added_at: row.try_get("added_at").map_err(db_err)?,
        last_queued: row.try_get("last_queued").map_err(db_err)?,
    })
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tranco_priority_rewards_low_rank() {
        let p1 = (100.0 - 1f64.max(1.0).ln()).max(1.0);
        let p1000 = (100.0 - 1000f64.max(1.0).ln()).max(1.0);
        assert!(p1 > p1000);
    }
}
