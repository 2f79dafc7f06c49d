//! Persistence for PageRank output (§3, §4.8): page-rank and domain-rank
//! tables are rewritten atomically in place, leaving the previous snapshot
//! intact on error, following the same `DbPool`-matched pattern
//! established in `scour-store`.

use std::collections::HashMap;

use scour_store::DbPool;
use scour_types::{Result, ScourError};

#[derive(Debug, Clone)]
pub struct RankStore {
    pool: DbPool,
}

impl RankStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Replaces every row in `page_rank` with `scores`, under one
    /// transaction per backend so a failure mid-write leaves the previous
    /// snapshot untouched.
    pub async fn write_page_ranks(&self, scores: &HashMap<String, f64>) -> Result<()> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                sqlx::query("DELETE FROM page_rank").execute(&mut *tx).await.map_err(db_err)?;
                for (url, score) in scores {
                    sqlx::query("INSERT INTO page_rank (url, score) VALUES (?, ?)")
                        .bind(url)
                        .bind(score)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                tx.commit().await.map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                sqlx::query("DELETE FROM page_rank").execute(&mut *tx).await.map_err(db_err)?;
                for (url, score) in scores {
                    sqlx::query("INSERT INTO page_rank (url, score) VALUES ($1, $2)")
                        .bind(url)
                        .bind(score)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                tx.commit().await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub async fn write_domain_ranks(&self, scores: &HashMap<String, f64>) -> Result<()> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                sqlx::query("DELETE FROM domain_rank").execute(&mut *tx).await.map_err(db_err)?;
                for (domain, score) in scores {
                    sqlx::query("INSERT INTO domain_rank (domain, score) VALUES (?, ?)")
                        .bind(domain)
                        .bind(score)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                tx.commit().await.map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                sqlx::query("DELETE FROM domain_rank").execute(&mut *tx).await.map_err(db_err)?;
                for (domain, score) in scores {
                    sqlx::query("INSERT INTO domain_rank (domain, score) VALUES ($1, $2)")
                        .bind(domain)
                        .bind(score)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                tx.commit().await.map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub async fn page_rank(&self, url: &str) -> Result<f64> {
        let score: Option<f64> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT score FROM page_rank WHERE url = ?")
                .bind(url)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT score FROM page_rank WHERE url = $1")
                .bind(url)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(score.unwrap_or(0.0))
    }

    pub async fn all_page_ranks(&self) -> Result<HashMap<String, f64>> {
        let rows: Vec<(String, f64)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as("SELECT url, score FROM page_rank")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as("SELECT url, score FROM page_rank")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(rows.into_iter().collect())
    }

    pub async fn write_embedding(&self, url: &str, vector: &[f32]) -> Result<()> {
        let bytes = encode_vector(vector);
        match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO embeddings (url, vector) VALUES (?, ?) \
                     ON CONFLICT(url) DO UPDATE SET vector = excluded.vector",
                )
                .bind(url)
                .bind(&bytes)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO embeddings (url, vector) VALUES ($1, $2) \
                     ON CONFLICT(url) DO UPDATE SET vector = excluded.vector",
                )
                .bind(url)
                .bind(&bytes)
                .execute(pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }

    pub async fn all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let rows: Vec<(String, Vec<u8>)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as("SELECT url, vector FROM embeddings")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as("SELECT url, vector FROM embeddings")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(rows.into_iter().map(|(url, bytes)| (url, decode_vector(&bytes))).collect())
    }

    pub async fn domain_rank(&self, domain: &str) -> Result<f64> {
        let score: Option<f64> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT score FROM domain_rank WHERE domain = ?")
                .bind(domain)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT score FROM domain_rank WHERE domain = $1")
                .bind(domain)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(score.unwrap_or(0.0))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}
