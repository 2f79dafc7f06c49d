//! The link graph (§3, consumed by `scour-rank`'s PageRank jobs).

use scour_types::{LinkEdge, Result, ScourError};
use sqlx::Row;

use crate::db::DbPool;

#[derive(Debug, Clone)]
pub struct LinkStore {
    pool: DbPool,
}

impl LinkStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Records `src -> dst` for every outlink discovered on `src`'s page.
    /// Idempotent: re-recording an edge is a no-op.
    pub async fn record_edges(&self, src: &str, dsts: &[String]) -> Result<()> {
        for dst in dsts {
            match &self.pool {
                DbPool::Sqlite(pool) => {
                    sqlx::query(
                        "INSERT INTO link_edges (src_url, dst_url) VALUES (?, ?) \
                         ON CONFLICT(src_url, dst_url) DO NOTHING",
                    )
                    .bind(src)
                    .bind(dst)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
                }
                DbPool::Postgres(pool) => {
                    sqlx::query(
                        "INSERT INTO link_edges (src_url, dst_url) VALUES ($1, $2) \
                         ON CONFLICT (src_url, dst_url) DO NOTHING",
                    )
                    .bind(src)
                    .bind(dst)
                    .execute(pool)
                    .await
                    .map_err(db_err)?;
                }
            }
        }
        Ok(())
    }

    /// Every edge in the document graph, used by the page-level PageRank
    /// Power Iteration.
    pub async fn all_edges(&self) -> Result<Vec<LinkEdge>> {
        let rows = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query("SELECT src_url, dst_url FROM link_edges")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query("SELECT src_url, dst_url FROM link_edges")
                .fetch_all(pool)
                .await
                .map_err(db_err)?,
        };
        rows.iter()
            .map(|r| {
                Ok(LinkEdge {
                    src_url: r.try_get("src_url").map_err(db_err)?,
                    dst_url: r.try_get("dst_url").map_err(db_err)?,
                })
            })
            .collect()
    }
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}
