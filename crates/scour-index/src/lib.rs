//! The Index Writer (§4.7): turns a crawled page into postings and keeps
//! `documents`, `inverted_index`, `token_stats` and `global_stats`
//! mutually consistent. Also the read path every query engine in
//! `scour-rank` depends on — one store, read and write, mirroring the
//! `UrlStore`/`IndexJobQueue` shape already used elsewhere in this
//! workspace.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use scour_analyzer::analyze;
use scour_store::DbPool;
use scour_types::{Document, Field, GlobalStats, Posting, Result, ScourError, TokenStats};

#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: DbPool,
}

impl IndexStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Analyzes `title` and `content`, replaces this URL's postings, and
    /// keeps `token_stats.doc_freq` and `global_stats` consistent with the
    /// new token set. Re-indexing an already-indexed URL does not bump
    /// `total_docs`. The whole sequence runs under one transaction per
    /// backend (§4.7: "one atomic unit"; §5: readers never see a mix of
    /// old and new postings), the same `pool.begin()`/`tx.commit()` shape
    /// `scour-rank::RankStore::write_page_ranks` uses.
    pub async fn index_document(&self, url: &str, title: &str, content: &str) -> Result<Document> {
        let title_tokens = analyze(title);
        let content_tokens = analyze(content);
        let word_count = content_tokens.len() as i64;
        let now = Utc::now();

        let mut postings = build_postings(url, Field::Title, &title_tokens);
        postings.extend(build_postings(url, Field::Content, &content_tokens));
        let new_tokens: HashSet<String> = postings.iter().map(|p| p.token.clone()).collect();

        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;

                let existing: Option<(i64,)> =
                    sqlx::query_as("SELECT word_count FROM documents WHERE url = ?")
                        .bind(url)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?;
                let is_new = existing.is_none();
                let old_length = existing.map(|(wc,)| wc).unwrap_or(0);
                let old_tokens: HashSet<String> =
                    sqlx::query_scalar("SELECT DISTINCT token FROM inverted_index WHERE url = ?")
                        .bind(url)
                        .fetch_all(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .into_iter()
                        .collect();

                sqlx::query(
                    "INSERT INTO documents (url, title, content, word_count, indexed_at) VALUES (?, ?, ?, ?, ?) \
                     ON CONFLICT(url) DO UPDATE SET title = excluded.title, content = excluded.content, \
                     word_count = excluded.word_count, indexed_at = excluded.indexed_at",
                )
                .bind(url)
                .bind(title)
                .bind(content)
                .bind(word_count)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                sqlx::query("DELETE FROM inverted_index WHERE url = ?")
                    .bind(url)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                for posting in &postings {
                    let positions = serde_json::to_string(&posting.positions).map_err(|e| ScourError::Storage(e.to_string()))?;
                    sqlx::query(
                        "INSERT INTO inverted_index (token, url, field, term_freq, positions) VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(&posting.token)
                    .bind(&posting.url)
                    .bind(posting.field.as_db_str())
                    .bind(posting.term_freq)
                    .bind(&positions)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                for removed in old_tokens.difference(&new_tokens) {
                    sqlx::query(
                        "INSERT INTO token_stats (token, doc_freq) VALUES (?, MAX(?, 0)) \
                         ON CONFLICT(token) DO UPDATE SET doc_freq = MAX(doc_freq + ?, 0)",
                    )
                    .bind(removed)
                    .bind(-1i64)
                    .bind(-1i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    sqlx::query("DELETE FROM token_stats WHERE token = ? AND doc_freq <= 0")
                        .bind(removed)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                for added in new_tokens.difference(&old_tokens) {
                    sqlx::query(
                        "INSERT INTO token_stats (token, doc_freq) VALUES (?, MAX(?, 0)) \
                         ON CONFLICT(token) DO UPDATE SET doc_freq = MAX(doc_freq + ?, 0)",
                    )
                    .bind(added)
                    .bind(1i64)
                    .bind(1i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                let (total_docs, avg_len): (i64, f64) =
                    sqlx::query_as("SELECT total_docs, avg_doc_length FROM global_stats WHERE key = 'global'")
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .unwrap_or((0, 0.0));
                let new_total = if is_new { total_docs + 1 } else { total_docs };
                let length_delta = word_count as f64 - old_length as f64;
                let sum = avg_len * total_docs as f64 + length_delta;
                let new_avg = if new_total > 0 { sum / new_total as f64 } else { 0.0 };
                sqlx::query(
                    "INSERT INTO global_stats (key, total_docs, avg_doc_length) VALUES ('global', ?, ?) \
                     ON CONFLICT(key) DO UPDATE SET total_docs = excluded.total_docs, avg_doc_length = excluded.avg_doc_length",
                )
                .bind(new_total)
                .bind(new_avg)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                tx.commit().await.map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;

                let existing: Option<(i64,)> =
                    sqlx::query_as("SELECT word_count FROM documents WHERE url = $1")
                        .bind(url)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?;
                let is_new = existing.is_none();
                let old_length = existing.map(|(wc,)| wc).unwrap_or(0);
                let old_tokens: HashSet<String> =
                    sqlx::query_scalar("SELECT DISTINCT token FROM inverted_index WHERE url = $1")
                        .bind(url)
                        .fetch_all(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .into_iter()
                        .collect();

                sqlx::query(
                    "INSERT INTO documents (url, title, content, word_count, indexed_at) VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT(url) DO UPDATE SET title = excluded.title, content = excluded.content, \
                     word_count = excluded.word_count, indexed_at = excluded.indexed_at",
                )
                .bind(url)
                .bind(title)
                .bind(content)
                .bind(word_count)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                sqlx::query("DELETE FROM inverted_index WHERE url = $1")
                    .bind(url)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                for posting in &postings {
                    let positions = serde_json::to_string(&posting.positions).map_err(|e| ScourError::Storage(e.to_string()))?;
                    sqlx::query(
                        "INSERT INTO inverted_index (token, url, field, term_freq, positions) VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(&posting.token)
                    .bind(&posting.url)
                    .bind(posting.field.as_db_str())
                    .bind(posting.term_freq)
                    .bind(&positions)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                for removed in old_tokens.difference(&new_tokens) {
                    sqlx::query(
                        "INSERT INTO token_stats (token, doc_freq) VALUES ($1, GREATEST($2, 0)) \
                         ON CONFLICT(token) DO UPDATE SET doc_freq = GREATEST(token_stats.doc_freq + $2, 0)",
                    )
                    .bind(removed)
                    .bind(-1i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    sqlx::query("DELETE FROM token_stats WHERE token = $1 AND doc_freq <= 0")
                        .bind(removed)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }
                for added in new_tokens.difference(&old_tokens) {
                    sqlx::query(
                        "INSERT INTO token_stats (token, doc_freq) VALUES ($1, GREATEST($2, 0)) \
                         ON CONFLICT(token) DO UPDATE SET doc_freq = GREATEST(token_stats.doc_freq + $2, 0)",
                    )
                    .bind(added)
                    .bind(1i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                }

                let (total_docs, avg_len): (i64, f64) =
                    sqlx::query_as("SELECT total_docs, avg_doc_length FROM global_stats WHERE key = 'global'")
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .unwrap_or((0, 0.0));
                let new_total = if is_new { total_docs + 1 } else { total_docs };
                let length_delta = word_count as f64 - old_length as f64;
                let sum = avg_len * total_docs as f64 + length_delta;
                let new_avg = if new_total > 0 { sum / new_total as f64 } else { 0.0 };
                sqlx::query(
                    "INSERT INTO global_stats (key, total_docs, avg_doc_length) VALUES ('global', $1, $2) \
                     ON CONFLICT(key) DO UPDATE SET total_docs = excluded.total_docs, avg_doc_length = excluded.avg_doc_length",
                )
                .bind(new_total)
                .bind(new_avg)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                tx.commit().await.map_err(db_err)?;
            }
        }

        Ok(Document {
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            word_count,
            indexed_at: now,
        })
    }

    /// Removes a document and its postings entirely, decrementing
    /// `token_stats`/`global_stats` to match. Returns `false` if the URL
    /// was never indexed. Runs under one transaction per backend for the
    /// same reason `index_document` does.
    pub async fn delete_document(&self, url: &str) -> Result<bool> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                let existing: Option<(i64,)> =
                    sqlx::query_as("SELECT word_count FROM documents WHERE url = ?")
                        .bind(url)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?;
                let Some((old_word_count,)) = existing else {
                    return Ok(false);
                };
                let old_tokens: HashSet<String> =
                    sqlx::query_scalar("SELECT DISTINCT token FROM inverted_index WHERE url = ?")
                        .bind(url)
                        .fetch_all(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .into_iter()
                        .collect();

                sqlx::query("DELETE FROM inverted_index WHERE url = ?")
                    .bind(url)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                sqlx::query("DELETE FROM documents WHERE url = ?")
                    .bind(url)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                for token in &old_tokens {
                    sqlx::query(
                        "INSERT INTO token_stats (token, doc_freq) VALUES (?, MAX(?, 0)) \
                         ON CONFLICT(token) DO UPDATE SET doc_freq = MAX(doc_freq + ?, 0)",
                    )
                    .bind(token)
                    .bind(-1i64)
                    .bind(-1i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    sqlx::query("DELETE FROM token_stats WHERE token = ? AND doc_freq <= 0")
                        .bind(token)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }

                let (total_docs, avg_len): (i64, f64) =
                    sqlx::query_as("SELECT total_docs, avg_doc_length FROM global_stats WHERE key = 'global'")
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .unwrap_or((0, 0.0));
                let new_total = (total_docs - 1).max(0);
                let sum = (avg_len * total_docs as f64 - old_word_count as f64).max(0.0);
                let new_avg = if new_total > 0 { sum / new_total as f64 } else { 0.0 };
                sqlx::query(
                    "INSERT INTO global_stats (key, total_docs, avg_doc_length) VALUES ('global', ?, ?) \
                     ON CONFLICT(key) DO UPDATE SET total_docs = excluded.total_docs, avg_doc_length = excluded.avg_doc_length",
                )
                .bind(new_total)
                .bind(new_avg)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                tx.commit().await.map_err(db_err)?;
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(db_err)?;
                let existing: Option<(i64,)> =
                    sqlx::query_as("SELECT word_count FROM documents WHERE url = $1")
                        .bind(url)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?;
                let Some((old_word_count,)) = existing else {
                    return Ok(false);
                };
                let old_tokens: HashSet<String> =
                    sqlx::query_scalar("SELECT DISTINCT token FROM inverted_index WHERE url = $1")
                        .bind(url)
                        .fetch_all(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .into_iter()
                        .collect();

                sqlx::query("DELETE FROM inverted_index WHERE url = $1")
                    .bind(url)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                sqlx::query("DELETE FROM documents WHERE url = $1")
                    .bind(url)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;

                for token in &old_tokens {
                    sqlx::query(
                        "INSERT INTO token_stats (token, doc_freq) VALUES ($1, GREATEST($2, 0)) \
                         ON CONFLICT(token) DO UPDATE SET doc_freq = GREATEST(token_stats.doc_freq + $2, 0)",
                    )
                    .bind(token)
                    .bind(-1i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                    sqlx::query("DELETE FROM token_stats WHERE token = $1 AND doc_freq <= 0")
                        .bind(token)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_err)?;
                }

                let (total_docs, avg_len): (i64, f64) =
                    sqlx::query_as("SELECT total_docs, avg_doc_length FROM global_stats WHERE key = 'global'")
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?
                        .unwrap_or((0, 0.0));
                let new_total = (total_docs - 1).max(0);
                let sum = (avg_len * total_docs as f64 - old_word_count as f64).max(0.0);
                let new_avg = if new_total > 0 { sum / new_total as f64 } else { 0.0 };
                sqlx::query(
                    "INSERT INTO global_stats (key, total_docs, avg_doc_length) VALUES ('global', $1, $2) \
                     ON CONFLICT(key) DO UPDATE SET total_docs = excluded.total_docs, avg_doc_length = excluded.avg_doc_length",
                )
                .bind(new_total)
                .bind(new_avg)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

                tx.commit().await.map_err(db_err)?;
            }
        }
        Ok(true)
    }

    pub async fn document(&self, url: &str) -> Result<Option<Document>> {
        let row: Option<(String, String, String, i64, chrono::DateTime<Utc>)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as(
                "SELECT url, title, content, word_count, indexed_at FROM documents WHERE url = ?",
            )
            .bind(url)
            .fetch_optional(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as(
                "SELECT url, title, content, word_count, indexed_at FROM documents WHERE url = $1",
            )
            .bind(url)
            .fetch_optional(pool)
            .await
            .map_err(db_err)?,
        };
        Ok(row.map(|(url, title, content, word_count, indexed_at)| Document {
            url,
            title,
            content,
            word_count,
            indexed_at,
        }))
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let (total_docs, avg_doc_length) = self.global_stats_raw().await?;
        Ok(GlobalStats { total_docs, avg_doc_length })
    }

    pub async fn token_stats(&self, token: &str) -> Result<Option<TokenStats>> {
        let doc_freq: Option<i64> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_scalar("SELECT doc_freq FROM token_stats WHERE token = ?")
                .bind(token)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_scalar("SELECT doc_freq FROM token_stats WHERE token = $1")
                .bind(token)
                .fetch_optional(pool)
                .await
                .map_err(db_err)?,
        };
        Ok(doc_freq.map(|doc_freq| TokenStats { doc_freq }))
    }

    /// Every posting for `token`, across both fields — the candidate set
    /// a query engine intersects across query terms.
    pub async fn postings_for_token(&self, token: &str) -> Result<Vec<Posting>> {
        let rows: Vec<(String, String, String, i64, String)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as(
                "SELECT token, url, field, term_freq, positions FROM inverted_index WHERE token = ?",
            )
            .bind(token)
            .fetch_all(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as(
                "SELECT token, url, field, term_freq, positions FROM inverted_index WHERE token = $1",
            )
            .bind(token)
            .fetch_all(pool)
            .await
            .map_err(db_err)?,
        };
        rows.into_iter().map(row_tuple_to_posting).collect()
    }

    pub async fn postings_for_url(&self, url: &str) -> Result<Vec<Posting>> {
        let rows: Vec<(String, String, String, i64, String)> = match &self.pool {
            DbPool::Sqlite(pool) => sqlx::query_as(
                "SELECT token, url, field, term_freq, positions FROM inverted_index WHERE url = ?",
            )
            .bind(url)
            .fetch_all(pool)
            .await
            .map_err(db_err)?,
            DbPool::Postgres(pool) => sqlx::query_as(
                "SELECT token, url, field, term_freq, positions FROM inverted_index WHERE url = $1",
            )
            .bind(url)
            .fetch_all(pool)
            .await
            .map_err(db_err)?,
        };
        rows.into_iter().map(row_tuple_to_posting).collect()
    }

    async fn global_stats_raw(&self) -> Result<(i64, f64)> {
        let row: Option<(i64, f64)> = match &self.pool {
            DbPool::Sqlite(pool) => {
                sqlx::query_as("SELECT total_docs, avg_doc_length FROM global_stats WHERE key = 'global'")
                    .fetch_optional(pool)
                    .await
                    .map_err(db_err)?
            }
            DbPool::Postgres(pool) => {
                sqlx::query_as("SELECT total_docs, avg_doc_length FROM global_stats WHERE key = 'global'")
                    .fetch_optional(pool)
                    .await
                    .map_err(db_err)?
            }
        };
        Ok(row.unwrap_or((0, 0.0)))
    }
}

fn build_postings(url: &str, field: Field, tokens: &[String]) -> Vec<Posting> {
    let mut positions_by_token: HashMap<&str, Vec<i32>> = HashMap::new();
    for (i, token) in tokens.iter().enumerate() {
        positions_by_token.entry(token.as_str()).or_default().push(i as i32);
    }
    positions_by_token
        .into_iter()
        .map(|(token, positions)| Posting {
            token: token.to_string(),
            url: url.to_string(),
            field,
            term_freq: positions.len() as i64,
            positions,
        })
        .collect()
}

fn row_tuple_to_posting(row: (String, String, String, i64, String)) -> Result<Posting> {
    let (token, url, field, term_freq, positions) = row;
    let field = Field::from_db_str(&field).ok_or_else(|| ScourError::Storage(format!("unknown field {field}")))?;
    let positions: Vec<i32> = serde_json::from_str(&positions).map_err(|e| ScourError::Storage(e.to_string()))?;
    Ok(Posting { token, url, field, term_freq, positions })
}

fn db_err(e: sqlx::Error) -> ScourError {
    ScourError::Storage(e.to_string())
}
