//! Dual-backend connection pool.
//!
//! Every other module in this crate matches on [`DbPool`] at the point
//! where dialect actually matters (placeholders, `ON CONFLICT` vs
//! `INSERT OR IGNORE`, `FOR UPDATE SKIP LOCKED` vs `BEGIN IMMEDIATE`) and
//! otherwise shares one code path. Backend choice is a runtime enum
//! rather than a compile-time feature so one binary can serve either.

use scour_config::{DatabaseConfig, DbBackend};
use scour_types::{Result, ScourError};
use sqlx::{PgPool, SqlitePool};
use tracing::info;

/// A connection pool for either supported backend.
#[derive(Debug, Clone)]
pub enum DbPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl DbPool {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = match config.backend {
            DbBackend::Sqlite => {
                info!(url = %config.url, "connecting to sqlite");
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await
                    .map_err(|e| ScourError::Storage(e.to_string()))?;
                DbPool::Sqlite(pool)
            }
            DbBackend::Postgres => {
                info!(url = %config.url, "connecting to postgres");
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await
                    .map_err(|e| ScourError::Storage(e.to_string()))?;
                DbPool::Postgres(pool)
            }
        };
        Ok(pool)
    }

    pub fn backend(&self) -> DbBackend {
        match self {
            DbPool::Sqlite(_) => DbBackend::Sqlite,
            DbPool::Postgres(_) => DbBackend::Postgres,
        }
    }

    /// Creates every table this workspace needs if it does not already
    /// exist. Called once at service startup; idempotent.
    pub async fn init_schema(&self) -> Result<()> {
        for stmt in schema::statements(self.backend()) {
            self.execute_raw(stmt).await?;
        }
        Ok(())
    }

    async fn execute_raw(&self, sql: &str) -> Result<()> {
        match self {
            DbPool::Sqlite(pool) => {
                sqlx::query(sql)
                    .execute(pool)
                    .await
                    .map_err(|e| ScourError::Storage(e.to_string()))?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(sql)
                    .execute(pool)
                    .await
                    .map_err(|e| ScourError::Storage(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// `?` on SQLite, `%s`-style `$n` on PostgreSQL. Callers build a query
/// string once via [`placeholders`] rather than hand-rolling `$1`/`?`
/// everywhere.
pub fn placeholders(backend: DbBackend, count: usize) -> Vec<String> {
    match backend {
        DbBackend::Sqlite => (0..count).map(|_| "?".to_string()).collect(),
        DbBackend::Postgres => (1..=count).map(|n| format!("${n}")).collect(),
    }
}

pub mod schema {
    use scour_config::DbBackend;

    /// Schema is identical across backends except primary-key/autoincrement
    /// syntax; every column and constraint name matches §3 exactly.
    pub fn statements(backend: DbBackend) -> Vec<&'static str> {
        match backend {
            DbBackend::Sqlite => vec![
                r#"CREATE TABLE IF NOT EXISTS urls (
                    url_digest TEXT PRIMARY KEY,
                    url TEXT NOT NULL UNIQUE,
                    domain TEXT NOT NULL,
                    status TEXT NOT NULL,
                    priority REAL NOT NULL,
                    source_url TEXT,
                    crawl_count INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    last_crawled_at TEXT
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_urls_status_priority ON urls(status, priority DESC, created_at ASC)",
                "CREATE INDEX IF NOT EXISTS idx_urls_domain ON urls(domain)",
                r#"CREATE TABLE IF NOT EXISTS seeds (
                    url TEXT PRIMARY KEY,
                    added_at TEXT NOT NULL,
                    last_queued TEXT
                )"#,
                r#"CREATE TABLE IF NOT EXISTS documents (
                    url TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    word_count INTEGER NOT NULL,
                    indexed_at TEXT NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS inverted_index (
                    token TEXT NOT NULL,
                    url TEXT NOT NULL,
                    field TEXT NOT NULL,
                    term_freq INTEGER NOT NULL,
                    positions TEXT NOT NULL,
                    PRIMARY KEY (token, url, field)
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_inverted_index_token ON inverted_index(token)",
                "CREATE INDEX IF NOT EXISTS idx_inverted_index_url ON inverted_index(url)",
                r#"CREATE TABLE IF NOT EXISTS token_stats (
                    token TEXT PRIMARY KEY,
                    doc_freq INTEGER NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS global_stats (
                    key TEXT PRIMARY KEY,
                    total_docs INTEGER NOT NULL,
                    avg_doc_length REAL NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS link_edges (
                    src_url TEXT NOT NULL,
                    dst_url TEXT NOT NULL,
                    PRIMARY KEY (src_url, dst_url)
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_link_edges_dst ON link_edges(dst_url)",
                r#"CREATE TABLE IF NOT EXISTS page_rank (
                    url TEXT PRIMARY KEY,
                    score REAL NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS domain_rank (
                    domain TEXT PRIMARY KEY,
                    score REAL NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS embeddings (
                    url TEXT PRIMARY KEY,
                    vector BLOB NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS index_jobs (
                    job_id TEXT PRIMARY KEY,
                    url TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    outlinks TEXT NOT NULL,
                    content_hash TEXT NOT NULL,
                    dedupe_key TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    retry_count INTEGER NOT NULL DEFAULT 0,
                    max_retries INTEGER NOT NULL,
                    available_at TEXT NOT NULL,
                    lease_until TEXT,
                    worker_id TEXT,
                    last_error TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_index_jobs_claimable ON index_jobs(status, available_at, created_at)",
                r#"CREATE TABLE IF NOT EXISTS search_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_type TEXT NOT NULL,
                    query TEXT NOT NULL,
                    query_norm TEXT NOT NULL,
                    request_id TEXT NOT NULL,
                    session_hash TEXT NOT NULL,
                    result_count INTEGER,
                    clicked_url TEXT,
                    clicked_rank INTEGER,
                    latency_ms INTEGER,
                    created_at TEXT NOT NULL
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_search_events_request ON search_events(request_id)",
                "CREATE INDEX IF NOT EXISTS idx_search_events_created ON search_events(event_type, created_at)",
            ],
            DbBackend::Postgres => vec![
                r#"CREATE TABLE IF NOT EXISTS urls (
                    url_digest TEXT PRIMARY KEY,
                    url TEXT NOT NULL UNIQUE,
                    domain TEXT NOT NULL,
                    status TEXT NOT NULL,
                    priority DOUBLE PRECISION NOT NULL,
                    source_url TEXT,
                    crawl_count BIGINT NOT NULL DEFAULT 0,
                    created_at TIMESTAMPTZ NOT NULL,
                    last_crawled_at TIMESTAMPTZ
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_urls_status_priority ON urls(status, priority DESC, created_at ASC)",
                "CREATE INDEX IF NOT EXISTS idx_urls_domain ON urls(domain)",
                r#"CREATE TABLE IF NOT EXISTS seeds (
                    url TEXT PRIMARY KEY,
                    added_at TIMESTAMPTZ NOT NULL,
                    last_queued TIMESTAMPTZ
                )"#,
                r#"CREATE TABLE IF NOT EXISTS documents (
                    url TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    word_count BIGINT NOT NULL,
                    indexed_at TIMESTAMPTZ NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS inverted_index (
                    token TEXT NOT NULL,
                    url TEXT NOT NULL,
                    field TEXT NOT NULL,
                    term_freq BIGINT NOT NULL,
                    positions TEXT NOT NULL,
                    PRIMARY KEY (token, url, field)
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_inverted_index_token ON inverted_index(token)",
                "CREATE INDEX IF NOT EXISTS idx_inverted_index_url ON inverted_index(url)",
                r#"CREATE TABLE IF NOT EXISTS token_stats (
                    token TEXT PRIMARY KEY,
                    doc_freq BIGINT NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS global_stats (
                    key TEXT PRIMARY KEY,
                    total_docs BIGINT NOT NULL,
                    avg_doc_length DOUBLE PRECISION NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS link_edges (
                    src_url TEXT NOT NULL,
                    dst_url TEXT NOT NULL,
                    PRIMARY KEY (src_url, dst_url)
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_link_edges_dst ON link_edges(dst_url)",
                r#"CREATE TABLE IF NOT EXISTS page_rank (
                    url TEXT PRIMARY KEY,
                    score DOUBLE PRECISION NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS domain_rank (
                    domain TEXT PRIMARY KEY,
                    score DOUBLE PRECISION NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS embeddings (
                    url TEXT PRIMARY KEY,
                    vector BYTEA NOT NULL
                )"#,
                r#"CREATE TABLE IF NOT EXISTS index_jobs (
                    job_id TEXT PRIMARY KEY,
                    url TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    outlinks TEXT NOT NULL,
                    content_hash TEXT NOT NULL,
                    dedupe_key TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    retry_count INTEGER NOT NULL DEFAULT 0,
                    max_retries INTEGER NOT NULL,
                    available_at TIMESTAMPTZ NOT NULL,
                    lease_until TIMESTAMPTZ,
                    worker_id TEXT,
                    last_error TEXT,
                    created_at TIMESTAMPTZ NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_index_jobs_claimable ON index_jobs(status, available_at, created_at)",
                r#"CREATE TABLE IF NOT EXISTS search_events (
                    id BIGSERIAL PRIMARY KEY,
                    event_type TEXT NOT NULL,
                    query TEXT NOT NULL,
                    query_norm TEXT NOT NULL,
                    request_id TEXT NOT NULL,
                    session_hash TEXT NOT NULL,
                    result_count BIGINT,
                    clicked_url TEXT,
                    clicked_rank BIGINT,
                    latency_ms BIGINT,
                    created_at TIMESTAMPTZ NOT NULL
                )"#,
                "CREATE INDEX IF NOT EXISTS idx_search_events_request ON search_events(request_id)",
                "CREATE INDEX IF NOT EXISTS idx_search_events_created ON search_events(event_type, created_at)",
            ],
        }
    }
}
