use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AddUrlsRequest {
    pub urls: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: f64,
}

fn default_priority() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
pub struct AddUrlsResponse {
    pub added_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub pending: i64,
    pub crawling: i64,
    pub done: i64,
    pub failed: i64,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct QueueEntry {
    pub url: String,
    pub priority: f64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub url: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub url: String,
    pub status: String,
    pub crawl_count: i64,
    pub last_crawled_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SeedEntry {
    pub url: String,
    pub added_at: chrono::DateTime<chrono::Utc>,
    pub last_queued: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RequeueSeedsRequest {
    #[serde(default = "default_priority")]
    pub priority: f64,
}

#[derive(Debug, Serialize)]
pub struct RequeueSeedsResponse {
    pub requeued_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ImportTrancoQuery {
    #[serde(default = "default_tranco_n")]
    pub n: usize,
}

fn default_tranco_n() -> usize {
    1000
}

#[derive(Debug, Serialize)]
pub struct ImportTrancoResponse {
    pub imported_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct WorkerStartRequest {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize)]
pub struct WorkerStopRequest {
    #[serde(default)]
    pub graceful: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkerStatusResponse {
    pub running: bool,
    pub buffered: usize,
    pub dead_letter_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScorePredictRequest {
    pub url: String,
    pub parent_score: f64,
    pub visits: u64,
}

#[derive(Debug, Serialize)]
pub struct ScorePredictResponse {
    pub score: f64,
}
