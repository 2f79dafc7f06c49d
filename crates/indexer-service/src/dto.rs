use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SubmitPageRequest {
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub outlinks: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitPageResponse {
    pub job_id: String,
    pub queued: bool,
    pub deduplicated: bool,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub url: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
    pub failed_retry: i64,
    pub failed_permanent: i64,
    pub oldest_pending_seconds: Option<i64>,
}
