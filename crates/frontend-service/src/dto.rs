use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub per_page: Option<i64>,
    #[serde(default)]
    pub mode: Option<String>,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct HitDto {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
    pub hits: Vec<HitDto>,
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub request_id: String,
    pub query: String,
    pub url: String,
    pub rank: i64,
}

#[derive(Debug, Deserialize)]
pub struct QualitySummaryQuery {
    #[serde(default = "default_window")]
    pub window: String,
}

fn default_window() -> String {
    "24h".to_string()
}

#[derive(Debug, Serialize)]
pub struct QualitySummaryResponse {
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

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub url: String,
    pub parent_score: f64,
    #[serde(default)]
    pub visits: u64,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub score: f64,
}
