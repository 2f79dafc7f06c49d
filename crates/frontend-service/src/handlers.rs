use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use scour_analytics::hash_session;
use scour_analytics::QualityWindow;
use scour_rank::QueryMode;
use scour_types::ScourError;

use crate::dto::*;
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

fn parse_mode(mode: Option<&str>) -> ApiResult<QueryMode> {
    match mode.unwrap_or("bm25") {
        "bm25" => Ok(QueryMode::Bm25),
        "semantic" => Ok(QueryMode::Semantic),
        "hybrid" => Ok(QueryMode::Hybrid),
        other => Err(ApiError(ScourError::Validation(format!("unknown search mode: {other}")))),
    }
}

/// Anonymous session cookie (`sid=`), salted and hashed for `session_hash`
/// (§4.10). A request without the cookie gets an ephemeral per-request
/// session id instead of being rejected; cookie issuance is the HTTP
/// layer's job, out of this core's scope (§1).
fn session_hash(headers: &HeaderMap, salt: &str) -> String {
    let cookie_header = headers.get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let sid = cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|kv| kv.strip_prefix("sid="))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    hash_session(&sid, salt)
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let mode = parse_mode(q.mode.as_deref())?;
    let per_page = q
        .per_page
        .or(q.limit)
        .unwrap_or(state.config.default_page_size)
        .clamp(1, state.config.max_page_size);

    let started = Instant::now();
    let result = state.engine.search(&q.q, mode, q.page, per_page).await?;
    let latency_ms = started.elapsed().as_millis() as i64;

    let session = session_hash(&headers, &state.config.session_hash_salt);
    let request_id = state
        .analytics
        .record_impression(&q.q, result.total, &session, latency_ms)
        .await?;

    Ok(Json(SearchResponse {
        query: result.query,
        total: result.total,
        page: result.page,
        per_page: result.per_page,
        last_page: result.last_page,
        hits: result
            .hits
            .into_iter()
            .map(|h| HitDto { url: h.url, title: h.title, snippet: h.snippet, score: h.score })
            .collect(),
        request_id,
    }))
}

pub async fn click(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ClickRequest>,
) -> ApiResult<axum::http::StatusCode> {
    let parsed = url::Url::parse(&req.url).map_err(|e| ApiError(ScourError::Validation(format!("invalid url: {e}"))))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError(ScourError::Validation("click url must be http(s)".into())));
    }
    if !(1..=1000).contains(&req.rank) {
        return Err(ApiError(ScourError::Validation("rank must be in 1..=1000".into())));
    }

    let session = session_hash(&headers, &state.config.session_hash_salt);
    state
        .analytics
        .record_click(&req.request_id, &req.query, &req.url, req.rank, &session)
        .await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn quality_summary(
    State(state): State<Arc<AppState>>,
    Query(q): Query<QualitySummaryQuery>,
) -> ApiResult<Json<QualitySummaryResponse>> {
    let window = QualityWindow::parse(&q.window).map_err(ApiError)?;
    let summary = state.analytics.quality_summary(window).await?;
    Ok(Json(QualitySummaryResponse {
        impressions: summary.impressions,
        zero_hit_rate: summary.zero_hit_rate,
        click_through_rate: summary.click_through_rate,
        avg_click_rank: summary.avg_click_rank,
        latency_p50_ms: summary.latency_p50_ms,
        latency_p95_ms: summary.latency_p95_ms,
        indexed_count: summary.indexed_count,
        pending_count: summary.pending_count,
        crawl_success_rate: summary.crawl_success_rate,
        short_content_rate: summary.short_content_rate,
        duplicate_content_rate: summary.duplicate_content_rate,
    }))
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PredictQuery>,
) -> ApiResult<Json<PredictResponse>> {
    url::Url::parse(&q.url).map_err(|e| ApiError(ScourError::Validation(format!("invalid url: {e}"))))?;
    let score = state.crawler.predict(&q.url, q.parent_score, q.visits).await?;
    Ok(Json(PredictResponse { score }))
}
