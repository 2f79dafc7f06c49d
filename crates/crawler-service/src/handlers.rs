use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Duration;
use scour_scheduler::score_url;
use scour_types::ScourError;

use crate::dto::*;
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

fn validate_url(url: &str) -> Result<(), ScourError> {
    let parsed = url::Url::parse(url).map_err(|e| ScourError::Validation(format!("invalid URL {url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScourError::Validation(format!("unsupported scheme for {url}")));
    }
    Ok(())
}

pub async fn add_urls(State(state): State<Arc<AppState>>, Json(req): Json<AddUrlsRequest>) -> ApiResult<Json<AddUrlsResponse>> {
    if req.urls.is_empty() {
        return Err(ApiError(ScourError::Validation("urls must not be empty".into())));
    }
    let recrawl_threshold = Duration::days(state.config.recrawl_threshold_days);
    let mut added_count = 0usize;
    for url in &req.urls {
        validate_url(url)?;
        let outcome = state.url_store.add(url, req.priority, None, recrawl_threshold).await?;
        if outcome.was_added() {
            added_count += 1;
        }
    }
    Ok(Json(AddUrlsResponse { added_count }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusResponse>> {
    let stats = state.url_store.stats().await?;
    Ok(Json(StatusResponse {
        pending: stats.pending,
        crawling: stats.crawling,
        done: stats.done,
        failed: stats.failed,
    }))
}

pub async fn queue(State(state): State<Arc<AppState>>, Query(q): Query<QueueQuery>) -> ApiResult<Json<Vec<QueueEntry>>> {
    let items = state.url_store.peek(q.limit).await?;
    Ok(Json(
        items
            .into_iter()
            .map(|r| QueueEntry { url: r.url, priority: r.priority })
            .collect(),
    ))
}

pub async fn history(State(state): State<Arc<AppState>>, Query(q): Query<HistoryQuery>) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let records = state.url_store.history(&q.url).await?;
    Ok(Json(
        records
            .into_iter()
            .take(q.limit.max(0) as usize)
            .map(|r| HistoryEntry {
                url: r.url,
                status: r.status.as_db_str().to_string(),
                crawl_count: r.crawl_count,
                last_crawled_at: r.last_crawled_at,
            })
            .collect(),
    ))
}

pub async fn add_seed(State(state): State<Arc<AppState>>, Json(req): Json<SeedRequest>) -> ApiResult<Json<()>> {
    validate_url(&req.url)?;
    state.seed_store.add_seed(&req.url).await?;
    Ok(Json(()))
}

pub async fn remove_seed(State(state): State<Arc<AppState>>, Json(req): Json<SeedRequest>) -> ApiResult<Json<()>> {
    state.seed_store.remove_seed(&req.url).await?;
    Ok(Json(()))
}

pub async fn list_seeds(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SeedEntry>>> {
    let seeds = state.seed_store.list_seeds().await?;
    Ok(Json(
        seeds
            .into_iter()
            .map(|s| SeedEntry { url: s.url, added_at: s.added_at, last_queued: s.last_queued })
            .collect(),
    ))
}

pub async fn requeue_seeds(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequeueSeedsRequest>,
) -> ApiResult<Json<RequeueSeedsResponse>> {
    let recrawl_threshold = Duration::days(state.config.recrawl_threshold_days);
    let requeued_count = state
        .seed_store
        .requeue_seeds(&state.url_store, req.priority, recrawl_threshold)
        .await?;
    Ok(Json(RequeueSeedsResponse { requeued_count }))
}

pub async fn import_tranco(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ImportTrancoQuery>,
    body: Bytes,
) -> ApiResult<Json<ImportTrancoResponse>> {
    let recrawl_threshold = Duration::days(state.config.recrawl_threshold_days);
    let imported_count = state
        .seed_store
        .import_tranco(&body, q.n, &state.url_store, recrawl_threshold)
        .await?;
    Ok(Json(ImportTrancoResponse { imported_count }))
}

pub async fn worker_start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkerStartRequest>,
) -> ApiResult<Json<WorkerStatusResponse>> {
    let started = state.start_worker(req.concurrency).await;
    if !started {
        return Err(ApiError(ScourError::Conflict("worker already running".into())));
    }
    worker_status(State(state)).await
}

pub async fn worker_stop(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkerStopRequest>,
) -> ApiResult<Json<WorkerStatusResponse>> {
    let stopped = state.stop_worker(req.graceful).await;
    if !stopped {
        return Err(ApiError(ScourError::Conflict("worker is not running".into())));
    }
    worker_status(State(state)).await
}

pub async fn worker_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<WorkerStatusResponse>> {
    Ok(Json(WorkerStatusResponse {
        running: state.is_running().await,
        buffered: state.scheduler.buffer_len().await,
        dead_letter_count: state.dead_letter_count(),
    }))
}

pub async fn score_predict(Json(req): Json<ScorePredictRequest>) -> ApiResult<Json<ScorePredictResponse>> {
    validate_url(&req.url)?;
    let score = score_url(&req.url, req.parent_score, req.visits);
    Ok(Json(ScorePredictResponse { score }))
}
