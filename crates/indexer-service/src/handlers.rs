use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use scour_types::ScourError;

use crate::dto::{HealthResponse, JobStatusResponse, SubmitPageRequest, SubmitPageResponse};
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn submit_page(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitPageRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<SubmitPageResponse>)> {
    url::Url::parse(&req.url).map_err(|e| ApiError(ScourError::Validation(format!("invalid url: {e}"))))?;

    let outcome = state.queue.enqueue(&req.url, &req.title, &req.content, &req.outlinks).await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(SubmitPageResponse {
            job_id: outcome.job_id,
            queued: true,
            deduplicated: !outcome.created,
        }),
    ))
}

pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = state
        .queue
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError(ScourError::NotFound(format!("job {job_id} not found"))))?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        url: job.url,
        status: job.status.as_db_str().to_string(),
        retry_count: job.retry_count,
        max_retries: job.max_retries,
        last_error: job.last_error,
        created_at: job.created_at,
        updated_at: job.updated_at,
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let health = state.queue.health().await?;
    Ok(Json(HealthResponse {
        pending: health.pending,
        processing: health.processing,
        done: health.done,
        failed_retry: health.failed_retry,
        failed_permanent: health.failed_permanent,
        oldest_pending_seconds: health.oldest_pending_seconds,
    }))
}
