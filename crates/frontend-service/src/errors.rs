//! Maps [`ScourError`] to the `{error:{type,message,retryable,status}}`
//! JSON body, mirroring `crawler-service`/`indexer-service`'s error module.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scour_types::ScourError;
use serde_json::json;

pub struct ApiError(pub ScourError);

impl From<ScourError> for ApiError {
    fn from(e: ScourError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            ScourError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ScourError::Validation(_) => StatusCode::BAD_REQUEST,
            ScourError::NotFound(_) => StatusCode::NOT_FOUND,
            ScourError::Conflict(_) => StatusCode::CONFLICT,
            ScourError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScourError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match &self.0 {
            ScourError::Storage(_) => "storage_error",
            ScourError::Validation(_) => "validation_error",
            ScourError::NotFound(_) => "not_found",
            ScourError::Conflict(_) => "conflict",
            ScourError::Unavailable(_) => "dependency_unavailable",
            ScourError::Config(_) => "config_error",
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self.0, ScourError::Storage(_) | ScourError::Unavailable(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let message = self.0.to_string();
        let retryable = self.is_retryable();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(error_type, message = %message, "request failed");
            }
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::CONFLICT => {
                tracing::warn!(error_type, message = %message, "request rejected");
            }
            _ => tracing::info!(error_type, message = %message, "request error"),
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "retryable": retryable,
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
