//! Shared error type for all scour crates.

use thiserror::Error;

/// Error taxonomy shared across the crawler, indexer and frontend services.
///
/// Library crates return `Result<T, ScourError>`; HTTP layers translate
/// these into status codes at the edge rather than re-deriving their own
/// error enums per service.
#[derive(Debug, Error)]
pub enum ScourError {
    /// A database round-trip failed. Callers may retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Input failed validation (malformed URL, bad scheme, empty query, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated in a way the caller should treat
    /// as an expected outcome (e.g. dedupe key collision), not a failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A dependency (robots cache, embedding provider, ...) was unavailable.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// Configuration was missing or invalid at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for ScourError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ScourError::NotFound("row not found".into()),
            other => ScourError::Storage(other.to_string()),
        }
    }
}

impl From<url::ParseError> for ScourError {
    fn from(err: url::ParseError) -> Self {
        ScourError::Validation(format!("invalid URL: {err}"))
    }
}

/// Result alias used throughout the scour workspace.
pub type Result<T> = std::result::Result<T, ScourError>;
