//! Durable index job queue record (§3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an index job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexJobStatus {
    Pending,
    Processing,
    Done,
    FailedRetry,
    FailedPermanent,
}

impl IndexJobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::FailedRetry => "failed_retry",
            Self::FailedPermanent => "failed_permanent",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            "failed_retry" => Some(Self::FailedRetry),
            "failed_permanent" => Some(Self::FailedPermanent),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::FailedPermanent)
    }
}

/// A page submitted for indexing, along with its discovered outlinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexJob {
    pub job_id: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub outlinks: Vec<String>,
    pub content_hash: String,
    pub dedupe_key: String,
    pub status: IndexJobStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub available_at: DateTime<Utc>,
    pub lease_until: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
