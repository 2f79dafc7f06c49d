//! The URL lifecycle record (§3, §4.1 of the spec).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a URL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    Pending,
    Crawling,
    Done,
    Failed,
}

impl UrlStatus {
    /// Parse the lowercase string stored in the database column.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// The lowercase string stored in the database column.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// A single URL in the crawl frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub domain: String,
    pub status: UrlStatus,
    pub priority: f64,
    pub source_url: Option<String>,
    pub crawl_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

/// Outcome of a single `add`/`add_batch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A brand-new row was inserted.
    Inserted,
    /// An existing `done`/`failed` row past the recrawl threshold was
    /// restored to `pending`.
    Restored,
    /// The URL is already pending or crawling, or not yet eligible for
    /// recrawl; no row was changed.
    NoOp,
}

impl AddOutcome {
    pub fn was_added(&self) -> bool {
        !matches!(self, AddOutcome::NoOp)
    }
}

/// A durable seed URL, kept separate from the crawl frontier so clearing
/// crawl history never drops the entry points (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub url: String,
    pub added_at: DateTime<Utc>,
    pub last_queued: Option<DateTime<Utc>>,
}
