//! Search analytics events (§3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a recorded search event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Impression,
    Click,
}

impl EventType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Click => "click",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "impression" => Some(Self::Impression),
            "click" => Some(Self::Click),
            _ => None,
        }
    }
}

/// An append-only impression or click event, keyed by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub event_type: EventType,
    pub query: String,
    pub query_norm: String,
    pub request_id: String,
    pub session_hash: String,
    pub result_count: Option<i64>,
    pub clicked_url: Option<String>,
    pub clicked_rank: Option<i64>,
    pub latency_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Normalize a raw query string: lowercase, collapse internal whitespace,
/// trim. Used both for analytics `query_norm` and as a stable cache key.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_query("  Rust   Crawler "), "rust crawler");
    }
}
