//! Indexed documents and inverted-index entries (§3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A successfully indexed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    pub word_count: i64,
    pub indexed_at: DateTime<Utc>,
}

/// Which field of a document a posting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Content,
}

impl Field {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Content => "content",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "title" => Some(Field::Title),
            "content" => Some(Field::Content),
            _ => None,
        }
    }
}

/// `(token, url, field)` posting with term frequency and ordered positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub token: String,
    pub url: String,
    pub field: Field,
    pub term_freq: i64,
    pub positions: Vec<i32>,
}

/// Document-frequency statistics for a single token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenStats {
    pub doc_freq: i64,
}

/// Corpus-wide statistics used by BM25 length normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_docs: i64,
    pub avg_doc_length: f64,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            total_docs: 0,
            avg_doc_length: 0.0,
        }
    }
}
