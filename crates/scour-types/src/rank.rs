//! Link graph, PageRank output and embeddings (§3, §4.8, §4.9).

use serde::{Deserialize, Serialize};

/// A directed hyperlink discovered during a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdge {
    pub src_url: String,
    pub dst_url: String,
}

/// Normalized PageRank score for a single document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRank {
    pub score: f64,
}

/// Normalized PageRank score for a single host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainRank {
    pub score: f64,
}

/// An immutable embedding vector for a document, produced by an external
/// embedding provider (§1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub url: String,
    pub vector: Vec<f32>,
}
