//! Shared domain models for the scour search engine core.
//!
//! This crate holds no behavior beyond pure helpers (digests, query
//! normalization); every record here is produced and consumed by the
//! `scour-store`, `scour-queue`, `scour-index` and `scour-rank` crates.

pub mod digest;
pub mod document;
pub mod errors;
pub mod event;
pub mod job;
pub mod rank;
pub mod url_record;

pub use digest::{content_hash, dedupe_key, digest16, domain_of, url_digest};
pub use document::{Document, Field, GlobalStats, Posting, TokenStats};
pub use errors::{Result, ScourError};
pub use event::{normalize_query, EventType, SearchEvent};
pub use job::{IndexJob, IndexJobStatus};
pub use rank::{DomainRank, Embedding, LinkEdge, PageRank};
pub use url_record::{AddOutcome, SeedRecord, UrlRecord, UrlStatus};
