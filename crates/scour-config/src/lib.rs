//! Environment-driven `*Config` structs for the three scour services:
//! typed fields, `from_env()` constructors with defaults, and a
//! `validate()` that turns a misconfigured deployment into a startup
//! error instead of a runtime surprise.

pub mod crawler;
pub mod database;
pub mod frontend;
pub mod indexer;

pub use crawler::CrawlerConfig;
pub use database::{DbBackend, DatabaseConfig};
pub use frontend::{FrontendConfig, RankingConfig};
pub use indexer::{IndexerAuthConfig, IndexerConfig};
