//! Dual-backend (SQLite/PostgreSQL) storage for the URL lifecycle, the
//! durable seed set, and the link graph (§3, §4.1, §9).

pub mod db;
pub mod link_store;
pub mod seed_store;
pub mod url_store;

pub use db::{placeholders, DbPool};
pub use link_store::LinkStore;
pub use seed_store::SeedStore;
pub use url_store::{UrlStore, UrlStoreStats};
