//! The Crawl Worker (§4.3) and its robots cache (§4.3.1). HTTP fetch,
//! robots.txt retrieval, and HTML→text parsing are out of scope (§1) and
//! are consumed only through the [`traits`] seam.

pub mod robots;
pub mod traits;
pub mod worker;

pub use robots::RobotsCache;
pub use traits::{ExtractedPage, FetchOutcome, Fetcher, HtmlExtractor, RobotsDecision, RobotsFetcher, RobotsRules};
pub use worker::{is_retryable_status, CrawlWorker, CrawlWorkerConfig, DeadLetterEntry};
