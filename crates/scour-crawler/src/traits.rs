//! Narrow interfaces onto the collaborators §1 puts out of scope: the
//! HTTP/HTML layer (robots fetch, GET, HTML→text parsing). The core crawl
//! loop in [`crate::worker`] is fully exercisable in tests against fakes
//! of these traits, with no network involved.

use async_trait::async_trait;
use scour_types::Result;

/// Outcome of a single HTTP GET, already classified by the caller's retry
/// policy into "here is a body" or "here is why there wasn't one".
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// 200 with an HTML content-type and a body under the size ceiling.
    Html { body: String },
    /// A status/transport condition the crawl loop should retry
    /// (429/5xx, transport errors) — see §4.3 retry classification.
    Retryable { reason: String },
    /// A status/content condition the crawl loop should not retry
    /// (4xx except 429, non-HTML content-type, oversize body).
    Permanent { reason: String },
}

/// Fetches a single URL over HTTP. Implementations own the timeout, the
/// `User-Agent` header, and the response-size ceiling (§4.3.b, §6 env).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome>;
}

/// Result of consulting robots.txt for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    Allowed,
    Disallowed,
}

/// Fetches and parses `robots.txt` for a host. A 404 is interpreted as
/// "allow all" by the caller, not by this trait — callers distinguish
/// "no robots.txt" from "robots.txt present and restrictive" via `Ok(None)`.
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    /// Returns `Ok(None)` when the host has no robots.txt (treated as
    /// allow-all by [`crate::robots::RobotsCache`]). `crawl_delay` is the
    /// `Crawl-delay` directive for our user agent, if any.
    async fn fetch_robots(&self, domain: &str) -> Result<Option<RobotsRules>>;
}

/// A parsed robots.txt, reduced to what the crawl loop needs: our user
/// agent's `Disallow` path prefixes, and an optional `Crawl-delay`. The
/// crawl loop only ever asks "is this path disallowed", so a
/// longest-prefix match over plain path prefixes is enough; no need for
/// a full wildcard/pattern-matching robots parser.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    pub crawl_delay_secs: Option<i64>,
    pub disallow_prefixes: Vec<String>,
}

impl RobotsRules {
    pub fn new(crawl_delay_secs: Option<i64>, disallow_prefixes: Vec<String>) -> Self {
        Self {
            crawl_delay_secs,
            disallow_prefixes,
        }
    }

    /// Allow-all rules: no `Disallow` lines and no crawl-delay. Used both
    /// for a 404 robots.txt (§4.3.1) and as a fallback.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_allowed(&self, path: &str) -> RobotsDecision {
        if self.disallow_prefixes.iter().any(|p| !p.is_empty() && path.starts_with(p.as_str())) {
            RobotsDecision::Disallowed
        } else {
            RobotsDecision::Allowed
        }
    }
}

/// Parses `(title, text, outlinks)` out of an HTML body. CPU-bound; the
/// worker loop calls this inside `tokio::task::spawn_blocking` (§5).
pub trait HtmlExtractor: Send + Sync {
    fn extract(&self, base_url: &str, html: &str) -> ExtractedPage;
}

#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub title: String,
    pub text: String,
    pub outlinks: Vec<String>,
}
