//! Concrete implementations of the out-of-scope HTTP/HTML collaborators
//! (§1): a `reqwest`-backed [`Fetcher`] and [`RobotsFetcher`], and a
//! `scraper`-backed [`HtmlExtractor`]. None of these receive the scrutiny
//! the in-scope core does — they exist only so the service is runnable,
//! reached exclusively through the narrow trait seam in `scour_crawler`.

use async_trait::async_trait;
use scour_crawler::{ExtractedPage, FetchOutcome, Fetcher, HtmlExtractor, RobotsFetcher, RobotsRules};
use scour_reliability::{presets, CallError, CircuitBreaker};
use scour_types::{Result, ScourError};
use scraper::{Html, Selector};

pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str, timeout: std::time::Duration, max_response_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ScourError::Config(format!("failed building HTTP client: {e}")))?;
        Ok(Self { client, max_response_bytes })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Ok(FetchOutcome::Retryable { reason: e.to_string() })
            }
            Err(e) => return Ok(FetchOutcome::Retryable { reason: e.to_string() }),
        };

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Ok(FetchOutcome::Retryable { reason: format!("status {status}") });
        }
        if !status.is_success() {
            return Ok(FetchOutcome::Permanent { reason: format!("status {status}") });
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));
        if !is_html {
            return Ok(FetchOutcome::Permanent { reason: "non-HTML content-type".into() });
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Ok(FetchOutcome::Retryable { reason: e.to_string() }),
        };
        if bytes.len() > self.max_response_bytes {
            return Ok(FetchOutcome::Permanent { reason: "response exceeded size ceiling".into() });
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();
        Ok(FetchOutcome::Html { body })
    }
}

pub struct ReqwestRobotsFetcher {
    client: reqwest::Client,
}

impl ReqwestRobotsFetcher {
    pub fn new(user_agent: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ScourError::Config(format!("failed building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RobotsFetcher for ReqwestRobotsFetcher {
    async fn fetch_robots(&self, domain: &str) -> Result<Option<RobotsRules>> {
        let url = format!("https://{domain}/robots.txt");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScourError::Unavailable(format!("robots fetch failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ScourError::Unavailable(format!(
                "robots.txt fetch returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScourError::Unavailable(format!("robots.txt read failed: {e}")))?;
        Ok(Some(parse_robots_txt(&body)))
    }
}

/// A `User-agent: *` block reader: disallow prefixes and a crawl-delay,
/// ignoring any other agent's block. Not a general robots.txt parser.
fn parse_robots_txt(body: &str) -> RobotsRules {
    let mut disallow = Vec::new();
    let mut crawl_delay = None;
    let mut in_wildcard_block = false;

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => in_wildcard_block = value == "*",
            "disallow" if in_wildcard_block && !value.is_empty() => {
                disallow.push(value.to_string());
            }
            "crawl-delay" if in_wildcard_block => {
                crawl_delay = value.parse::<f64>().ok().map(|secs| secs.ceil() as i64);
            }
            _ => {}
        }
    }

    RobotsRules::new(crawl_delay, disallow)
}

pub struct ScraperHtmlExtractor;

impl HtmlExtractor for ScraperHtmlExtractor {
    fn extract(&self, base_url: &str, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);
        let base = url::Url::parse(base_url).ok();

        let title_selector = Selector::parse("title").unwrap();
        let title = document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let body_selector = Selector::parse("body").unwrap();
        let text = document
            .select(&body_selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| document.root_element().text().collect::<Vec<_>>().join(" "));
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        let link_selector = Selector::parse("a[href]").unwrap();
        let mut outlinks = Vec::new();
        for el in document.select(&link_selector) {
            let Some(href) = el.value().attr("href") else { continue };
            let resolved = match &base {
                Some(b) => b.join(href).ok(),
                None => url::Url::parse(href).ok(),
            };
            if let Some(resolved) = resolved {
                if matches!(resolved.scheme(), "http" | "https") {
                    outlinks.push(resolved.to_string());
                }
            }
        }

        ExtractedPage { title, text, outlinks }
    }
}

/// Wraps a [`Fetcher`] with a circuit breaker tuned for external HTTP
/// collaborators (`scour_reliability::presets::http_external`), so a
/// struggling origin stops absorbing worker capacity once it fails
/// repeatedly.
pub struct CircuitFetcher<F> {
    inner: F,
    breaker: CircuitBreaker,
}

impl<F> CircuitFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self { inner, breaker: CircuitBreaker::with_real_clock(presets::http_external()) }
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CircuitFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        match self.breaker.guarded_call(|| self.inner.fetch(url)).await {
            Ok(outcome) => Ok(outcome),
            Err(CallError::CircuitOpen) => Ok(FetchOutcome::Retryable { reason: "circuit open".into() }),
            Err(CallError::Inner(e)) => Err(e),
        }
    }
}

/// Same wrapper for [`RobotsFetcher`].
pub struct CircuitRobotsFetcher<F> {
    inner: F,
    breaker: CircuitBreaker,
}

impl<F> CircuitRobotsFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self { inner, breaker: CircuitBreaker::with_real_clock(presets::http_external()) }
    }
}

#[async_trait]
impl<F: RobotsFetcher> RobotsFetcher for CircuitRobotsFetcher<F> {
    async fn fetch_robots(&self, domain: &str) -> Result<Option<RobotsRules>> {
        match self.breaker.guarded_call(|| self.inner.fetch_robots(domain)).await {
            Ok(rules) => Ok(rules),
            Err(CallError::CircuitOpen) => Err(ScourError::Unavailable("robots circuit open".into())),
            Err(CallError::Inner(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard_disallow_and_crawl_delay() {
        let robots = parse_robots_txt(
            "User-agent: *\nDisallow: /private\nDisallow: /tmp\nCrawl-delay: 5\n\nUser-agent: OtherBot\nDisallow: /\n",
        );
        assert_eq!(robots.disallow_prefixes, vec!["/private", "/tmp"]);
        assert_eq!(robots.crawl_delay_secs, Some(5));
    }

    #[test]
    fn extractor_resolves_relative_links_and_strips_tags() {
        let html = "<html><head><title>Hi</title></head><body>Hello <a href=\"/a\">A</a> <a href=\"https://other.test/b\">B</a></body></html>";
        let page = ScraperHtmlExtractor.extract("https://example.test/page", html);
        assert_eq!(page.title, "Hi");
        assert!(page.text.contains("Hello"));
        assert_eq!(page.outlinks, vec!["https://example.test/a", "https://other.test/b"]);
    }
}
