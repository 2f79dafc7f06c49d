//! Proxies `GET /api/predict` to the crawler service's `POST
//! /score/predict` (§6), so the frontend never re-implements URL scoring
//! itself — it stays the crawl worker's pure function (§4.4).

use scour_types::{Result, ScourError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    url: &'a str,
    parent_score: f64,
    visits: u64,
}

#[derive(Debug, Deserialize)]
struct PredictResponseBody {
    score: f64,
}

#[derive(Clone)]
pub struct CrawlerClient {
    http: reqwest::Client,
    base_url: String,
}

impl CrawlerClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            base_url,
        }
    }

    pub async fn predict(&self, url: &str, parent_score: f64, visits: u64) -> Result<f64> {
        let endpoint = format!("{}/score/predict", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&endpoint)
            .json(&PredictRequest { url, parent_score, visits })
            .send()
            .await
            .map_err(|e| ScourError::Unavailable(format!("crawler service unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(ScourError::Unavailable(format!(
                "crawler service returned {}",
                resp.status()
            )));
        }
        let body: PredictResponseBody = resp
            .json()
            .await
            .map_err(|e| ScourError::Unavailable(format!("malformed crawler response: {e}")))?;
        Ok(body.score)
    }
}
