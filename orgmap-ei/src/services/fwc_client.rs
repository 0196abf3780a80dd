//! FWC document search client
//!
//! Queries the Fair Work Commission's public document search for
//! enterprise agreements matching an employer name. The endpoint is
//! rate-limited, so every outbound call waits for a fixed pacing
//! interval first.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const FWC_BASE_URL: &str = "https://www.fwc.gov.au/document-search/api/v1";
const USER_AGENT: &str = "orgmap/0.1.0 (employer import)";

/// FWC client errors
#[derive(Debug, Error)]
pub enum FwcError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("No agreements found for: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One enterprise agreement hit from the FWC search
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FwcAgreement {
    /// Agreement title as published
    pub title: String,
    /// Publication status (e.g. "Approved", "Terminated")
    pub status: Option<String>,
    #[serde(rename = "approvedDate")]
    pub approved_date: Option<String>,
    /// Nominal expiry date in YYYY-MM-DD format
    #[serde(rename = "nominalExpiryDate")]
    pub expiry_date: Option<String>,
    /// FWC matter/lodgement number (e.g. "AG2024/1234")
    #[serde(rename = "publicationID")]
    pub lodgement_number: Option<String>,
    /// Link to the agreement document
    #[serde(rename = "documentURL")]
    pub document_url: Option<String>,
    /// Link to the published decision summary, when one exists
    #[serde(rename = "summaryURL")]
    pub summary_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FwcSearchResponse {
    results: Vec<FwcAgreement>,
}

/// Rate limiter enforcing a fixed minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the pacing interval
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// FWC document search API client
pub struct FwcClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl FwcClient {
    /// Create a client with the given pacing interval in milliseconds
    pub fn new(pacing_ms: u64) -> Result<Self, FwcError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FwcError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: FWC_BASE_URL.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(pacing_ms)),
        })
    }

    /// Override the search endpoint, for tests against a local stub
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Search enterprise agreements by employer name
    pub async fn search_agreements(&self, company_name: &str) -> Result<Vec<FwcAgreement>, FwcError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/search", self.base_url);

        tracing::debug!(company = %company_name, "Querying FWC document search");

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", company_name), ("type", "agreement")])
            .send()
            .await
            .map_err(|e| FwcError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 404 {
            return Err(FwcError::NotFound(company_name.to_string()));
        }

        if status == 429 || status == 503 {
            return Err(FwcError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FwcError::ApiError(status.as_u16(), error_text));
        }

        let parsed: FwcSearchResponse = response
            .json()
            .await
            .map_err(|e| FwcError::ParseError(e.to_string()))?;

        tracing::info!(
            company = %company_name,
            hits = parsed.results.len(),
            "Retrieved agreements from FWC"
        );

        Ok(parsed.results)
    }

    /// Search agreements for multiple employer names
    ///
    /// Automatically paced by the client's rate limiter.
    pub async fn search_all(
        &self,
        company_names: &[String],
    ) -> Vec<Result<Vec<FwcAgreement>, FwcError>> {
        let mut results = Vec::with_capacity(company_names.len());

        for name in company_names {
            results.push(self.search_agreements(name).await);
        }

        results
    }
}
