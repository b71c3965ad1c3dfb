//! Resilient HTTP client for the analyzer service.
//!
//! Each request runs an explicit attempt state machine: an attempt
//! classifies into success, retryable failure, or terminal failure, and a
//! pure function computes the next backoff delay. A single wall-clock
//! deadline covers the whole request including every retry and wait.

use std::time::Duration;

use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::config::ExplainConfig;
use crate::domain::analysis::{AnalysisResult, RateLimitInfo, RateLimitUsage};
use crate::domain::error::{ExplainError, Result};

/// Wall-clock budget for one analysis request, retries included.
pub const REQUEST_DEADLINE_SECS: u64 = 60;

/// Upper bound on random jitter added to each backoff delay.
const JITTER_MS: u64 = 1_000;

/// Retry behavior for analyzer requests. Pure configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 8_000,
        }
    }
}

/// Backoff delay before retrying `attempt` (0-based), without jitter.
///
/// Doubles from the initial delay up to the cap.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    let millis = policy
        .initial_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);
    Duration::from_millis(millis)
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MS))
}

/// Classification of one attempt against the analyzer.
enum Outcome {
    Success(AnalysisResult),
    Retry {
        reason: String,
        retry_after: Option<u64>,
        rate_limit: Option<RateLimitInfo>,
    },
    Fatal(ExplainError),
}

/// HTTP client for `POST {service_url}/v1/explain`.
pub struct AnalyzerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl AnalyzerClient {
    pub fn new(config: &ExplainConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ci-explain/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        AnalyzerClient {
            http,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            token: config.service_token.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Submit a serialized payload and resolve the analyzer's answer.
    ///
    /// Transient failures (408/429/502/503/504, network errors) are retried
    /// with exponential backoff and jitter, honoring `retry-after` when the
    /// server sends one. The entire loop shares one deadline; when it fires
    /// the in-flight attempt is dropped and the call fails.
    pub async fn explain(&self, body: Vec<u8>) -> Result<AnalysisResult> {
        let deadline = Duration::from_secs(REQUEST_DEADLINE_SECS);
        match tokio::time::timeout(deadline, self.explain_with_retries(body)).await {
            Ok(result) => result,
            Err(_) => Err(ExplainError::DeadlineExceeded {
                secs: REQUEST_DEADLINE_SECS,
            }),
        }
    }

    async fn explain_with_retries(&self, body: Vec<u8>) -> Result<AnalysisResult> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(&body).await {
                Outcome::Success(result) => {
                    debug!(attempts = attempt + 1, "analyzer request succeeded");
                    return Ok(result);
                }
                Outcome::Fatal(err) => return Err(err),
                Outcome::Retry {
                    reason,
                    retry_after,
                    rate_limit,
                } => {
                    if attempt >= self.retry.max_retries {
                        // A quota response that persists through the retry
                        // budget is an answer, not a transport failure.
                        if let Some(info) = rate_limit {
                            return Ok(AnalysisResult::RateLimited(info));
                        }
                        return Err(ExplainError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: reason,
                        });
                    }
                    let delay = match retry_after {
                        Some(secs) => Duration::from_secs(secs),
                        None => backoff_delay(&self.retry, attempt) + jitter(),
                    };
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "analyzer request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, body: &[u8]) -> Outcome {
        let url = format!("{}/v1/explain", self.base_url);
        let mut req = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                return Outcome::Retry {
                    reason: format!("network error: {e}"),
                    retry_after: None,
                    rate_limit: None,
                }
            }
        };

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let usage = RateLimitUsage::from_headers(response.headers());
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                return Outcome::Retry {
                    reason: format!("failed to read response body: {e}"),
                    retry_after: None,
                    rate_limit: None,
                }
            }
        };

        if status.is_success() {
            return match AnalysisResult::parse_success(&text, usage) {
                Ok(result) => Outcome::Success(result),
                Err(e) => Outcome::Fatal(e),
            };
        }

        match status.as_u16() {
            413 => Outcome::Fatal(ExplainError::PayloadRejected),
            429 => Outcome::Retry {
                reason: "rate limited (status 429)".to_string(),
                retry_after,
                rate_limit: AnalysisResult::parse_rate_limit(&text, usage.as_ref()),
            },
            408 | 502 | 503 | 504 => Outcome::Retry {
                reason: format!("transient status {}", status.as_u16()),
                retry_after,
                rate_limit: None,
            },
            code => Outcome::Fatal(ExplainError::Service {
                status: code,
                body: text,
            }),
        }
    }
}
