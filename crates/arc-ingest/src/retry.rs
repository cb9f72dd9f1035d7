// crates/arc-ingest/src/retry.rs
// ============================================================================
// Module: Retrying HTTP Client
// Description: Shared reqwest-backed client with exponential back-off,
//              jitter, and rate-limit sleep-and-retry for every network
//              ingestor.
// Purpose: Centralize the cross-cutting retry rule so each
//          ingestor's `ingest` reads as fetch-then-map.
// Dependencies: arc-core, reqwest, rand, serde_json
// ============================================================================

//! ## Overview
//! [`RetryingClient`] classifies every HTTP outcome into one of three
//! buckets: fatal (`auth`, malformed request, returned immediately),
//! rate-limited (sleep until the reported reset, capped, then retry), or
//! transient (`network`, exponential back-off with jitter up to
//! `max_attempts`). Timeout, authentication failure, rate limiting, and
//! 5xx responses each get distinct handling rather than one blanket retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use arc_core::ArcError;
use arc_core::ArcErrorKind;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`RetryingClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientConfig {
    /// `User-Agent` header value sent on every request.
    pub user_agent: String,
    /// Per-request timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of attempts (including the first) before surfacing a
    /// `network` error.
    pub max_attempts: u32,
    /// Base back-off duration for transient failures, in milliseconds.
    pub base_backoff_ms: u64,
    /// Upper bound on any single back-off sleep, in milliseconds.
    pub max_backoff_ms: u64,
    /// Upper bound on a rate-limit sleep, in milliseconds (capped at one
    /// hour).
    pub max_rate_limit_sleep_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "arc-memory/0.1".to_string(),
            timeout_ms: 30_000,
            max_attempts: 5,
            base_backoff_ms: 250,
            max_backoff_ms: 30_000,
            max_rate_limit_sleep_ms: 60 * 60 * 1000,
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP client wrapping `reqwest::blocking::Client` with the retry policy
/// every network ingestor shares.
pub struct RetryingClient {
    /// Retry and timeout policy.
    config: HttpClientConfig,
    /// Underlying blocking HTTP client.
    client: Client,
    /// Resolved bearer token for the `Authorization` header.
    bearer_token: String,
}

impl RetryingClient {
    /// Builds a client carrying `bearer_token` on every request.
    ///
    /// # Errors
    ///
    /// Returns [`ArcError`] (kind `network`) if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: HttpClientConfig, bearer_token: impl Into<String>) -> Result<Self, ArcError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ArcError::new(ArcErrorKind::Network, e.to_string()).with_detail("operation", "build_client"))?;
        Ok(Self {
            config,
            client,
            bearer_token: bearer_token.into(),
        })
    }

    /// Issues a `GET` request and parses the response body as JSON,
    /// retrying transient failures per policy.
    ///
    /// # Errors
    ///
    /// Returns [`ArcError`] classified as `auth`, `rate-limit`, `network`,
    /// or `parse` per the outcome.
    pub fn get_json(&self, url: &str) -> Result<Value, ArcError> {
        self.execute(url, None)
    }

    /// Issues a `POST` request with a JSON body (used for GraphQL) and
    /// parses the response as JSON, retrying transient failures per policy.
    ///
    /// # Errors
    ///
    /// Returns [`ArcError`] classified as `auth`, `rate-limit`, `network`,
    /// or `parse` per the outcome.
    pub fn post_json(&self, url: &str, body: &Value) -> Result<Value, ArcError> {
        self.execute(url, Some(body))
    }

    /// Shared retry loop for both GET and POST.
    fn execute(&self, url: &str, body: Option<&Value>) -> Result<Value, ArcError> {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let outcome = self.send_once(url, body);
            match outcome {
                Ok(response) => match classify_response(&response) {
                    Outcome::Success => {
                        let status = response.status();
                        let text = response.text().map_err(|e| {
                            ArcError::new(ArcErrorKind::Network, e.to_string())
                                .with_detail("operation", "read_body")
                                .with_detail("url", url.to_string())
                        })?;
                        return serde_json::from_str(&text).map_err(|e| {
                            ArcError::new(ArcErrorKind::Parse, e.to_string())
                                .with_detail("operation", "parse_json")
                                .with_detail("url", url.to_string())
                        });
                    }
                    Outcome::Fatal(kind, message) => {
                        return Err(ArcError::new(kind, message)
                            .with_detail("operation", "http_request")
                            .with_detail("url", url.to_string())
                            .with_detail("status", status_label(&response)));
                    }
                    Outcome::RateLimited { sleep_ms } => {
                        if attempt >= self.config.max_attempts {
                            return Err(ArcError::new(ArcErrorKind::RateLimit, "rate limit retry ceiling exhausted")
                                .with_detail("operation", "http_request")
                                .with_detail("url", url.to_string()));
                        }
                        let capped = sleep_ms.min(self.config.max_rate_limit_sleep_ms);
                        warn!(url, sleep_ms = capped, "rate limited, sleeping until reset");
                        thread::sleep(Duration::from_millis(capped));
                    }
                    Outcome::Retryable(reason) => {
                        if attempt >= self.config.max_attempts {
                            return Err(ArcError::new(ArcErrorKind::Network, reason)
                                .with_detail("operation", "http_request")
                                .with_detail("url", url.to_string())
                                .with_detail("attempts", attempt.to_string()));
                        }
                        let backoff = self.backoff_with_jitter(attempt);
                        debug!(url, attempt, backoff_ms = backoff, "retrying after transient failure");
                        thread::sleep(Duration::from_millis(backoff));
                    }
                },
                Err(message) => {
                    if attempt >= self.config.max_attempts {
                        return Err(ArcError::new(ArcErrorKind::Network, message)
                            .with_detail("operation", "http_request")
                            .with_detail("url", url.to_string())
                            .with_detail("attempts", attempt.to_string()));
                    }
                    let backoff = self.backoff_with_jitter(attempt);
                    debug!(url, attempt, backoff_ms = backoff, "retrying after transport error");
                    thread::sleep(Duration::from_millis(backoff));
                }
            }
        }
    }

    /// Sends one request attempt, returning the transport-level error
    /// message on failure (connect/timeout) rather than an `ArcError`, so
    /// the retry loop can decide the back-off uniformly.
    fn send_once(&self, url: &str, body: Option<&Value>) -> Result<Response, String> {
        let mut builder = if let Some(body) = body {
            self.client.post(url).json(body)
        } else {
            self.client.get(url)
        };
        builder = builder.bearer_auth(&self.bearer_token);
        builder.send().map_err(|e| e.to_string())
    }

    /// Computes an exponential back-off with full jitter for `attempt`
    /// (1-indexed).
    fn backoff_with_jitter(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(16);
        let cap = self.config.base_backoff_ms.saturating_mul(1_u64 << exponent).min(self.config.max_backoff_ms);
        rand::thread_rng().gen_range(0..=cap.max(1))
    }
}

/// Classification of one HTTP response, before the body is consumed.
enum Outcome {
    /// Status indicates success; caller should read and parse the body.
    Success,
    /// Unrecoverable; retry is pointless (auth failure, malformed request).
    Fatal(ArcErrorKind, String),
    /// Remote quota exhausted; sleep for `sleep_ms` then retry.
    RateLimited {
        /// Milliseconds to sleep before the next attempt.
        sleep_ms: u64,
    },
    /// Transient server failure; retry with back-off.
    Retryable(String),
}

/// Classifies a response by status code and rate-limit headers.
fn classify_response(response: &Response) -> Outcome {
    let status = response.status();

    if rate_limit_exhausted(response) {
        let sleep_ms = rate_limit_sleep_ms(response).unwrap_or(60_000);
        return Outcome::RateLimited { sleep_ms };
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let sleep_ms = rate_limit_sleep_ms(response).unwrap_or(60_000);
        return Outcome::RateLimited { sleep_ms };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Outcome::Fatal(ArcErrorKind::Auth, format!("authentication failed: {status}"));
    }
    if status.is_server_error() {
        return Outcome::Retryable(format!("server error: {status}"));
    }
    if status.is_client_error() {
        return Outcome::Fatal(ArcErrorKind::Parse, format!("client error: {status}"));
    }
    Outcome::Success
}

/// Returns whether rate-limit headers indicate the quota is exhausted.
fn rate_limit_exhausted(response: &Response) -> bool {
    response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .is_some_and(|remaining| remaining <= 0)
}

/// Computes the rate-limit sleep duration from `x-ratelimit-reset` (epoch
/// seconds) or `retry-after` (seconds), whichever is present.
fn rate_limit_sleep_ms(response: &Response) -> Option<u64> {
    if let Some(retry_after) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Some(retry_after.saturating_mul(1_000));
    }
    let reset_epoch_secs = response
        .headers()
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())?;
    let now_secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64);
    let delta = (reset_epoch_secs - now_secs).max(0);
    Some(u64::try_from(delta).unwrap_or(0).saturating_mul(1_000))
}

/// Renders a response's status for error detail context.
fn status_label(response: &Response) -> String {
    response.status().to_string()
}

#[cfg(test)]
mod tests {
    use super::HttpClientConfig;

    #[test]
    fn default_config_caps_rate_limit_sleep_at_one_hour() {
        let config = HttpClientConfig::default();
        assert_eq!(config.max_rate_limit_sleep_ms, 60 * 60 * 1000);
    }

    #[test]
    fn default_config_has_a_finite_retry_ceiling() {
        let config = HttpClientConfig::default();
        assert!(config.max_attempts > 0);
        assert!(config.max_attempts < 100);
    }
}
