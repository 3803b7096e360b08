//! HTTP GET with per-attempt timeout, exponential backoff, and endpoint fallback.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde_json::Value;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::error::FetchError;

const USER_AGENT_VALUE: &str = concat!("prayer-times/", env!("CARGO_PKG_VERSION"));

/// A single JSON GET, without retries or timeouts.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder().default_headers(headers).build().unwrap_or_default();
        Self { http }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let res = self.http.get(url).send().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Delay before retrying after failed attempt `attempt` (1-based): 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(16))
}

#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout_ms: u64) -> Self {
        Self { transport, timeout: Duration::from_millis(timeout_ms) }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` up to `max_attempts` times with the fetcher's default timeout.
    pub async fn fetch(&self, url: &str, max_attempts: u32) -> Result<Value, FetchError> {
        self.fetch_with_retry(url, max_attempts, self.timeout).await
    }

    pub async fn fetch_with_retry(
        &self,
        url: &str,
        max_attempts: u32,
        timeout: Duration,
    ) -> Result<Value, FetchError> {
        let attempts = max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            let outcome = match tokio::time::timeout(timeout, self.transport.get_json(url)).await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(json) => {
                    debug!(url, attempt, "fetch succeeded");
                    return Ok(json);
                }
                Err(e) => {
                    if attempt < attempts {
                        let delay = backoff_delay(attempt);
                        warn!(url, attempt, error = %e, ?delay, "fetch attempt failed, retrying");
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(url, attempt, error = %e, "final fetch attempt failed");
                    }
                    last = Some(e);
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last.unwrap_or(FetchError::NoEndpoints)),
        })
    }

    /// Tries each endpoint in order and returns the first success.
    pub async fn try_multiple_endpoints<S: AsRef<str>>(
        &self,
        endpoints: &[S],
        retries_per_endpoint: u32,
    ) -> Result<Value, FetchError> {
        let mut last = None;

        for endpoint in endpoints {
            let endpoint = endpoint.as_ref();
            match self.fetch(endpoint, retries_per_endpoint).await {
                Ok(json) => return Ok(json),
                Err(e) => {
                    warn!(endpoint, error = %e, "endpoint failed");
                    last = Some(e);
                }
            }
        }

        match last {
            Some(e) => Err(FetchError::AllEndpointsFailed { last: Box::new(e) }),
            None => Err(FetchError::NoEndpoints),
        }
    }
}
