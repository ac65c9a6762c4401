use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Upload failures, classified for the retry loop.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("http client error: {0}")]
    Client(String),
}

impl TransportError {
    /// 408, 429, 5xx and network-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Client(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::Connection(err.to_string())
        } else {
            Self::Client(err.to_string())
        }
    }
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Capped delay before retry number `attempt` (zero-based), with up to
    /// 25% jitter either way.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(max);
        let jitter_range = capped * 0.25;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Duration::from_secs_f64((capped + jitter).clamp(0.0, max))
    }
}

/// Sends one serialized payload to the remote ledger.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, payload: &Value) -> Result<(), TransportError>;
}

/// Bearer-authenticated JSON POST with retries.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    retry: RetryPolicy,
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl HttpUploader {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Client(format!("build http client: {}", err)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
            retry,
        })
    }

    async fn send_once(&self, payload: &Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let retry_after = if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::SERVICE_UNAVAILABLE
        {
            parse_retry_after(&response)
        } else {
            None
        };
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
            retry_after,
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, payload: &Value) -> Result<(), TransportError> {
        let mut attempt = 0u32;
        loop {
            debug!("posting payload to {} (attempt {})", self.endpoint, attempt + 1);
            match self.send_once(payload).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = err
                        .retry_after()
                        .map(|wait| wait.min(self.retry.max_delay))
                        .unwrap_or_else(|| self.retry.delay_for_attempt(attempt));
                    warn!(
                        "upload attempt {} failed: {}; retrying in {}ms",
                        attempt + 1,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
