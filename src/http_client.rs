//! HTTP Client Module
//!
//! Thin wrapper around reqwest used for measurements lookups:
//! - Fixed request and connect timeouts
//! - Optional request rate limit
//! - Optional bounded retries with exponential backoff and jitter
//!
//! Retries are off unless `max_retries` is raised.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use governor::{clock::DefaultClock, middleware::NoOpMiddleware, state::NotKeyed, Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{FreshnessError, Result};

type DirectRateLimiter =
    RateLimiter<NotKeyed, governor::state::InMemoryState, DefaultClock, NoOpMiddleware>;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Initial retry delay
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// Requests per minute, unlimited when `None`
    pub rate_limit_rpm: Option<u32>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            max_retries: 0,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            rate_limit_rpm: None,
            user_agent: format!("adapter-freshness/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            request_timeout: config.request_timeout()?,
            connect_timeout: config.connect_timeout()?,
            max_retries: config.max_retries,
            rate_limit_rpm: config.rate_limit_rpm,
            ..Default::default()
        })
    }
}

/// HTTP client with timeouts, optional rate limiting and retries
pub struct ResilientHttpClient {
    client: Client,
    rate_limiter: Option<DirectRateLimiter>,
    config: HttpClientConfig,
}

impl ResilientHttpClient {
    /// Creates a new client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        let rate_limiter = config
            .rate_limit_rpm
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Creates a client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Creates an exponential backoff with jitter
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_retry_delay)
            .with_max_interval(self.config.max_retry_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.5)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Issues a GET, retrying transient failures up to `max_retries` times.
    ///
    /// Any non-success status that is not retried comes back as `ApiError`.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let max_retries = self.config.max_retries;
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }

            debug!(url = %url, attempt, "Executing HTTP request");

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    } else if Self::is_retryable_status(status) && attempt <= max_retries {
                        warn!(
                            url = %url,
                            status = %status,
                            attempt,
                            max_retries,
                            "Retryable status, will retry"
                        );
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        return Err(FreshnessError::ApiError {
                            code: status.to_string(),
                            message: body,
                        });
                    }
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt <= max_retries {
                        warn!(url = %url, error = %e, attempt, "Transient error, will retry");
                    } else {
                        return Err(FreshnessError::HttpError(e));
                    }
                }
            }

            let delay = backoff.next_backoff().unwrap_or(self.config.max_retry_delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Checks if a status code should trigger a retry
    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
                | StatusCode::REQUEST_TIMEOUT
        )
    }
}
