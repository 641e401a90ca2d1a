use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::ResolvedConfig;
use crate::error::CrawlError;
use crate::limiter::RequestLimiter;

/// "GET JSON by URL", the only network capability the crawler needs.
pub trait JsonFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Value, CrawlError>> + Send;
}

impl<F: JsonFetcher> JsonFetcher for Arc<F> {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Value, CrawlError>> + Send {
        (**self).fetch(url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra delay, as a fraction of the backoff.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// `base_delay * 2^attempt`, capped at `max_delay`. Attempts count from 0.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        (delay + delay.mul_f64(extra)).min(self.max_delay)
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500)
}

/// Connection-level failures: refused, timed out, or closed/reset by the
/// peer while sending the request or reading the body.
fn is_retryable_error(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() || err.is_decode() {
        return false;
    }
    err.is_connect() || err.is_timeout() || err.is_request() || err.is_body()
}

enum AttemptFailure {
    Retryable(String),
    Terminal(CrawlError),
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    limiter: RequestLimiter,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl HttpFetcher {
    /// Fetcher for the tree crawl: no fixed pause between requests.
    pub fn new(config: &ResolvedConfig) -> Result<Self, CrawlError> {
        Self::with_request_delay(config, config.request_delay)
    }

    /// Fetcher for submission harvesting, which pauses before every request.
    pub fn for_submissions(config: &ResolvedConfig) -> Result<Self, CrawlError> {
        Self::with_request_delay(config, config.submission_delay)
    }

    fn with_request_delay(
        config: &ResolvedConfig,
        request_delay: Duration,
    ) -> Result<Self, CrawlError> {
        let client = build_client(&config.user_agent, config.timeout)?;
        let limiter = RequestLimiter::new(config.max_concurrent_requests, request_delay);
        Ok(Self::from_parts(client, config.retry.clone(), limiter))
    }

    pub fn from_parts(client: Client, policy: RetryPolicy, limiter: RequestLimiter) -> Self {
        Self {
            client,
            policy,
            limiter,
            sink: None,
        }
    }

    /// Report retries to `sink` as detail events.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    async fn attempt(&self, url: &str) -> Result<Value, AttemptFailure> {
        let _guard = self
            .limiter
            .acquire()
            .await
            .map_err(AttemptFailure::Terminal)?;

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) if is_retryable_error(&err) => {
                return Err(AttemptFailure::Retryable(err.to_string()));
            }
            Err(err) => {
                return Err(AttemptFailure::Terminal(CrawlError::Transport {
                    url: url.to_string(),
                    message: err.to_string(),
                }));
            }
        };

        let status = response.status().as_u16();
        debug!(url, status, "response received");

        if response.status().is_success() {
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(err) if is_retryable_error(&err) => {
                    return Err(AttemptFailure::Retryable(err.to_string()));
                }
                Err(err) => {
                    return Err(AttemptFailure::Terminal(CrawlError::Transport {
                        url: url.to_string(),
                        message: err.to_string(),
                    }));
                }
            };
            return serde_json::from_slice(&body).map_err(|err| {
                AttemptFailure::Terminal(CrawlError::Payload {
                    url: url.to_string(),
                    message: format!("invalid JSON: {err}"),
                })
            });
        }

        if is_retryable_status(status) {
            return Err(AttemptFailure::Retryable(format!("status {status}")));
        }

        let message = response
            .text()
            .await
            .ok()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "request failed".to_string());
        Err(AttemptFailure::Terminal(CrawlError::Status {
            url: url.to_string(),
            status,
            message,
        }))
    }
}

impl JsonFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, CrawlError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = String::from("no attempt made");

        for attempt in 0..max_attempts {
            debug!(url, attempt, "sending request");
            match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(AttemptFailure::Terminal(err)) => {
                    error!(url, error = %err, "request failed");
                    return Err(err);
                }
                Err(AttemptFailure::Retryable(reason)) => {
                    last = reason;
                    if attempt + 1 < max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        info!(
                            url,
                            attempt,
                            reason = %last,
                            delay_ms = delay.as_millis() as u64,
                            "sleeping before retry"
                        );
                        if let Some(sink) = &self.sink {
                            sink.event(ProgressEvent::detail(format!(
                                "retry {}/{} for {url} in {}ms: {last}",
                                attempt + 2,
                                max_attempts,
                                delay.as_millis()
                            )));
                        }
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!(url, attempts = max_attempts, "max retries reached");
        Err(CrawlError::RetriesExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last,
        })
    }
}

pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, CrawlError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).map_err(|err| CrawlError::Client(err.to_string()))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| CrawlError::Client(err.to_string()))
}
