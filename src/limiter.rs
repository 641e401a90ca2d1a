use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::error::CrawlError;

/// Caps the number of requests in flight and keeps consecutive request starts
/// at least `request_delay` apart. Clones share both limits.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    request_delay: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl RequestLimiter {
    /// - `max_concurrent`: maximum number of requests in flight (at least 1)
    /// - `request_delay`: minimum gap between the starts of two requests
    pub fn new(max_concurrent: usize, request_delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            request_delay,
            last_request: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot. The slot is released when the guard drops.
    pub async fn acquire(&self) -> Result<RequestGuard, CrawlError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::LimiterClosed)?;

        if !self.request_delay.is_zero() {
            let mut last = self.last_request.lock().await;
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
            *last = Instant::now();
        }

        Ok(RequestGuard { _permit: permit })
    }
}

pub struct RequestGuard {
    _permit: OwnedSemaphorePermit,
}
