//! Bounded retry for connection-level transport failures
//!
//! Only errors where the request never reached the server are retried, so a
//! retry cannot make the server do the work twice. The caller times each
//! attempt on its own; a failed attempt never contributes to a sample.

use crate::error::{AppError, Result};
use crate::logging::Logger;
use std::future::Future;
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::defaults::TRANSPORT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The closure receives the 1-based
    /// attempt number.
    pub async fn run<F, Fut, T>(&self, logger: &Logger, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    logger.debug("Retrying after connection failure")
                        .field("attempt", attempt)
                        .field("max_attempts", max_attempts)
                        .error_info(&e)
                        .log();

                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(AppError::network(format!(
                        "{} (gave up after {} attempts)",
                        strip_category(&e),
                        attempt
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn strip_category(error: &AppError) -> String {
    match error {
        AppError::Network(message) => message.clone(),
        other => other.to_string(),
    }
}
