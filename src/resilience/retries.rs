//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failed call is retryable
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Query calls (POST) get no retries by default, resource GETs get one
//! - Transport errors and timeouts always retryable; statuses configurable
//! - Aborted calls are never retried

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first call.
    pub attempts: u32,
    pub delay: Duration,
    pub max_delay: Duration,
    pub status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), "POST")
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            ..Self::default()
        }
    }

    /// Policy for a call with the given HTTP method.
    pub fn from_config(config: &RetryConfig, method: &str) -> Self {
        let attempts = config
            .attempts
            .unwrap_or(if method.eq_ignore_ascii_case("GET") { 1 } else { 0 });
        Self {
            attempts,
            delay: Duration::from_millis(config.delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            status_codes: config.status_codes.clone(),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_retryable(&self, err: &Error) -> bool {
        match err {
            Error::Upstream { status, .. } => self.status_codes.contains(status),
            other => other.is_transient(),
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        calculate_backoff(
            retry,
            self.delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// `op` receives the zero-based attempt number.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts && policy.is_retryable(&e) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying request");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn upstream(status: u16) -> Error {
        Error::Upstream {
            status,
            message: "failed to fetch resource".into(),
            data: None,
        }
    }

    #[test]
    fn test_method_defaults() {
        let config = RetryConfig::default();
        assert_eq!(RetryPolicy::from_config(&config, "get").attempts, 1);
        assert_eq!(RetryPolicy::from_config(&config, "POST").attempts, 0);

        let explicit = RetryConfig {
            attempts: Some(3),
            ..RetryConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&explicit, "POST").attempts, 3);
    }

    #[test]
    fn test_retryable_classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&upstream(503)));
        assert!(policy.is_retryable(&upstream(429)));
        assert!(!policy.is_retryable(&upstream(404)));
        assert!(policy.is_retryable(&Error::Timeout));
        assert!(policy.is_retryable(&Error::Transport("reset".into())));
        assert!(!policy.is_retryable(&Error::Aborted));
        assert!(!policy.is_retryable(&Error::Validation("query is empty".into())));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::none().with_attempts(2);

        let result = retry(&policy, move |_| async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(upstream(502)),
                _ => Ok("ok"),
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::none().with_attempts(5);

        let result: Result<()> = retry(&policy, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(upstream(404))
        })
        .await;

        assert_eq!(result.unwrap_err().status_code(), 404);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
