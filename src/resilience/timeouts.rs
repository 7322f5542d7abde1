//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap outbound calls with a per-call deadline
//! - Cancel the wrapped future cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out requests surface as 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut` under `timeout`; `None` or zero means no deadline.
pub async fn with_timeout<T, Fut>(timeout: Option<Duration>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match timeout.filter(|t| !t.is_zero()) {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(Error::Timeout)),
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result: Result<()> = with_timeout(Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(result.unwrap_err().status_code(), 504);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline() {
        let result = with_timeout(None, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        })
        .await;
        assert_eq!(result.unwrap(), 1);
    }
}
