//! Timeout Handling
//!
//! Per-call ceilings for network operations. An expired call surfaces as
//! `GroundError::Timeout`, which the retry controller treats as transient.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::{TimeoutConfig, with_timeout};
//!
//! let config = TimeoutConfig::default();
//! let result = with_timeout(
//!     config.llm_request,
//!     async { /* LLM call */ },
//!     "LLM request"
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::constants::network as net_constants;
use crate::types::{GroundError, Result};

/// Timeouts for network operations
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for one generation request (default: 10 minutes)
    pub llm_request: Duration,
    /// Timeout for the connectivity check (default: 60 seconds)
    pub ping: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_request: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
            ping: Duration::from_secs(net_constants::PING_TIMEOUT_SECS),
        }
    }
}

impl TimeoutConfig {
    /// Use `secs` for generation requests; zero keeps the default
    pub fn with_request_secs(secs: u64) -> Self {
        let mut config = Self::default();
        if secs > 0 {
            config.llm_request = Duration::from_secs(secs);
        }
        config
    }
}

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(GroundError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_config_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.llm_request.as_secs(), 600);
        assert_eq!(config.ping.as_secs(), 60);
    }

    #[test]
    fn test_with_request_secs() {
        assert_eq!(TimeoutConfig::with_request_secs(30).llm_request.as_secs(), 30);
        assert_eq!(TimeoutConfig::with_request_secs(0).llm_request.as_secs(), 600);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, GroundError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, GroundError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, GroundError::Timeout { .. }));
        assert!(err.is_retryable());
    }
}
