//! Bounded retry for single Drive API calls.
//!
//! Every remote call site wraps its work in a [`RemoteOperation`] and hands it
//! to a [`RetryExecutor`] built from a [`RetryPolicy`]. Only transient failures
//! (see [`crate::errors::RemoteError::is_transient`]) are retried, and the
//! delay between attempts is fixed.

use crate::errors::RemoteResult;
use crate::observability::Logger;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Retry configuration with a fixed delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay between two consecutive attempts.
    pub inter_attempt_delay: Duration,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(max_attempts: u32, inter_attempt_delay: Duration) -> Self {
        Self {
            max_attempts,
            inter_attempt_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            inter_attempt_delay: Duration::from_secs(2),
        }
    }
}

/// A single remote call that can be invoked repeatedly.
#[async_trait]
pub trait RemoteOperation: Send + Sync {
    /// Value produced by a successful call.
    type Output: Send;

    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Performs the call once.
    async fn invoke(&self) -> RemoteResult<Self::Output>;
}

/// Retry executor with a fixed inter-attempt delay.
pub struct RetryExecutor {
    policy: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl RetryExecutor {
    /// Creates a new retry executor.
    pub fn new(policy: RetryPolicy, logger: Arc<dyn Logger>) -> Self {
        Self { policy, logger }
    }

    /// Returns the policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes an operation with retry logic.
    ///
    /// Returns the first success, the first non-transient error, or the last
    /// transient error once `max_attempts` invocations have failed. A policy
    /// with `max_attempts == 0` still invokes the operation once.
    pub async fn execute<O>(&self, operation: &O) -> RemoteResult<O::Output>
    where
        O: RemoteOperation + ?Sized,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation.invoke().await {
                Ok(output) => return Ok(output),
                Err(error) => error,
            };

            if !error.is_transient() {
                return Err(error);
            }

            self.logger.warn(
                "Remote call attempt failed",
                json!({
                    "operation": operation.name(),
                    "attempt": attempt,
                    "max_attempts": max_attempts,
                    "error": error.to_string(),
                    "retry_after_hint_secs": error.retry_after().map(|d| d.as_secs()),
                }),
            );

            if attempt >= max_attempts {
                self.logger.error(
                    "All retry attempts failed",
                    json!({
                        "operation": operation.name(),
                        "attempts": attempt,
                        "error": error.to_string(),
                    }),
                );
                return Err(error);
            }

            tokio::time::sleep(self.policy.inter_attempt_delay).await;
        }
    }
}
