//! Retry, timeout and circuit breaking composed around one remote call.
//!
//! Each attempt runs through the circuit breaker with its own deadline.
//! Retryable failures are retried with exponential backoff until the attempt
//! budget is spent. An open circuit ends the call immediately: there is no
//! point in backing off against a breaker that will keep rejecting.

use std::future::Future;
use std::time::Duration;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use crate::config::RetryPolicy;
use crate::error::AppError;

/// Resilience wrapper shared by every guarded operation of one source.
#[derive(Clone)]
pub struct ResiliencePolicy {
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResiliencePolicy {
    /// Creates a policy with a fresh circuit breaker named `name`.
    pub fn new(
        name: impl Into<String>,
        breaker: CircuitBreakerConfig,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            breaker: CircuitBreaker::new(name, breaker),
            retry,
            call_timeout,
        }
    }

    /// The breaker guarding this source, for monitoring and manual reset.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `operation` under the policy.
    ///
    /// `operation` is invoked once per attempt and must be idempotent.
    /// `endpoint` is only used to label timeouts and log lines.
    ///
    /// # Errors
    ///
    /// - [`AppError::SourceUnavailable`] if the circuit is open
    /// - [`AppError::Timeout`] if the last attempt exceeded the deadline
    /// - otherwise the error of the last attempt
    pub async fn execute<T, F, Fut>(&self, endpoint: &str, mut operation: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let attempt_future = operation();
            let deadline = self.call_timeout;

            let outcome = self
                .breaker
                .call(|| async move {
                    match tokio::time::timeout(deadline, attempt_future).await {
                        Ok(result) => result,
                        Err(_) => Err(AppError::Timeout {
                            endpoint: endpoint.to_string(),
                        }),
                    }
                })
                .await;

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(endpoint, attempt, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(open @ CircuitBreakerError::Open { .. }) => {
                    tracing::warn!(
                        endpoint,
                        circuit = %self.breaker.name(),
                        "Circuit open, failing fast"
                    );
                    return Err(open.into());
                }
                Err(CircuitBreakerError::Inner(e)) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        endpoint,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(CircuitBreakerError::Inner(e)) => {
                    tracing::error!(endpoint, attempt, error = %e, "Remote call failed");
                    return Err(e);
                }
            }
        }
    }
}
