//! Retry with exponential backoff around a model call

use super::circuit_breaker::CircuitBreaker;
use super::CapabilityError;
use crate::metrics::METRICS;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Bounded retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based): `backoff * 2^(attempt-1)`
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.backoff.saturating_mul(2_u32.pow(exponent))
    }
}

/// Run `call` under the breaker, retrying retryable failures.
///
/// `CircuitOpen` is returned only when the breaker rejects the first attempt;
/// if it opens between retries, the last upstream error is returned instead.
pub async fn call_with_retry<F, Fut>(
    model: &str,
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    mut call: F,
) -> Result<String, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, CapabilityError>>,
{
    let start = Instant::now();
    let mut attempt = 0;
    let mut last_error: Option<CapabilityError> = None;

    loop {
        if breaker.is_open() {
            if let Some(e) = last_error.take() {
                METRICS.record_model_call(model, "error", start.elapsed());
                error!("Circuit breaker opened for model {} after {} attempts: {}", model, attempt, e);
                return Err(e);
            }
            METRICS.record_model_call(model, "circuit_open", start.elapsed());
            error!("Circuit breaker is open for model {}", model);
            return Err(CapabilityError::CircuitOpen(model.to_string()));
        }

        attempt += 1;
        match call().await {
            Ok(text) => {
                breaker.mark_success();
                METRICS.record_model_call(model, "success", start.elapsed());
                debug!("Model {} answered on attempt {}", model, attempt);
                return Ok(text);
            }
            Err(e) if !e.is_retryable() => {
                // 4xx other than 429 leaves the breaker untouched
                METRICS.record_model_call(model, "error", start.elapsed());
                error!("Model {} call failed: {}", model, e);
                return Err(e);
            }
            Err(e) => {
                breaker.mark_failure();

                if attempt > policy.retry_attempts {
                    METRICS.record_model_call(model, "error", start.elapsed());
                    error!("Model {} call failed after {} attempts: {}", model, attempt, e);
                    return Err(e);
                }

                let backoff = policy.backoff_for(attempt);
                warn!(
                    "Model {} attempt {} failed: {}, retrying in {:?}",
                    model, attempt, e, backoff
                );
                tokio::time::sleep(backoff).await;
                last_error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(retries: usize) -> RetryPolicy {
        RetryPolicy {
            retry_attempts: retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let breaker = CircuitBreaker::default();

        let result = call_with_retry("test-model", &fast_policy(2), &breaker, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(CapabilityError::Timeout("slow".into()))
                } else {
                    Ok("done".to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicUsize::new(0);
        let breaker = CircuitBreaker::default();

        let result = call_with_retry("test-model", &fast_policy(2), &breaker, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::Upstream { status: 503, body: "down".into() }) }
        })
        .await;

        assert!(matches!(result, Err(CapabilityError::Upstream { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let breaker = CircuitBreaker::default();

        let result = call_with_retry("test-model", &fast_policy(3), &breaker, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::Upstream { status: 400, body: "bad".into() }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_open_breaker_short_circuits() {
        let calls = AtomicUsize::new(0);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        });
        breaker.mark_failure();

        let result = call_with_retry("test-model", &fast_policy(2), &breaker, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("unreachable".to_string()) }
        })
        .await;

        assert_eq!(result, Err(CapabilityError::CircuitOpen("test-model".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_breaker_opening_mid_call_keeps_upstream_error() {
        let calls = AtomicUsize::new(0);
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        });

        let result = call_with_retry("test-model", &fast_policy(3), &breaker, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::Upstream { status: 502, body: "bad gateway".into() }) }
        })
        .await;

        assert_eq!(
            result,
            Err(CapabilityError::Upstream { status: 502, body: "bad gateway".into() })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(breaker.is_open());
    }
}
