use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::resilience::CircuitBreaker;
use crate::{Error, Result};

/// Exponential-backoff orchestration around transport attempts.
///
/// The policy owns the attempt budget and the delay schedule; it does not
/// gate on the breaker. Callers consult the breaker once before the first
/// attempt, every attempt outcome is still reported to it so concurrent
/// callers see upstream health degrade mid-flight.
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay,
        }
    }

    /// Delay after the failed attempt with 0-based index `attempt`:
    /// `base_delay * 2^attempt`, saturating instead of overflowing.
    fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Drive `attempt_op` until it succeeds or the attempt budget runs out.
    ///
    /// Every outcome is recorded on `breaker`. Failures outside the
    /// transport class propagate immediately; transport-class failures wait
    /// out the backoff delay and try again, except after the final attempt,
    /// which returns [`Error::RetryExhausted`] wrapping the last failure.
    /// The waits are `tokio::time::sleep`, so a blocked upstream never
    /// stalls sibling tasks on the runtime.
    pub async fn run<T, F, Fut>(
        &self,
        breaker: &CircuitBreaker,
        base_url: &str,
        mut attempt_op: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match attempt_op(attempt).await {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    breaker.record_failure();
                    if !err.is_transport_class() {
                        return Err(err);
                    }
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(
                            attempts = attempt,
                            error = %err,
                            "attempt budget exhausted"
                        );
                        return Err(Error::RetryExhausted {
                            attempts: attempt,
                            base_url: base_url.to_string(),
                            source: Box::new(err),
                        });
                    }
                    let delay = self.backoff(attempt - 1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "generation attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
