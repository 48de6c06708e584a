//! Retry and timeout policies for platform calls.

use std::future::Future;
use std::time::Duration;

use pagedrop_pages_api::ApiError;
use tracing::warn;

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * factor^(n-1)`, capped at `max`.
    Exponential {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential {
                initial,
                factor,
                max,
            } => {
                let exp = retry.saturating_sub(1).min(63) as i32;
                let secs = initial.as_secs_f64() * factor.powi(exp);
                Duration::from_secs_f64(secs.min(max.as_secs_f64()))
            }
        }
    }
}

/// Bounded retries with a backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(500),
                factor: 2.0,
                max: Duration::from_secs(8),
            },
        }
    }
}

impl RetryPolicy {
    /// Retries without waiting. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff.delay_for_retry(attempt - 1)
        }
    }
}

/// How every single platform call is made: a per-call timeout, plus
/// retries of transient failures for idempotent calls.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl CallPolicy {
    /// Runs one call under the timeout, without retrying.
    pub async fn timed<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))?
    }

    /// Runs an idempotent call, retrying transient failures.
    ///
    /// Fatal errors and the last transient error are returned as is.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            match self.timed(call()).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    attempt += 1;
                    let delay = self.retry.delay_before(attempt);
                    warn!(op, attempt, error = %e, delay_ms = delay.as_millis() as u64, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn api(status: u16) -> ApiError {
        ApiError::Api {
            status,
            message: "x".into(),
        }
    }

    #[test]
    fn exponential_backoff_caps() {
        let b = Backoff::Exponential {
            initial: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(1),
        };
        assert_eq!(b.delay_for_retry(1), Duration::from_millis(250));
        assert_eq!(b.delay_for_retry(2), Duration::from_millis(500));
        assert_eq!(b.delay_for_retry(3), Duration::from_secs(1));
        assert_eq!(b.delay_for_retry(10), Duration::from_secs(1));
    }

    #[test]
    fn first_attempt_never_waits() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(2)),
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(2));
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::immediate(0).attempts(), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = CallPolicy {
            retry: RetryPolicy::immediate(3),
            ..CallPolicy::default()
        };

        let result = policy
            .run("test", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(api(503))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = CallPolicy {
            retry: RetryPolicy::immediate(2),
            ..CallPolicy::default()
        };

        let result: Result<(), _> = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(api(500))
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = CallPolicy {
            retry: RetryPolicy::immediate(5),
            ..CallPolicy::default()
        };

        let result: Result<(), _> = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(api(403))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out() {
        let policy = CallPolicy {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::immediate(1),
        };

        let result: Result<(), _> = policy
            .run("test", || std::future::pending::<Result<(), ApiError>>())
            .await;

        assert!(matches!(result, Err(ApiError::Timeout(d)) if d == Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_backoff_between_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = CallPolicy {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: Backoff::Fixed(Duration::from_secs(4)),
            },
        };

        let start = tokio::time::Instant::now();
        let _: Result<(), _> = policy
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Timeout(Duration::from_secs(1)))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(8));
    }
}
