//! Exponential backoff around SCIM calls.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ScimClientError, ScimClientResult};

/// How often and how patiently a failed SCIM call is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound for both backoff and `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that gives up after the first failure.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ScimClientError) -> bool {
        attempt < self.max_retries && (error.is_retryable() || error.is_server_error())
    }

    /// `Retry-After` when the provider sent one, otherwise
    /// `base_delay * 2^attempt`. Both are capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &ScimClientError) -> Duration {
        let delay = match error {
            ScimClientError::RateLimited {
                retry_after_secs: Some(secs),
            } => Duration::from_secs(*secs),
            _ => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt)),
        };
        delay.min(self.max_delay)
    }

    /// Run `f` until it succeeds, fails permanently, or retries run out.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> ScimClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ScimClientResult<T>>,
    {
        let mut attempt = 0;
        loop {
            let error = match f().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if self.should_retry(attempt, &error) {
                let delay = self.delay_for(attempt, &error);
                debug!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Retrying SCIM call"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let transient = error.is_retryable() || error.is_server_error();
            if attempt == 0 || !transient {
                return Err(error);
            }
            warn!(operation, attempts = attempt + 1, error = %error, "Giving up on SCIM call");
            return Err(ScimClientError::MaxRetriesExceeded {
                attempts: attempt + 1,
                last_status: error.provider_status(),
                message: format!("{operation}: {error}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn unavailable() -> ScimClientError {
        ScimClientError::ScimError {
            status: 503,
            detail: "maintenance".into(),
        }
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.should_retry(0, &unavailable()));
        assert!(!policy.should_retry(3, &unavailable()));
        assert!(!policy.should_retry(0, &ScimClientError::Conflict("bob".into())));
        assert!(!policy.should_retry(0, &ScimClientError::AuthError("401".into())));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        let err = ScimClientError::Unreachable("refused".into());
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, &err), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6, &err), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_after_is_honoured_up_to_cap() {
        let policy = RetryPolicy::default();
        let short = ScimClientError::RateLimited {
            retry_after_secs: Some(7),
        };
        let long = ScimClientError::RateLimited {
            retry_after_secs: Some(600),
        };
        assert_eq!(policy.delay_for(0, &short), Duration::from_secs(7));
        assert_eq!(policy.delay_for(0, &long), policy.max_delay);
    }

    #[tokio::test]
    async fn test_execute_recovers_from_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = RetryPolicy::new(3, Duration::ZERO)
            .execute("list users", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(unavailable())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_returns_permanent_error_unchanged() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = RetryPolicy::new(3, Duration::ZERO)
            .execute("create user", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ScimClientError::Conflict("bob".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ScimClientError::Conflict(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_reports_exhaustion() {
        let err = RetryPolicy::new(2, Duration::ZERO)
            .execute("list groups", || async { Err::<(), _>(unavailable()) })
            .await
            .unwrap_err();

        match err {
            ScimClientError::MaxRetriesExceeded {
                attempts,
                last_status,
                message,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_status, Some(503));
                assert!(message.starts_with("list groups"));
            }
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_policy_returns_first_error() {
        let err = RetryPolicy::none()
            .execute("delete user", || async { Err::<(), _>(unavailable()) })
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }
}
