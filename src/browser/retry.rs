use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::DriverError;
use crate::settings::BrowserSettings;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const BACKOFF_FACTOR: f64 = 2.0;
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Bounded retry for browser-driver calls. `max_attempts` counts the first try.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self {
            max_attempts: settings.retry_attempts.max(1),
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        }
    }

    /// Exponential delay before retry number `attempt` (1-based), with +/-10% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = BACKOFF_FACTOR.powi(attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT) as i32);
        let base = self.base_delay.as_millis() as f64 * exp;
        let jitter = rand::thread_rng().gen_range(0.9..1.1);
        Duration::from_millis((base * jitter) as u64)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        self.run_with(operation, None, DriverError::is_retryable, call)
            .await
    }

    /// Like [`RetryPolicy::run`], but only errors accepted by `retry_on` are retried, and a
    /// backoff is cut short when `cancel` fires. Either way the last error is returned.
    pub async fn run_with<T, F, Fut, R>(
        &self,
        operation: &str,
        cancel: Option<&CancellationToken>,
        retry_on: R,
        mut call: F,
    ) -> Result<T, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
        R: Fn(&DriverError) -> bool,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if retry_on(&err) && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    log_warn!(
                        "{operation} failed (attempt {attempt}/{}): {err}; retrying in {}ms",
                        self.max_attempts,
                        delay.as_millis()
                    );
                    match cancel {
                        Some(cancel) => tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => {
                                log_warn!("{operation}: giving up on retries, collection cancelled");
                                return Err(err);
                            }
                        },
                        None => tokio::time::sleep(delay).await,
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    fn server_error() -> DriverError {
        DriverError::Protocol {
            endpoint: "/session/abc/refresh".into(),
            status: 500,
            error: "unknown error".into(),
            message: "boom".into(),
        }
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy(3)
            .run("refresh", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = policy(3)
            .run("navigate", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(server_error())
                } else {
                    Ok("loaded")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "loaded");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy(5)
            .run("refresh", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DriverError::SessionClosed)
            })
            .await;

        assert!(matches!(result, Err(DriverError::SessionClosed)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_cuts_backoff_short() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(5),
            policy.run_with("refresh", Some(&cancel), DriverError::is_retryable, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            }),
        )
        .await
        .expect("backoff should stop on cancellation");

        assert!(matches!(result, Err(DriverError::Protocol { status: 500, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_classifier_can_refuse_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = policy(3)
            .run_with(
                "refresh",
                None,
                |err| !matches!(err, DriverError::Timeout { .. }),
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(DriverError::Timeout {
                        endpoint: "/session/abc/refresh".into(),
                    })
                },
            )
            .await;

        assert!(matches!(result, Err(DriverError::Timeout { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        let first = policy.backoff(1).as_millis();
        let third = policy.backoff(3).as_millis();
        assert!((90..=110).contains(&first));
        assert!((360..=440).contains(&third));
    }
}
