use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::SearchError;

/// Suspension point used for backoff and batch cooldowns. Swappable so tests
/// can observe waits without sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested waits and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Result of a retried call plus how much retrying it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, SearchError>,
    pub attempts: u32,
    pub rate_limited: u32,
}

/// Linear backoff on rate-limit signals: the n-th signal waits
/// `n * base_wait`, or the provider's hint when that is longer.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_retries: u32,
    base_wait: Duration,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, base_wait: Duration) -> Self {
        Self {
            max_retries,
            base_wait,
        }
    }

    pub fn delay_for(&self, signal: u32, hint: Option<Duration>) -> Duration {
        let linear = self.base_wait.saturating_mul(signal);
        match hint {
            Some(hint) if hint > linear => hint,
            _ => linear,
        }
    }

    /// Run `f` until it succeeds, fails with a non rate-limit error, or has
    /// been rate limited more than `max_retries` times. Calls and backoff
    /// waits are both bounded by `deadline`; hitting it ends the loop with
    /// [`SearchError::DeadlineExceeded`] and the counts so far.
    pub async fn retry<F, Fut, T>(
        &self,
        operation_name: &str,
        sleeper: &dyn Sleeper,
        deadline: Option<Instant>,
        mut f: F,
    ) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let mut attempts = 0;
        let mut rate_limited = 0;
        let timed_out = |attempts: u32, rate_limited: u32| {
            warn!(operation = operation_name, attempts, "Operation hit the stage deadline");
            Attempted {
                result: Err(SearchError::DeadlineExceeded),
                attempts,
                rate_limited,
            }
        };

        loop {
            attempts += 1;
            let Some(outcome) = within(deadline, f()).await else {
                return timed_out(attempts, rate_limited);
            };
            match outcome {
                Ok(result) => {
                    if attempts > 1 {
                        info!(
                            operation = operation_name,
                            attempts,
                            "Operation succeeded after retries"
                        );
                    }
                    return Attempted {
                        result: Ok(result),
                        attempts,
                        rate_limited,
                    };
                }
                Err(SearchError::RateLimited { retry_after }) => {
                    rate_limited += 1;
                    if rate_limited > self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts,
                            "Operation still rate limited after max retries"
                        );
                        return Attempted {
                            result: Err(SearchError::RateLimited { retry_after }),
                            attempts,
                            rate_limited,
                        };
                    }

                    let backoff = self.delay_for(rate_limited, retry_after);
                    warn!(
                        operation = operation_name,
                        attempt = attempts,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limit hit, retrying"
                    );
                    if within(deadline, sleeper.sleep(backoff)).await.is_none() {
                        return timed_out(attempts, rate_limited);
                    }
                }
                Err(e) => {
                    warn!(
                        operation = operation_name,
                        attempts,
                        error = %e,
                        "Operation failed, not retrying"
                    );
                    return Attempted {
                        result: Err(e),
                        attempts,
                        rate_limited,
                    };
                }
            }
        }
    }
}

/// `None` when `deadline` passes before `fut` resolves.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}
