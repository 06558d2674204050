//! Bounded exponential backoff for provider calls.

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::models::RetryConfig;
use crate::domain::ports::ProviderError;

/// Retry policy with exponential backoff and a total time ceiling.
///
/// Only transient provider errors are retried. Permanent errors are returned
/// immediately; transient ones are returned once the time budget is spent.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial_backoff: Duration,
    max_backoff: Duration,
    max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn new(initial_backoff: Duration, max_backoff: Duration, max_elapsed: Duration) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            max_elapsed,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            Duration::from_secs(config.max_elapsed_secs),
        )
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }

    /// Run `operation` until it succeeds, fails permanently, or the time
    /// budget runs out.
    pub async fn execute<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let tries = AtomicU32::new(0);

        let result = backoff::future::retry_notify(
            self.backoff(),
            || {
                tries.fetch_add(1, Ordering::SeqCst);
                let attempt = operation();
                async move {
                    attempt.await.map_err(|err| {
                        if err.is_transient() {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: ProviderError, wait: Duration| {
                info!(
                    "Backing off {:.1} seconds after {} tries calling {}: {}",
                    wait.as_secs_f64(),
                    tries.load(Ordering::SeqCst),
                    name,
                    err
                );
            },
        )
        .await;

        if result.is_ok() && tries.load(Ordering::SeqCst) > 1 {
            debug!(operation = name, tries = tries.load(Ordering::SeqCst), "succeeded after retrying");
        }
        result
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
