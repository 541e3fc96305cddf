//! Bounded retry for session creation.
//!
//! Only the dial step of the session factory is retried. Searches and binds
//! are never retried here.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ConnectorResult;

/// How often and how patiently a failed dial is repeated.
///
/// The default is three attempts one second apart. A `backoff_multiplier`
/// above `1.0` grows the delay per retry up to `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// `1.0` keeps the delay fixed.
    pub backoff_multiplier: f64,
    /// Stretch each delay by up to a quarter, at random.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryConfig {
    /// `attempts` tries in total, `delay` apart.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            initial_delay: delay,
            max_delay: delay.max(Duration::from_secs(30)),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Total number of attempts including the first.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait before retry number `retry` (1 for the first retry).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let grown = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = grown.min(self.max_delay.as_millis() as f64);

        let stretch = if self.jitter {
            rand::thread_rng().gen_range(0.0..=0.25)
        } else {
            0.0
        };
        Duration::from_millis((capped * (1.0 + stretch)) as u64)
    }
}

/// Runs a dial under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The policy this executor applies.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Call `dial` until it succeeds, fails permanently, or the attempt
    /// budget runs out. The error of the last attempt is returned.
    pub async fn execute<D, Fut, T>(&self, mut dial: D) -> ConnectorResult<T>
    where
        D: FnMut() -> Fut,
        Fut: Future<Output = ConnectorResult<T>>,
    {
        let attempts = self.config.total_attempts();
        let mut attempt = 1;
        loop {
            let err = match dial().await {
                Ok(connected) => return Ok(connected),
                Err(err) => err,
            };
            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= attempts {
                warn!(attempts, error = %err, "Dial failed on every attempt");
                return Err(err);
            }

            let delay = self.config.delay_before_retry(attempt);
            debug!(
                attempt,
                attempts,
                delay_ms = delay.as_millis(),
                error = %err,
                "Dial failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
