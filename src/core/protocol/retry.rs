//! Retry policy for transient modem conditions

use super::ModemError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which failures are worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Only `+CMS ERROR ... SIM busy`
    #[default]
    SimBusy,
    /// Every failure, including timeouts and generic errors
    AnyError,
}

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, first one included (at least 1)
    pub max_attempts: u32,
    /// Delay before each new attempt
    pub delay: Duration,
    /// Retry predicate
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::sim_busy(3, Duration::from_secs(10))
    }
}

impl RetryPolicy {
    /// Retry only while the SIM reports busy
    pub fn sim_busy(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            retry_on: RetryOn::SimBusy,
        }
    }

    /// Retry on any failure
    pub fn any_error(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            retry_on: RetryOn::AnyError,
        }
    }

    /// Whether `error` matches the retry predicate
    ///
    /// A lost or broken link is never retried: the session is closed and
    /// every further attempt would fail the same way.
    pub fn should_retry(&self, error: &ModemError) -> bool {
        match (self.retry_on, error) {
            (RetryOn::SimBusy, ModemError::At(e)) => e.is_retryable(),
            (RetryOn::SimBusy, _) => false,
            (
                RetryOn::AnyError,
                ModemError::Disconnected | ModemError::Transport(_) | ModemError::Reset(_),
            ) => false,
            (RetryOn::AnyError, _) => true,
        }
    }

    /// Run `op` against `ctx` until it succeeds, fails for good, or attempts run out
    ///
    /// The last error is returned when every attempt failed; whether that is a
    /// hard failure or a skip is up to the caller.
    pub async fn run<C, T, F>(&self, ctx: &mut C, mut op: F) -> Result<T, ModemError>
    where
        C: ?Sized + Send,
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, Result<T, ModemError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(ctx).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && self.should_retry(&e) => {
                    tracing::warn!(
                        "attempt {}/{} failed: {}, trying again in {:?}",
                        attempt,
                        attempts,
                        e,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
