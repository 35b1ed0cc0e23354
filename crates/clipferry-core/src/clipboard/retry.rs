//! Bounded retry for transient clipboard failures.

use std::time::Duration;

use crate::clock::Clock;
use crate::error::Result;

use super::ClipboardAccess;

/// Retry configuration for clipboard operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub attempts: u32,
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            initial: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay after the `attempt`-th failure (1-based): `initial * 2^(attempt-1)`,
    /// capped at `max`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(exp).min(self.max)
    }

    /// Read the clipboard, retrying recoverable failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once the attempts are used up, or the first
    /// non-recoverable error.
    pub async fn read<C, K>(&self, clipboard: &mut C, clock: &K) -> Result<Option<String>>
    where
        C: ClipboardAccess + ?Sized,
        K: Clock,
    {
        let mut attempt = 1;
        loop {
            match clipboard.read() {
                Ok(text) => return Ok(text),
                Err(e) if e.is_recoverable() && attempt < self.attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "Clipboard read failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt,
                        self.attempts,
                        e,
                        delay
                    );
                    clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write to the clipboard, retrying recoverable failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once the attempts are used up, or the first
    /// non-recoverable error.
    pub async fn write<C, K>(&self, clipboard: &mut C, clock: &K, text: &str) -> Result<()>
    where
        C: ClipboardAccess + ?Sized,
        K: Clock,
    {
        let mut attempt = 1;
        loop {
            match clipboard.write(text) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_recoverable() && attempt < self.attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "Clipboard write failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt,
                        self.attempts,
                        e,
                        delay
                    );
                    clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
