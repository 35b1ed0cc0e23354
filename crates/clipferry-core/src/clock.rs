//! Time source for the send and receive loops.
//!
//! Both loops only ever ask "what time is it" and "wait this long". Routing
//! those through [`Clock`] lets tests run a whole transfer on a
//! [`ManualClock`] without real delays.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of time and sleeps.
pub trait Clock: Send + Sync {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Wall-clock time since the Unix epoch.
    fn unix_time(&self) -> Duration;

    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn unix_time(&self) -> Duration {
        (**self).unix_time()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Real time on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn unix_time(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Simulated clock: `sleep` returns immediately after advancing time.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    unix: Duration,
    slept: Duration,
}

impl ManualClock {
    /// Create a clock whose wall time starts at `unix` seconds.
    #[must_use]
    pub fn new(unix: Duration) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Instant::now(),
                unix,
                slept: Duration::ZERO,
            }),
        }
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
        state.unix += duration;
    }

    /// Total time spent in [`Clock::sleep`].
    #[must_use]
    pub fn slept(&self) -> Duration {
        self.lock().slept
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn unix_time(&self) -> Duration {
        self.lock().unix
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        self.lock().slept += duration;
        std::future::ready(())
    }
}

/// Time from `unix` until the next wall-clock multiple of `interval`, shifted
/// by `offset`.
///
/// A boundary closer than 10ms is skipped in favour of the following one, so
/// two calls in quick succession never fire twice for the same slot.
#[must_use]
pub fn delay_to_boundary(unix: Duration, interval: Duration, offset: Duration) -> Duration {
    let interval_ns = interval.as_nanos();
    if interval_ns == 0 {
        return Duration::ZERO;
    }
    let offset_ns = offset.as_nanos() % interval_ns;
    let phase = (unix.as_nanos() + interval_ns - offset_ns) % interval_ns;
    let mut wait_ns = interval_ns - phase;
    if wait_ns < Duration::from_millis(10).as_nanos() {
        wait_ns += interval_ns;
    }
    Duration::from_nanos(u64::try_from(wait_ns).unwrap_or(u64::MAX))
}
