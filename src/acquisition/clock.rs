use crate::acquisition::queue::CancellationToken;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Time source of the polling loop.
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock's origin.
    fn now(&self) -> Duration;

    /// Waits one poll interval, returning early (true) on cancellation.
    fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> bool;
}

/// Wall clock backed by [`Instant`].
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> bool {
        cancel.wait_timeout(timeout)
    }
}

/// Virtual clock: waiting advances time instantly. Used to replay long
/// sessions in tests and offline runs.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return true;
        }
        self.advance(timeout);
        false
    }
}
