//! Monotonic microsecond clocks for the input side.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic microsecond time source.
///
/// Mouse periods, idle timeouts, poll intervals and the reset-hold windows
/// are all measured against one of these.
pub trait Clock {
    /// Microseconds since this clock's origin.
    fn now_us(&self) -> u64;

    /// Microseconds elapsed since `earlier`, saturating at zero.
    fn elapsed_since(&self, earlier: u64) -> u64 {
        self.now_us().saturating_sub(earlier)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Wall-clock time measured from construction ("boot").
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
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
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can hold one handle and give
/// another to the component under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn starting_at(us: u64) -> Self {
        let clock = Self::new();
        clock.set(us);
        clock
    }

    pub fn set(&self, us: u64) {
        self.now.store(us, Ordering::Relaxed);
    }

    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}
