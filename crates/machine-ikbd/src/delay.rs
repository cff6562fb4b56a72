//! Delay providers for byte pacing.

use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// Returns immediately. Counts the time it was asked to wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay {
    requested_ns: u64,
}

impl NoDelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requested_us(&self) -> u64 {
        self.requested_ns / 1000
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.requested_ns += u64::from(ns);
    }
}
