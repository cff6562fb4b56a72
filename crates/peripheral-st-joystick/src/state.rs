use std::sync::atomic::{AtomicU8, Ordering};

/// Packed fire and axis bytes, shared with the CPU context.
///
/// Only the tracker writes; the IKBD port hook reads.
#[derive(Debug, Default)]
pub struct JoystickState {
    fire: AtomicU8,
    axis: AtomicU8,
}

impl JoystickState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fire: AtomicU8::new(0),
            axis: AtomicU8::new(0),
        }
    }

    /// `(fire, axis)`.
    #[must_use]
    pub fn load(&self) -> (u8, u8) {
        (
            self.fire.load(Ordering::Relaxed),
            self.axis.load(Ordering::Relaxed),
        )
    }

    pub fn store(&self, fire: u8, axis: u8) {
        self.fire.store(fire, Ordering::Relaxed);
        self.axis.store(axis, Ordering::Relaxed);
    }
}
