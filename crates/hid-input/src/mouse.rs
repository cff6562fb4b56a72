use std::sync::atomic::{AtomicU8, Ordering};

/// Right button bit in the shared state.
pub const RIGHT: u8 = 0x01;
/// Left button bit in the shared state.
pub const LEFT: u8 = 0x02;

/// HID mouse buttons as the IKBD port sees them.
///
/// Bit 0 is the right button and bit 1 the left, which is the order the
/// port 2 wiring expects. Written by the input context only.
#[derive(Debug, Default)]
pub struct MouseButtons {
    bits: AtomicU8,
}

impl MouseButtons {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    pub fn set(&self, left: bool, right: bool) {
        let mut bits = 0;
        if right {
            bits |= RIGHT;
        }
        if left {
            bits |= LEFT;
        }
        self.bits.store(bits, Ordering::Relaxed);
    }

    #[must_use]
    pub fn load(&self) -> u8 {
        self.bits.load(Ordering::Relaxed)
    }
}
