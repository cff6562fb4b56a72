//! Key State Table: which ST keys are currently down.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::hid::modifier;
use crate::layout::{Layout, lookup};
use crate::scancode;

const KEY_COUNT: usize = 128;

/// One flag per ST scancode.
///
/// Written only by the input pipeline and read only by the CPU context's
/// keyboard matrix, so plain relaxed atomics are enough.
#[derive(Debug)]
pub struct KeyStateTable {
    keys: [AtomicBool; KEY_COUNT],
}

impl KeyStateTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// Set a key's state. Scancode 0 and codes outside the table are
    /// ignored.
    pub fn set(&self, scancode: u8, down: bool) {
        if scancode == 0 {
            return;
        }
        if let Some(key) = self.keys.get(usize::from(scancode)) {
            key.store(down, Ordering::Relaxed);
        }
    }

    /// `st_keydown`: is this scancode held?
    #[must_use]
    pub fn is_down(&self, scancode: u8) -> bool {
        scancode != 0
            && self
                .keys
                .get(usize::from(scancode))
                .is_some_and(|key| key.load(Ordering::Relaxed))
    }

    pub fn release_all(&self) {
        for key in &self.keys {
            key.store(false, Ordering::Relaxed);
        }
    }

    /// Scancodes currently held, lowest first.
    pub fn pressed(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=scancode::MAX).filter(|&code| self.is_down(code))
    }
}

impl Default for KeyStateTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one keyboard report to the Key State Table.
///
/// Keys in `prev` missing from `cur` are released, keys in `cur` are
/// pressed. The four ST modifier keys are then written from `modifiers`
/// on every call, whether or not anything else changed.
pub fn apply_keyboard_report_layout(
    keys: &KeyStateTable,
    prev: &[u8],
    cur: &[u8],
    modifiers: u8,
    layout: Layout,
) {
    for &usage in prev.iter().filter(|&&u| u != 0) {
        if !cur.contains(&usage) {
            keys.set(lookup(layout, usage), false);
        }
    }

    for &usage in cur.iter().filter(|&&u| u != 0) {
        keys.set(lookup(layout, usage), true);
    }

    keys.set(scancode::LSHIFT, modifiers & modifier::LEFT_SHIFT != 0);
    keys.set(scancode::RSHIFT, modifiers & modifier::RIGHT_SHIFT != 0);
    keys.set(scancode::CTRL, modifiers & modifier::CTRL != 0);
    keys.set(scancode::ALT, modifiers & modifier::ALT != 0);
}
