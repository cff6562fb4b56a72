//! Atari ST keyboard: scancodes, HID usage translation and key state.
//!
//! The ST keyboard reports positional scancodes. USB and Bluetooth
//! keyboards report positional HID usages (page 0x07), so translation is a
//! table lookup per layout, with a few keys moved where the national ST
//! keyboards put their legends.

pub mod hid;
mod layout;
pub mod scancode;
mod state;

pub use layout::{Layout, Translation, UnknownLayout, lookup, translate_hid};
pub use state::{KeyStateTable, apply_keyboard_report_layout};
