//! The Atari ST IKBD machine.
//!
//! Two execution contexts share this crate. The CPU context owns the
//! HD6301 ([`IkbdCore`]) and runs the keyboard ROM in fixed batches. The
//! cooperative context runs one [`modes`] loop: it services the serial
//! link from the ST, decodes host input into the shared [`IkbdState`],
//! advances the mouse and joystick emulation, and watches the board's
//! RESET and CONFIG lines.
//!
//! The contexts only meet through atomics and single-producer rings:
//! key states, quadrature registers, joystick and button bits one way,
//! serial bytes and a stop flag the other.

pub mod board;
pub mod config;
pub mod delay;
pub mod matrix;
pub mod mcu;
pub mod modes;
pub mod peripherals;
pub mod ports;
pub mod reset;
pub mod serial;

pub use board::{Board, KeyboardSource, VirtualBoard, toggle_source};
pub use config::{IkbdConfig, KeyboardMode, MapSettings, SettingsError};
pub use matrix::KeyMatrix;
pub use mcu::{CoreError, CoreHandle, IkbdCore};
pub use modes::{
    BluetoothLoop, ConfigurationLoop, Halt, Link, LoopControl, ModeLoop, NativeLoop, UsbLoop,
};
pub use peripherals::Peripherals;
pub use ports::{IkbdPorts, IkbdState};
pub use reset::{ResetAction, ResetSequenceDetector};
pub use serial::{RxBuffer, SerialPort, SerialTx, UartConfig};

// Re-export the component crates the public API is built from.
pub use atari_st_keyboard;
pub use hid_input;
pub use hitachi_hd6301;
pub use ikbd_core;
pub use peripheral_st_joystick;
pub use peripheral_st_mouse;
