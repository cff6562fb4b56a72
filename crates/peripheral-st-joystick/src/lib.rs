//! Atari ST joystick state.
//!
//! The IKBD sees two joystick ports packed into two bytes:
//!
//! - fire: bit 0 = port 1 fire, bit 1 = port 0 fire
//! - axis: low nibble = port 0, high nibble = port 1, each
//!   bit 0 up, bit 1 down, bit 2 left, bit 3 right
//!
//! Ports are fed either from physical GPIO pins (active low) or from USB /
//! Bluetooth gamepads through [`JoystickTracker::set_state`]. A third
//! source decodes an original ST mouse wired to the port 0 pins and
//! drives the mouse emulator instead.

mod quadrature;
mod state;

use std::sync::Arc;

use embedded_hal::digital::InputPin;
use peripheral_st_mouse::SpeedSink;

pub use quadrature::{QuadratureDecoder, edges_to_speed, quad_delta};
pub use state::JoystickState;

pub mod axis {
    pub const UP: u8 = 0x01;
    pub const DOWN: u8 = 0x02;
    pub const LEFT: u8 = 0x04;
    pub const RIGHT: u8 = 0x08;
}

pub mod fire {
    pub const PORT1: u8 = 0x01;
    pub const PORT0: u8 = 0x02;
}

/// Which source an [`JoystickTracker::update`] call samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickPort {
    /// Physical joystick 0 pins.
    Joy0,
    /// Physical joystick 1 pins.
    Joy1,
    /// Original ST mouse on the joystick 0 pins, fed to the mouse emulator.
    OriginalMouse,
    /// USB joystick data, delivered through `set_state`.
    UsbPrimary,
    UsbSecondary,
}

impl TryFrom<u8> for JoystickPort {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Joy0),
            1 => Ok(Self::Joy1),
            2 => Ok(Self::OriginalMouse),
            3 => Ok(Self::UsbPrimary),
            4 => Ok(Self::UsbSecondary),
            other => Err(other),
        }
    }
}

/// The five lines of one joystick port.
pub struct PortPins<P> {
    pub up: P,
    pub down: P,
    pub left: P,
    pub right: P,
    pub fire: P,
}

/// Active-low read; a pin that cannot be read counts as released.
fn pressed<P: InputPin>(pin: &mut P) -> bool {
    pin.is_low().unwrap_or(false)
}

impl<P: InputPin> PortPins<P> {
    fn directions(&mut self) -> u8 {
        let mut bits = 0;
        if pressed(&mut self.up) {
            bits |= axis::UP;
        }
        if pressed(&mut self.down) {
            bits |= axis::DOWN;
        }
        if pressed(&mut self.left) {
            bits |= axis::LEFT;
        }
        if pressed(&mut self.right) {
            bits |= axis::RIGHT;
        }
        bits
    }
}

/// Samples the joystick sources into the shared [`JoystickState`].
pub struct JoystickTracker<P> {
    joy0: PortPins<P>,
    joy1: PortPins<P>,
    state: Arc<JoystickState>,
    decoder: QuadratureDecoder,
    usb_enabled: bool,
    usb_port: u8,
}

impl<P: InputPin> JoystickTracker<P> {
    #[must_use]
    pub fn new(joy0: PortPins<P>, joy1: PortPins<P>) -> Self {
        Self {
            joy0,
            joy1,
            state: Arc::new(JoystickState::new()),
            decoder: QuadratureDecoder::new(),
            usb_enabled: false,
            usb_port: 1,
        }
    }

    /// Clear the state. Pin direction and pull-ups belong to the board.
    pub fn init(&mut self) {
        self.state.store(0, 0);
        self.decoder = QuadratureDecoder::new();
        log::info!("Joystick initialized");
    }

    pub fn init_usb(&mut self, enabled: bool, port: u8) {
        self.usb_enabled = enabled;
        self.usb_port = port;
        let state = if enabled { "enabled" } else { "disabled" };
        log::info!("USB joystick {state} on port {port}");
    }

    #[must_use]
    pub fn usb_enabled(&self) -> bool {
        self.usb_enabled
    }

    #[must_use]
    pub fn usb_port(&self) -> u8 {
        self.usb_port
    }

    /// Handle for the CPU context.
    #[must_use]
    pub fn state(&self) -> Arc<JoystickState> {
        Arc::clone(&self.state)
    }

    /// `(fire, axis)` as the IKBD sees them.
    #[must_use]
    pub fn get_state(&self) -> (u8, u8) {
        self.state.load()
    }

    /// Sample one source.
    pub fn update(&mut self, port: JoystickPort, mouse: &mut impl SpeedSink) {
        let (fire_bits, axis_bits) = self.state.load();
        match port {
            JoystickPort::Joy0 => {
                let fire = (fire_bits & !fire::PORT0)
                    | if pressed(&mut self.joy0.fire) { fire::PORT0 } else { 0 };
                let axis = (axis_bits & 0xF0) | self.joy0.directions();
                self.state.store(fire, axis);
            }
            JoystickPort::Joy1 => {
                let fire = (fire_bits & !fire::PORT1)
                    | if pressed(&mut self.joy1.fire) { fire::PORT1 } else { 0 };
                let axis = (axis_bits & 0x0F) | (self.joy1.directions() << 4);
                self.state.store(fire, axis);
            }
            JoystickPort::OriginalMouse => {
                // Mouse buttons arrive on the fire lines: left on joy0.
                let mut fire = fire_bits & !(fire::PORT0 | fire::PORT1);
                if pressed(&mut self.joy0.fire) {
                    fire |= fire::PORT0;
                }
                if pressed(&mut self.joy1.fire) {
                    fire |= fire::PORT1;
                }
                self.state.store(fire, axis_bits);

                // X on down/up, Y on right/left.
                let x = phase(pressed(&mut self.joy0.down), pressed(&mut self.joy0.up));
                let y = phase(pressed(&mut self.joy0.right), pressed(&mut self.joy0.left));
                let (sx, sy) = self.decoder.sample(x, y);
                mouse.set_speed(sx, sy);
            }
            // USB data arrives through `set_state`.
            JoystickPort::UsbPrimary | JoystickPort::UsbSecondary => {}
        }
    }

    /// Joystick state from a USB or Bluetooth gamepad, in port 0 encoding.
    /// Only applied when the USB joystick is mapped to port 1, where it is
    /// shifted into the port 1 bits.
    pub fn set_state(&mut self, fire_bits: u8, axis_bits: u8) {
        if self.usb_port == 1 {
            self.state.store(fire_bits >> 1, axis_bits << 4);
        }
    }
}

/// Two-bit phase from the A and B lines.
fn phase(a: bool, b: bool) -> u8 {
    u8::from(a) | (u8::from(b) << 1)
}
