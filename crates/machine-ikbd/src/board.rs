//! The board's discrete lines: RESET and CONFIG in, source select out.

use std::convert::Infallible;
use std::fmt;

use embedded_hal::digital::{ErrorType, InputPin};
use peripheral_st_joystick::{JoystickTracker, PortPins};

/// GPIO numbers on the RP2040 board.
pub mod gpio {
    pub const RESET_IN: u8 = 3;
    pub const UART_TX: u8 = 4;
    pub const UART_RX: u8 = 5;
    pub const BD0SEL: u8 = 6;
    pub const ATARI_OUT: u8 = 7;
    pub const USB_OUT: u8 = 8;
    pub const CONFIG_IN: u8 = 9;

    pub const JOY1_UP: u8 = 11;
    pub const JOY1_DOWN: u8 = 12;
    pub const JOY1_LEFT: u8 = 13;
    pub const JOY1_RIGHT: u8 = 14;
    pub const JOY1_FIRE: u8 = 15;

    pub const JOY0_UP: u8 = 16;
    pub const JOY0_DOWN: u8 = 17;
    pub const JOY0_LEFT: u8 = 18;
    pub const JOY0_RIGHT: u8 = 19;
    pub const JOY0_FIRE: u8 = 20;
}

/// Which keyboard is electrically connected to the ST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardSource {
    /// The original ST keyboard.
    Native,
    /// The emulated IKBD.
    Emulated,
    None,
    /// Both outputs on, as the configuration app expects.
    Both,
}

impl KeyboardSource {
    /// `(atari_out, usb_out)` levels.
    #[must_use]
    pub const fn outputs(self) -> (bool, bool) {
        match self {
            Self::Native => (true, false),
            Self::Emulated => (false, true),
            Self::None => (false, false),
            Self::Both => (true, true),
        }
    }

    #[must_use]
    pub const fn from_outputs(atari: bool, usb: bool) -> Self {
        match (atari, usb) {
            (true, false) => Self::Native,
            (false, true) => Self::Emulated,
            (false, false) => Self::None,
            (true, true) => Self::Both,
        }
    }
}

impl fmt::Display for KeyboardSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Emulated => "emulated",
            Self::None => "none",
            Self::Both => "both",
        })
    }
}

/// The GPIO boundary.
pub trait Board {
    /// Level of the ST's RESET line.
    fn reset_line(&mut self) -> bool;

    /// Level of the CONFIG request line.
    fn config_line(&mut self) -> bool;

    fn set_outputs(&mut self, atari: bool, usb: bool);

    /// Current `(atari_out, usb_out)` levels.
    fn outputs(&self) -> (bool, bool);

    /// Board-specific handover to the configuration app.
    fn launch_configuration(&mut self) {}

    fn select_source(&mut self, source: KeyboardSource) {
        let (atari, usb) = source.outputs();
        self.set_outputs(atari, usb);
        log::info!("Keyboard source: {source}");
    }

    fn source(&self) -> KeyboardSource {
        let (atari, usb) = self.outputs();
        KeyboardSource::from_outputs(atari, usb)
    }

    /// Both outputs on, then hand over.
    fn enter_configuration(&mut self) {
        self.select_source(KeyboardSource::Both);
        log::info!("Launching configuration...");
        self.launch_configuration();
    }
}

impl<B: Board + ?Sized> Board for &mut B {
    fn reset_line(&mut self) -> bool {
        (**self).reset_line()
    }

    fn config_line(&mut self) -> bool {
        (**self).config_line()
    }

    fn set_outputs(&mut self, atari: bool, usb: bool) {
        (**self).set_outputs(atari, usb);
    }

    fn outputs(&self) -> (bool, bool) {
        (**self).outputs()
    }

    fn launch_configuration(&mut self) {
        (**self).launch_configuration();
    }
}

/// Invert both source outputs. Returns the new source.
pub fn toggle_source(board: &mut impl Board) -> KeyboardSource {
    let (atari, usb) = board.outputs();
    board.set_outputs(!atari, !usb);
    let source = board.source();
    log::info!("Toggled keyboard source to {source}");
    source
}

/// A board with no hardware: lines are plain fields. Used by the desktop
/// runner and tests.
#[derive(Debug, Default, Clone)]
pub struct VirtualBoard {
    pub reset: bool,
    pub config: bool,
    atari_out: bool,
    usb_out: bool,
    configuration_launches: u32,
}

impl VirtualBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the configuration app was launched.
    #[must_use]
    pub fn configuration_launches(&self) -> u32 {
        self.configuration_launches
    }
}

impl Board for VirtualBoard {
    fn reset_line(&mut self) -> bool {
        self.reset
    }

    fn config_line(&mut self) -> bool {
        self.config
    }

    fn set_outputs(&mut self, atari: bool, usb: bool) {
        self.atari_out = atari;
        self.usb_out = usb;
    }

    fn outputs(&self) -> (bool, bool) {
        (self.atari_out, self.usb_out)
    }

    fn launch_configuration(&mut self) {
        self.configuration_launches += 1;
    }
}

/// An input with nothing attached. The pull-up holds it high, which the
/// active-low joystick lines read as released.
#[derive(Debug, Default, Clone, Copy)]
pub struct FloatingPin;

impl ErrorType for FloatingPin {
    type Error = Infallible;
}

impl InputPin for FloatingPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

fn floating_port() -> PortPins<FloatingPin> {
    PortPins {
        up: FloatingPin,
        down: FloatingPin,
        left: FloatingPin,
        right: FloatingPin,
        fire: FloatingPin,
    }
}

/// A joystick tracker for a host without joystick ports.
#[must_use]
pub fn unconnected_joystick() -> JoystickTracker<FloatingPin> {
    JoystickTracker::new(floating_port(), floating_port())
}
