//! RESET and CONFIG lines the window can press.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use machine_ikbd::Board;

/// Line levels shared between the window and the mode loop.
#[derive(Debug, Clone, Default)]
pub struct Lines {
    pub reset: Arc<AtomicBool>,
    pub config: Arc<AtomicBool>,
}

impl Lines {
    /// Flip a line. Returns the new level.
    pub fn toggle(line: &AtomicBool) -> bool {
        !line.fetch_xor(true, Ordering::AcqRel)
    }
}

/// A board whose outputs are only logged.
pub struct RunnerBoard {
    lines: Lines,
    atari_out: bool,
    usb_out: bool,
}

impl RunnerBoard {
    #[must_use]
    pub fn new(lines: Lines) -> Self {
        Self {
            lines,
            atari_out: false,
            usb_out: false,
        }
    }
}

impl Board for RunnerBoard {
    fn reset_line(&mut self) -> bool {
        self.lines.reset.load(Ordering::Acquire)
    }

    fn config_line(&mut self) -> bool {
        self.lines.config.load(Ordering::Acquire)
    }

    fn set_outputs(&mut self, atari: bool, usb: bool) {
        self.atari_out = atari;
        self.usb_out = usb;
        log::debug!("ATARI_OUT={} USB_OUT={}", u8::from(atari), u8::from(usb));
    }

    fn outputs(&self) -> (bool, bool) {
        (self.atari_out, self.usb_out)
    }

    fn launch_configuration(&mut self) {
        log::info!("No configuration app on the desktop; the IKBD stops here");
    }
}
