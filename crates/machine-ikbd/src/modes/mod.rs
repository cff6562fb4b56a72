//! Mode loops for the cooperative context.
//!
//! Each loop is a struct whose [`ModeLoop::poll`] runs one non-blocking
//! iteration. All of them share a [`Link`]: the serial receive ring, the
//! handle to the CPU context, the reset-sequence detector and the board.

/// Early return on a halt.
macro_rules! halt_on {
    ($control:expr) => {
        if let control @ $crate::modes::LoopControl::Halt(_) = $control {
            return control;
        }
    };
}
pub(crate) use halt_on;

mod bluetooth;
mod configuration;
mod native;
mod usb;

pub use bluetooth::BluetoothLoop;
pub use configuration::ConfigurationLoop;
pub use native::NativeLoop;
pub use usb::UsbLoop;

use embedded_hal::delay::DelayNs;
use ikbd_core::Clock;

use crate::board::{Board, KeyboardSource, toggle_source};
use crate::mcu::CoreHandle;
use crate::reset::{ResetAction, ResetSequenceDetector};
use crate::serial::RxBuffer;

/// Pacing delay before each byte is handed to the HD6301.
pub const IKBD_BYTE_US: u32 = 800;

/// Why a loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Handed over to the configuration app.
    Configuration,
    /// The keyboard source was toggled; the board stays as it is until
    /// restarted.
    Bypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Halt(Halt),
}

/// One iteration at a time.
pub trait ModeLoop {
    fn poll(&mut self) -> LoopControl;

    /// Poll until the loop halts.
    fn run(&mut self) -> Halt {
        loop {
            if let LoopControl::Halt(halt) = self.poll() {
                log::info!("Mode loop halted: {halt:?}");
                return halt;
            }
        }
    }
}

/// A periodic deadline against a microsecond clock.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_us: u64,
    last: u64,
}

impl Interval {
    #[must_use]
    pub const fn new(period_us: u64, now: u64) -> Self {
        Self {
            period_us,
            last: now,
        }
    }

    /// True once per elapsed period; restarts the period from `now`.
    pub fn due(&mut self, now: u64) -> bool {
        if now.saturating_sub(self.last) >= self.period_us {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// What every mode loop shares.
pub struct Link<B, C, D> {
    board: B,
    rx: RxBuffer,
    core: CoreHandle,
    detector: ResetSequenceDetector<C>,
    clock: C,
    delay: D,
    prev_config: bool,
    prev_reset: bool,
    config_at_start: bool,
}

impl<B: Board, C: Clock + Clone, D: DelayNs> Link<B, C, D> {
    /// Capture the initial RESET and CONFIG levels. `clock` should count
    /// from boot.
    pub fn new(mut board: B, rx: RxBuffer, core: CoreHandle, clock: C, delay: D) -> Self {
        let prev_config = board.config_line();
        let prev_reset = board.reset_line();
        Self {
            board,
            rx,
            core,
            detector: ResetSequenceDetector::new(clock.clone()),
            clock,
            delay,
            prev_config,
            prev_reset,
            config_at_start: prev_config,
        }
    }

    #[must_use]
    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    #[must_use]
    pub fn core(&self) -> &CoreHandle {
        &self.core
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub fn detector(&self) -> &ResetSequenceDetector<C> {
        &self.detector
    }

    #[must_use]
    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn select_source(&mut self, source: KeyboardSource) {
        self.board.select_source(source);
    }

    /// Move bytes from the ST into the HD6301, once its receiver is free.
    pub fn handle_rx(&mut self) {
        if self.core.sci_busy() || self.rx.rx_available() == 0 {
            return;
        }
        while let Some(byte) = self.rx.rx_buffer_get() {
            self.detector.feed(byte);
            self.delay.delay_us(IKBD_BYTE_US);
            log::trace!("ST -> 6301 {byte:#04X}");
            if !self.core.send(byte) {
                log::warn!("HD6301 input channel full, dropped {byte:#04X}");
            }
        }
    }

    /// Act on a reset hold, if one was recorded.
    pub fn handle_reset_sequence(&mut self) -> LoopControl {
        match self.detector.poll() {
            None => LoopControl::Continue,
            Some(ResetAction::EnterConfiguration) => {
                self.launch_config();
                LoopControl::Halt(Halt::Configuration)
            }
            Some(ResetAction::ToggleSource) => {
                self.toggle_source();
                log::info!("The device is now in bypass mode. Restart to re-enable input.");
                LoopControl::Halt(Halt::Bypass)
            }
        }
    }

    /// Swap the keyboard source. Going native stops the CPU context.
    pub fn toggle_source(&mut self) -> KeyboardSource {
        let source = toggle_source(&mut self.board);
        if source == KeyboardSource::Native {
            self.core.stop();
        }
        source
    }

    /// Hand the board to the configuration app and stop the CPU context.
    pub fn launch_config(&mut self) {
        self.board.enter_configuration();
        self.core.stop();
    }

    /// Launch configuration if CONFIG was asserted when the link was made.
    /// Only answers once.
    pub fn config_requested_at_start(&mut self) -> LoopControl {
        if std::mem::take(&mut self.config_at_start) {
            log::info!("CONFIG asserted at start");
            self.launch_config();
            LoopControl::Halt(Halt::Configuration)
        } else {
            LoopControl::Continue
        }
    }

    /// Launch configuration on a rising CONFIG edge.
    pub fn watch_config_line(&mut self) -> LoopControl {
        let level = self.board.config_line();
        if level == self.prev_config {
            return LoopControl::Continue;
        }
        log::info!("CONFIG line changed: {} -> {}", self.prev_config, level);
        self.prev_config = level;
        if level {
            self.launch_config();
            LoopControl::Halt(Halt::Configuration)
        } else {
            LoopControl::Continue
        }
    }

    /// Log RESET line changes. Returns the current level.
    pub fn watch_reset_line(&mut self) -> bool {
        let level = self.board.reset_line();
        if level != self.prev_reset {
            log::info!("RESET line changed: {} -> {}", self.prev_reset, level);
            self.prev_reset = level;
        }
        level
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::mpsc;

    use ikbd_core::ManualClock;

    use super::Link;
    use crate::board::VirtualBoard;
    use crate::mcu::IkbdCore;
    use crate::delay::NoDelay;
    use crate::ports::{IkbdPorts, IkbdState};
    use crate::serial::{ChannelUart, SerialPort, UartConfig};

    /// A ROM that loops forever without touching the SCI.
    pub fn idle_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x1000];
        rom[0] = 0x20;
        rom[1] = 0xFE;
        rom[0xFFE] = 0xF0;
        rom[0xFFF] = 0x00;
        rom
    }

    pub struct Rig {
        pub link: Link<VirtualBoard, ManualClock, NoDelay>,
        pub core: IkbdCore<Vec<u8>>,
        pub serial: SerialPort<ChannelUart>,
        pub wire: mpsc::Sender<u8>,
        pub clock: ManualClock,
    }

    impl Rig {
        /// Bytes from the ST reach the ring.
        pub fn receive(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.wire.send(b).unwrap();
            }
            self.serial.on_rx_interrupt();
        }
    }

    pub fn rig(board: VirtualBoard, state: IkbdState) -> Rig {
        rig_with_clock(board, state, ManualClock::new())
    }

    /// A rig whose link shares `clock` with peripherals built beforehand.
    pub fn rig_with_clock(board: VirtualBoard, state: IkbdState, clock: ManualClock) -> Rig {
        let (uart, wire) = ChannelUart::new();
        let (mut serial, rx) = SerialPort::new(uart, UartConfig::default());
        serial.open();
        let (core, handle) =
            IkbdCore::new(IkbdPorts::new(state, Vec::new()), &idle_rom()).unwrap();
        let link = Link::new(board, rx, handle, clock.clone(), NoDelay::new());
        Rig {
            link,
            core,
            serial,
            wire,
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::rig;
    use super::*;
    use crate::board::VirtualBoard;
    use crate::ports::IkbdState;
    use crate::reset::{ENTER_CONFIG_HOLD_US, TOGGLE_SOURCE_HOLD_US};

    #[test]
    fn interval_fires_once_per_period() {
        let mut interval = Interval::new(750, 0);
        assert!(!interval.due(749));
        assert!(interval.due(750));
        assert!(!interval.due(1000));
        assert!(interval.due(1500));
    }

    #[test]
    fn handle_rx_drains_with_pacing() {
        let mut rig = rig(VirtualBoard::new(), IkbdState::default());
        rig.receive(&[0x80, 0x01, 0x1C]);
        rig.link.handle_rx();
        assert_eq!(rig.link.delay().requested_us(), 3 * u64::from(IKBD_BYTE_US));
        assert!(rig.link.detector().first_sequence_us().is_some());
        // Queued bytes hold the core busy until it takes them.
        rig.core.run_batch();
        assert!(rig.link.core().sci_busy());
    }

    #[test]
    fn busy_core_defers_rx() {
        let mut rig = rig(VirtualBoard::new(), IkbdState::default());
        rig.receive(&[0x80, 0x01]);
        rig.link.handle_rx();
        rig.core.run_batch();
        rig.receive(&[0x1C]);
        let before = rig.link.delay().requested_us();
        rig.link.handle_rx();
        assert_eq!(rig.link.delay().requested_us(), before);
    }

    #[test]
    fn toggle_hold_goes_native_and_stops_core() {
        let mut rig = rig(VirtualBoard::new(), IkbdState::default());
        rig.link.select_source(KeyboardSource::Emulated);
        rig.clock.set(TOGGLE_SOURCE_HOLD_US + 5);
        rig.receive(&[0x80, 0x01]);
        rig.link.handle_rx();
        assert_eq!(
            rig.link.handle_reset_sequence(),
            LoopControl::Halt(Halt::Bypass)
        );
        assert_eq!(rig.link.board().source(), KeyboardSource::Native);
        assert!(rig.link.core().is_stopped());
    }

    #[test]
    fn long_hold_enters_configuration() {
        let mut rig = rig(VirtualBoard::new(), IkbdState::default());
        rig.clock.set(ENTER_CONFIG_HOLD_US);
        rig.receive(&[0x80, 0x01]);
        rig.link.handle_rx();
        assert_eq!(
            rig.link.handle_reset_sequence(),
            LoopControl::Halt(Halt::Configuration)
        );
        assert_eq!(rig.link.board().source(), KeyboardSource::Both);
        assert_eq!(rig.link.board().configuration_launches(), 1);
        assert!(rig.link.core().is_stopped());
    }

    #[test]
    fn config_rising_edge_launches() {
        let mut rig = rig(VirtualBoard::new(), IkbdState::default());
        assert_eq!(rig.link.config_requested_at_start(), LoopControl::Continue);
        assert_eq!(rig.link.watch_config_line(), LoopControl::Continue);
        rig.link.board_mut().config = true;
        assert_eq!(
            rig.link.watch_config_line(),
            LoopControl::Halt(Halt::Configuration)
        );
    }

    #[test]
    fn config_at_start_is_reported_once() {
        let mut board = VirtualBoard::new();
        board.config = true;
        let mut rig = rig(board, IkbdState::default());
        assert_eq!(
            rig.link.config_requested_at_start(),
            LoopControl::Halt(Halt::Configuration)
        );
        assert_eq!(rig.link.config_requested_at_start(), LoopControl::Continue);
        // Still high: no edge.
        assert_eq!(rig.link.watch_config_line(), LoopControl::Continue);
    }
}
