use embedded_hal::delay::DelayNs;
use ikbd_core::Clock;

use super::{Halt, Link, LoopControl, ModeLoop, halt_on};
use crate::board::{Board, KeyboardSource};
use crate::reset::ResetLineWatch;

/// The original keyboard is connected straight through. The loop only
/// watches for requests to leave.
pub struct NativeLoop<B, C, D> {
    link: Link<B, C, D>,
    reset_watch: ResetLineWatch<C>,
}

impl<B: Board, C: Clock + Clone, D: DelayNs> NativeLoop<B, C, D> {
    pub fn new(mut link: Link<B, C, D>) -> Self {
        log::info!("Entering native keyboard mode");
        link.select_source(KeyboardSource::Native);
        let level = link.board_mut().reset_line();
        let reset_watch = ResetLineWatch::new(link.clock().clone(), level);
        Self { link, reset_watch }
    }

    #[must_use]
    pub fn link(&self) -> &Link<B, C, D> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<B, C, D> {
        &mut self.link
    }
}

impl<B: Board, C: Clock + Clone, D: DelayNs> ModeLoop for NativeLoop<B, C, D> {
    fn poll(&mut self) -> LoopControl {
        halt_on!(self.link.config_requested_at_start());

        let level = self.link.watch_reset_line();
        if self.reset_watch.sample(level) {
            log::info!("RESET change within config window. Entering configuration.");
            self.link.launch_config();
            return LoopControl::Halt(Halt::Configuration);
        }
        halt_on!(self.link.watch_config_line());

        self.link.handle_rx();
        self.link.handle_reset_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::VirtualBoard;
    use crate::modes::testing::rig;
    use crate::ports::IkbdState;

    #[test]
    fn selects_native_source() {
        let rig = rig(VirtualBoard::new(), IkbdState::default());
        let mode = NativeLoop::new(rig.link);
        assert_eq!(mode.link().board().source(), KeyboardSource::Native);
    }

    #[test]
    fn reset_release_in_window_enters_configuration() {
        let mut board = VirtualBoard::new();
        board.reset = true;
        let rig = rig(board, IkbdState::default());
        let clock = rig.clock.clone();
        let mut mode = NativeLoop::new(rig.link);
        assert_eq!(mode.poll(), LoopControl::Continue);
        clock.advance(15_000_000);
        mode.link_mut().board_mut().reset = false;
        assert_eq!(mode.poll(), LoopControl::Halt(Halt::Configuration));
        assert!(mode.link().core().is_stopped());
    }

    #[test]
    fn early_reset_release_keeps_running() {
        let mut board = VirtualBoard::new();
        board.reset = true;
        let rig = rig(board, IkbdState::default());
        let clock = rig.clock.clone();
        let mut mode = NativeLoop::new(rig.link);
        clock.advance(500_000);
        mode.link_mut().board_mut().reset = false;
        assert_eq!(mode.poll(), LoopControl::Continue);
        assert_eq!(mode.link().board().source(), KeyboardSource::Native);
    }

    #[test]
    fn config_press_launches_configuration() {
        let rig = rig(VirtualBoard::new(), IkbdState::default());
        let mut mode = NativeLoop::new(rig.link);
        mode.link_mut().board_mut().config = true;
        assert_eq!(mode.poll(), LoopControl::Halt(Halt::Configuration));
        assert_eq!(mode.link().board().source(), KeyboardSource::Both);
    }
}
