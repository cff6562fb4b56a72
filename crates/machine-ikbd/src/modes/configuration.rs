use embedded_hal::delay::DelayNs;
use ikbd_core::Clock;

use super::{Link, LoopControl, ModeLoop};
use crate::board::{Board, KeyboardSource};

/// No keyboard source is connected; serial input is still passed through.
pub struct ConfigurationLoop<B, C, D> {
    link: Link<B, C, D>,
}

impl<B: Board, C: Clock + Clone, D: DelayNs> ConfigurationLoop<B, C, D> {
    pub fn new(mut link: Link<B, C, D>) -> Self {
        log::info!("Entering configuration mode");
        link.select_source(KeyboardSource::None);
        Self { link }
    }

    #[must_use]
    pub fn link(&self) -> &Link<B, C, D> {
        &self.link
    }
}

impl<B: Board, C: Clock + Clone, D: DelayNs> ModeLoop for ConfigurationLoop<B, C, D> {
    fn poll(&mut self) -> LoopControl {
        self.link.handle_rx();
        LoopControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::VirtualBoard;
    use crate::modes::testing::rig;
    use crate::ports::IkbdState;

    #[test]
    fn no_source_and_rx_still_flows() {
        let mut rig = rig(VirtualBoard::new(), IkbdState::default());
        rig.receive(&[0x80, 0x01]);
        let mut mode = ConfigurationLoop::new(rig.link);
        assert_eq!(mode.link().board().source(), KeyboardSource::None);
        assert_eq!(mode.poll(), LoopControl::Continue);
        assert!(mode.link().detector().first_sequence_us().is_some());
    }
}
