//! The mouse emulator and joystick tracker, driven by the cooperative loop.

use std::sync::Arc;

use atari_st_keyboard::KeyStateTable;
use embedded_hal::digital::InputPin;
use hid_input::{InputSink, MouseButtons};
use ikbd_core::Clock;
use peripheral_st_joystick::{JoystickPort, JoystickTracker};
use peripheral_st_mouse::MouseEmulator;

use crate::ports::IkbdState;

/// Input-side owner of the pointer and joystick emulation.
pub struct Peripherals<C: Clock, P> {
    pub mouse: MouseEmulator<C>,
    pub joystick: JoystickTracker<P>,
    buttons: Arc<MouseButtons>,
}

impl<C: Clock, P: InputPin> Peripherals<C, P> {
    #[must_use]
    pub fn new(mouse: MouseEmulator<C>, joystick: JoystickTracker<P>) -> Self {
        Self {
            mouse,
            joystick,
            buttons: Arc::new(MouseButtons::new()),
        }
    }

    /// The shared state the CPU context reads, around `keys`.
    #[must_use]
    pub fn state(&self, keys: Arc<KeyStateTable>) -> IkbdState {
        IkbdState {
            keys,
            mouse: self.mouse.registers(),
            buttons: Arc::clone(&self.buttons),
            joystick: self.joystick.state(),
            matrix: Arc::default(),
        }
    }

    #[must_use]
    pub fn buttons(&self) -> &MouseButtons {
        &self.buttons
    }

    /// Advance the quadrature registers.
    pub fn advance_mouse(&mut self) {
        self.mouse.update();
    }

    /// Sample one joystick source. The original-mouse source drives the
    /// mouse emulator.
    pub fn update_joystick(&mut self, port: JoystickPort) {
        self.joystick.update(port, &mut self.mouse);
    }
}

impl<C: Clock, P: InputPin> InputSink for Peripherals<C, P> {
    fn update_mouse(&mut self, dx: i16, dy: i16, left: bool, right: bool) {
        self.buttons.set(left, right);
        self.mouse.set_speed(i32::from(dx), i32::from(dy));
    }

    fn set_joystick_state(&mut self, fire: u8, axis: u8) {
        self.joystick.set_state(fire, axis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{FloatingPin, unconnected_joystick};
    use ikbd_core::ManualClock;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn peripherals() -> (Peripherals<ManualClock, FloatingPin>, ManualClock) {
        let clock = ManualClock::new();
        let mouse = MouseEmulator::new(clock.clone(), &mut SmallRng::seed_from_u64(1));
        (Peripherals::new(mouse, unconnected_joystick()), clock)
    }

    #[test]
    fn mouse_update_sets_buttons_and_speed() {
        let (mut p, _clock) = peripherals();
        InputSink::update_mouse(&mut p, 10, -4, true, false);
        assert_eq!(p.buttons().load(), 0x02);
        let (x, y) = p.mouse.periods();
        assert!(x > 0);
        assert!(y < 0);
    }

    #[test]
    fn shared_state_sees_buttons_and_joystick() {
        let (mut p, _clock) = peripherals();
        let state = p.state(Arc::new(KeyStateTable::new()));
        p.joystick.init_usb(true, 1);
        p.set_joystick_state(0x02, 0x08);
        InputSink::update_mouse(&mut p, 0, 0, false, true);
        assert_eq!(state.joystick.load(), (0x01, 0x80));
        assert_eq!(state.mouse_buttons(), 0x01);
    }

    #[test]
    fn quadrature_moves_with_time() {
        let (mut p, clock) = peripherals();
        let state = p.state(Arc::new(KeyStateTable::new()));
        let before = state.mouse.tick();
        InputSink::update_mouse(&mut p, 40, 0, false, false);
        clock.advance(10_000);
        p.advance_mouse();
        assert_ne!(state.mouse.tick().0, before.0);
        assert_eq!(state.mouse.tick().1, before.1);
    }
}
