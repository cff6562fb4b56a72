//! The HD6301's pins, wired to the shared input state.
//!
//! | Port | Direction | Lines |
//! |------|-----------|-------|
//! | P1   | in        | keyboard rows, active low |
//! | P2   | in        | bit 1 left button / joy 0 fire, bit 2 right button / joy 1 fire |
//! | P3   | out       | bits 1..7 keyboard columns 0..6 |
//! | P4   | in/out    | columns 7..14 when driven; mouse XA XB YA YB low, joy 1 high |
//!
//! Buttons and rows are active low.

use std::sync::Arc;

use atari_st_keyboard::KeyStateTable;
use hid_input::MouseButtons;
use hitachi_hd6301::{Port, PortHooks, PortLatches};
use peripheral_st_joystick::JoystickState;
use peripheral_st_mouse::QuadratureRegisters;

use crate::matrix::{self, KeyMatrix};
use crate::serial::SerialTx;

/// State written by the cooperative loop and read by the CPU context.
/// Each field has exactly one writer.
#[derive(Clone, Default)]
pub struct IkbdState {
    pub keys: Arc<KeyStateTable>,
    pub mouse: Arc<QuadratureRegisters>,
    pub buttons: Arc<MouseButtons>,
    pub joystick: Arc<JoystickState>,
    pub matrix: Arc<KeyMatrix>,
}

impl IkbdState {
    /// Button lines as the IKBD sees them, active high: HID mouse buttons
    /// OR the two joystick fire bits.
    #[must_use]
    pub fn mouse_buttons(&self) -> u8 {
        let (fire, _) = self.joystick.load();
        (self.buttons.load() | fire) & 0x03
    }

    /// The same state scanned through `matrix`.
    #[must_use]
    pub fn with_matrix(self, matrix: KeyMatrix) -> Self {
        Self {
            matrix: Arc::new(matrix),
            ..self
        }
    }
}

/// [`PortHooks`] for the IKBD board.
pub struct IkbdPorts<T> {
    state: IkbdState,
    tx: T,
}

impl<T: SerialTx> IkbdPorts<T> {
    #[must_use]
    pub fn new(state: IkbdState, tx: T) -> Self {
        Self { state, tx }
    }

    #[must_use]
    pub fn state(&self) -> &IkbdState {
        &self.state
    }

    #[must_use]
    pub fn tx(&self) -> &T {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut T {
        &mut self.tx
    }

    fn port2(&self) -> u8 {
        !(self.state.mouse_buttons() << 1)
    }

    fn port4(&self) -> u8 {
        let (_, axis) = self.state.joystick.load();
        let (x, y) = self.state.mouse.tick();
        let low = ((x & 0x03) | ((y & 0x03) << 2)) as u8;
        (!axis & 0xF0) | low
    }
}

impl<T: SerialTx> PortHooks for IkbdPorts<T> {
    fn read_port(&mut self, port: Port, latches: &PortLatches) -> u8 {
        match port {
            Port::P1 => {
                let columns = matrix::selected_columns(
                    latches.driven_low(Port::P3),
                    latches.driven_low(Port::P4),
                );
                self.state.matrix.scan_rows(&self.state.keys, columns)
            }
            Port::P2 => self.port2(),
            Port::P3 => 0xFF,
            Port::P4 => self.port4(),
        }
    }

    fn transmit(&mut self, byte: u8) {
        log::trace!("IKBD -> ST {byte:#04X}");
        self.tx.send_blocking(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atari_st_keyboard::scancode;

    fn ports() -> IkbdPorts<Vec<u8>> {
        IkbdPorts::new(IkbdState::default(), Vec::new())
    }

    /// Latches with the given port 3 and port 4 output bits driven low.
    fn driving(p3: u8, p4: u8) -> PortLatches {
        PortLatches::new([0xFF, 0xFF, !p3, !p4], [0, 0, 0xFE, p4])
    }

    #[test]
    fn idle_lines_read_high() {
        let mut p = ports();
        let latches = PortLatches::default();
        assert_eq!(p.read_port(Port::P1, &latches), 0xFF);
        assert_eq!(p.read_port(Port::P2, &latches), 0xFF);
        assert_eq!(p.read_port(Port::P3, &latches), 0xFF);
    }

    #[test]
    fn key_in_selected_column_reads_low() {
        let mut p = ports();
        p.state().keys.set(scancode::A, true);
        let (col, row) = p.state().matrix.position(scancode::A).unwrap();
        let latches = if col < 7 {
            driving(1 << (col + 1), 0)
        } else {
            driving(0, 1 << (col - 7))
        };
        assert_eq!(p.read_port(Port::P1, &latches), !(1u8 << row));
        assert_eq!(p.read_port(Port::P1, &driving(0, 0)), 0xFF);
    }

    #[test]
    fn buttons_and_fire_share_port2() {
        let mut p = ports();
        let latches = PortLatches::default();
        p.state().buttons.set(true, false);
        assert_eq!(p.read_port(Port::P2, &latches), !0x04);
        p.state().buttons.set(false, false);
        p.state().joystick.store(0x01, 0);
        assert_eq!(p.read_port(Port::P2, &latches), !0x02);
    }

    #[test]
    fn port4_carries_quadrature_and_joystick1() {
        let mut p = ports();
        let latches = PortLatches::default();
        let (x, y) = p.state().mouse.tick();
        p.state().joystick.store(0, 0x80);
        let expected = 0x70 | ((x & 3) | ((y & 3) << 2)) as u8;
        assert_eq!(p.read_port(Port::P4, &latches), expected);
    }

    #[test]
    fn joystick0_never_masks_the_mouse_lines() {
        let mut p = ports();
        let (x, y) = p.state().mouse.tick();
        let quadrature = ((x & 3) | ((y & 3) << 2)) as u8;
        p.state().joystick.store(0, 0x0F);
        assert_eq!(p.read_port(Port::P4, &PortLatches::default()), 0xF0 | quadrature);
    }

    #[test]
    fn rows_follow_the_configured_matrix() {
        let mut codes = [[0; matrix::ROWS]; matrix::COLUMNS];
        codes[9][6] = scancode::A;
        let state = IkbdState::default().with_matrix(KeyMatrix::from_codes(codes));
        let mut p = IkbdPorts::new(state, Vec::new());
        p.state().keys.set(scancode::A, true);
        // Column 9 is port 4 bit 2.
        assert_eq!(p.read_port(Port::P1, &driving(0, 0x04)), !0x40);
        assert_eq!(p.read_port(Port::P1, &driving(0x02, 0)), 0xFF);
    }

    #[test]
    fn transmit_reaches_the_line() {
        let mut p = ports();
        p.transmit(0xF1);
        assert_eq!(p.tx(), &vec![0xF1]);
    }
}
