//! Parallel I/O ports 1-4.
//!
//! Each port has a data latch and a data direction register. A bit with
//! DDR=1 drives its latch onto the pin and reads it back; a bit with DDR=0
//! reads whatever the outside world presents, supplied by [`PortHooks`].

/// One of the four parallel ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    P1,
    P2,
    P3,
    P4,
}

impl Port {
    const fn index(self) -> usize {
        match self {
            Port::P1 => 0,
            Port::P2 => 1,
            Port::P3 => 2,
            Port::P4 => 3,
        }
    }
}

/// Port 2 only has five pins; the top three bits read the operating mode
/// strapped at reset. The IKBD runs in mode 7 (single chip).
pub const PORT2_MODE_BITS: u8 = 0b111 << 5;

/// Latch and direction state of all four ports, handed to the hooks so a
/// matrix scan can see which lines are being driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortLatches {
    data: [u8; 4],
    ddr: [u8; 4],
}

impl PortLatches {
    /// Latch state from data and direction bytes for ports 1-4.
    #[must_use]
    pub const fn new(data: [u8; 4], ddr: [u8; 4]) -> Self {
        Self { data, ddr }
    }

    #[must_use]
    pub const fn data(&self, port: Port) -> u8 {
        self.data[port.index()]
    }

    #[must_use]
    pub const fn ddr(&self, port: Port) -> u8 {
        self.ddr[port.index()]
    }

    /// Output bits currently driven low.
    #[must_use]
    pub const fn driven_low(&self, port: Port) -> u8 {
        self.ddr[port.index()] & !self.data[port.index()]
    }
}

/// The MCU's view of the world outside its pins.
///
/// `read_port` returns the external level for every bit; the MCU keeps only
/// the bits configured as inputs. `transmit` receives each byte the SCI
/// shifts out.
pub trait PortHooks {
    fn read_port(&mut self, port: Port, latches: &PortLatches) -> u8;

    fn write_port(&mut self, _port: Port, _latches: &PortLatches) {}

    fn transmit(&mut self, byte: u8);
}

/// Port registers.
#[derive(Debug, Default)]
pub struct IoPorts {
    latches: PortLatches,
}

impl IoPorts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All DDRs clear: every pin is an input after reset.
    pub fn reset(&mut self) {
        self.latches = PortLatches::default();
    }

    #[must_use]
    pub fn latches(&self) -> &PortLatches {
        &self.latches
    }

    pub fn read_data<H: PortHooks>(&self, port: Port, hooks: &mut H) -> u8 {
        let i = port.index();
        let ddr = self.latches.ddr[i];
        let external = hooks.read_port(port, &self.latches);
        let value = (self.latches.data[i] & ddr) | (external & !ddr);
        if port == Port::P2 {
            (value & !PORT2_MODE_BITS) | PORT2_MODE_BITS
        } else {
            value
        }
    }

    pub fn write_data<H: PortHooks>(&mut self, port: Port, value: u8, hooks: &mut H) {
        self.latches.data[port.index()] = value;
        hooks.write_port(port, &self.latches);
    }

    #[must_use]
    pub fn ddr(&self, port: Port) -> u8 {
        self.latches.ddr[port.index()]
    }

    pub fn write_ddr<H: PortHooks>(&mut self, port: Port, value: u8, hooks: &mut H) {
        self.latches.ddr[port.index()] = value;
        hooks.write_port(port, &self.latches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pins(u8);

    impl PortHooks for Pins {
        fn read_port(&mut self, _port: Port, _latches: &PortLatches) -> u8 {
            self.0
        }

        fn transmit(&mut self, _byte: u8) {}
    }

    #[test]
    fn outputs_read_latch_inputs_read_pins() {
        let mut ports = IoPorts::new();
        let mut pins = Pins(0b1010_1010);
        ports.write_ddr(Port::P1, 0x0F, &mut pins);
        ports.write_data(Port::P1, 0x05, &mut pins);
        assert_eq!(ports.read_data(Port::P1, &mut pins), 0b1010_0101);
    }

    #[test]
    fn port2_reports_mode_seven() {
        let mut ports = IoPorts::new();
        let mut pins = Pins(0x00);
        assert_eq!(ports.read_data(Port::P2, &mut pins), 0xE0);
    }

    #[test]
    fn driven_low_needs_output_direction() {
        let mut ports = IoPorts::new();
        let mut pins = Pins(0xFF);
        ports.write_data(Port::P3, 0x00, &mut pins);
        assert_eq!(ports.latches().driven_low(Port::P3), 0x00);
        ports.write_ddr(Port::P3, 0x02, &mut pins);
        assert_eq!(ports.latches().driven_low(Port::P3), 0x02);
    }
}
