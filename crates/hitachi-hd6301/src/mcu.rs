//! The HD6301V1 as a whole chip: CPU, memory, ports, timer and SCI.

use ikbd_core::{Bus, Cpu, Cycles, Observable, Value};

use crate::memory::{Memory, MemoryError};
use crate::ports::{IoPorts, Port, PortHooks};
use crate::sci::Sci;
use crate::timer::Timer;
use crate::{Hd6301Cpu, Registers};

/// On-chip register addresses.
pub mod regs {
    pub const P1DDR: u16 = 0x00;
    pub const P2DDR: u16 = 0x01;
    pub const P1DR: u16 = 0x02;
    pub const P2DR: u16 = 0x03;
    pub const P3DDR: u16 = 0x04;
    pub const P4DDR: u16 = 0x05;
    pub const P3DR: u16 = 0x06;
    pub const P4DR: u16 = 0x07;
    pub const TCSR: u16 = 0x08;
    pub const FRCH: u16 = 0x09;
    pub const FRCL: u16 = 0x0A;
    pub const OCRH: u16 = 0x0B;
    pub const OCRL: u16 = 0x0C;
    pub const ICRH: u16 = 0x0D;
    pub const ICRL: u16 = 0x0E;
    pub const P3CSR: u16 = 0x0F;
    pub const RMCR: u16 = 0x10;
    pub const TRCSR: u16 = 0x11;
    pub const RDR: u16 = 0x12;
    pub const TDR: u16 = 0x13;
    pub const RAMCR: u16 = 0x14;
    /// First address past the register block.
    pub const END: u16 = 0x20;
}

/// Everything the CPU can reach, borrowed for one step.
struct McuBus<'a, H: PortHooks> {
    memory: &'a mut Memory,
    ports: &'a mut IoPorts,
    timer: &'a mut Timer,
    sci: &'a mut Sci,
    p3csr: &'a mut u8,
    ramcr: &'a mut u8,
    hooks: &'a mut H,
}

impl<H: PortHooks> McuBus<'_, H> {
    fn read_register(&mut self, address: u16) -> u8 {
        match address {
            regs::P1DDR => self.ports.ddr(Port::P1),
            regs::P2DDR => self.ports.ddr(Port::P2),
            regs::P1DR => self.ports.read_data(Port::P1, self.hooks),
            regs::P2DR => self.ports.read_data(Port::P2, self.hooks),
            regs::P3DDR => self.ports.ddr(Port::P3),
            regs::P4DDR => self.ports.ddr(Port::P4),
            regs::P3DR => self.ports.read_data(Port::P3, self.hooks),
            regs::P4DR => self.ports.read_data(Port::P4, self.hooks),
            regs::TCSR => self.timer.read_tcsr(),
            regs::FRCH => self.timer.read_counter_high(),
            regs::FRCL => self.timer.read_counter_low(),
            regs::OCRH => self.timer.read_compare_high(),
            regs::OCRL => self.timer.read_compare_low(),
            regs::ICRH => self.timer.read_capture_high(),
            regs::ICRL => self.timer.read_capture_low(),
            regs::P3CSR => *self.p3csr,
            regs::RMCR => self.sci.read_rmcr(),
            regs::TRCSR => self.sci.read_trcsr(),
            regs::RDR => self.sci.read_rdr(),
            regs::TDR => self.sci.read_tdr(),
            regs::RAMCR => *self.ramcr,
            _ => 0xFF,
        }
    }

    fn write_register(&mut self, address: u16, value: u8) {
        match address {
            regs::P1DDR => self.ports.write_ddr(Port::P1, value, self.hooks),
            regs::P2DDR => self.ports.write_ddr(Port::P2, value, self.hooks),
            regs::P1DR => self.ports.write_data(Port::P1, value, self.hooks),
            regs::P2DR => self.ports.write_data(Port::P2, value, self.hooks),
            regs::P3DDR => self.ports.write_ddr(Port::P3, value, self.hooks),
            regs::P4DDR => self.ports.write_ddr(Port::P4, value, self.hooks),
            regs::P3DR => self.ports.write_data(Port::P3, value, self.hooks),
            regs::P4DR => self.ports.write_data(Port::P4, value, self.hooks),
            regs::TCSR => self.timer.write_tcsr(value),
            regs::FRCH => self.timer.write_counter_high(value),
            regs::FRCL => self.timer.write_counter_low(value),
            regs::OCRH => self.timer.write_compare_high(value),
            regs::OCRL => self.timer.write_compare_low(value),
            regs::P3CSR => *self.p3csr = value,
            regs::RMCR => self.sci.write_rmcr(value),
            regs::TRCSR => self.sci.write_trcsr(value),
            regs::TDR => {
                if let Some(byte) = self.sci.write_tdr(value) {
                    self.hooks.transmit(byte);
                }
            }
            regs::RAMCR => *self.ramcr = value,
            _ => {}
        }
    }
}

impl<H: PortHooks> Bus for McuBus<'_, H> {
    fn read(&mut self, address: u16) -> u8 {
        if address < regs::END {
            self.read_register(address)
        } else {
            self.memory.read(address)
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        if address < regs::END {
            self.write_register(address, value);
        } else {
            self.memory.write(address, value);
        }
    }
}

/// The complete HD6301V1 microcontroller.
///
/// The outside world is reached only through `H`: port pin levels in and
/// serial bytes out.
pub struct Hd6301<H: PortHooks> {
    cpu: Hd6301Cpu,
    memory: Memory,
    ports: IoPorts,
    timer: Timer,
    sci: Sci,
    p3csr: u8,
    ramcr: u8,
    hooks: H,
    cycles: Cycles,
}

impl<H: PortHooks> Hd6301<H> {
    /// Allocate memory and build the chip. Call [`Self::load_rom`] and
    /// [`Self::reset`] before running.
    pub fn new(hooks: H) -> Result<Self, MemoryError> {
        Ok(Self {
            cpu: Hd6301Cpu::new(),
            memory: Memory::new()?,
            ports: IoPorts::new(),
            timer: Timer::new(),
            sci: Sci::new(),
            p3csr: 0,
            ramcr: 0,
            hooks,
            cycles: Cycles::ZERO,
        })
    }

    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        self.memory.load_rom(image)?;
        log::info!("HD6301: loaded {} byte ROM", image.len());
        Ok(())
    }

    /// Reset the on-chip peripherals and the CPU, which fetches the reset
    /// vector from ROM.
    pub fn reset(&mut self) {
        self.ports.reset();
        self.timer.reset();
        self.sci.reset();
        self.p3csr = 0;
        self.ramcr = 0;
        let Self {
            cpu,
            memory,
            ports,
            timer,
            sci,
            p3csr,
            ramcr,
            hooks,
            ..
        } = self;
        let mut bus = McuBus {
            memory,
            ports,
            timer,
            sci,
            p3csr,
            ramcr,
            hooks,
        };
        cpu.reset(&mut bus);
        log::debug!("HD6301: reset, PC={:#06X}", cpu.pc());
    }

    /// Execute one instruction and tick the peripherals by its length.
    pub fn step(&mut self) -> Cycles {
        let internal = self
            .timer
            .pending_vector()
            .or_else(|| self.sci.pending_vector());
        self.cpu.set_internal_interrupt(internal);

        let Self {
            cpu,
            memory,
            ports,
            timer,
            sci,
            p3csr,
            ramcr,
            hooks,
            ..
        } = self;
        let mut bus = McuBus {
            memory,
            ports,
            timer,
            sci,
            p3csr,
            ramcr,
            hooks,
        };
        let cycles = cpu.step(&mut bus);

        self.timer.tick(cycles.get());
        self.sci.tick(cycles.get());
        self.cycles += cycles;
        cycles
    }

    /// Run whole instructions until at least `budget` cycles have passed.
    /// Returns the cycles actually run.
    pub fn run_clocks(&mut self, budget: u64) -> Cycles {
        let mut run = Cycles::ZERO;
        while run.get() < budget {
            run += self.step();
        }
        run
    }

    /// A byte from the ST arrives at the SCI receiver.
    pub fn receive_byte(&mut self, byte: u8) -> bool {
        self.sci.receive(byte)
    }

    /// The receiver has not yet been read; another byte would overrun.
    #[must_use]
    pub fn sci_busy(&self) -> bool {
        self.sci.busy()
    }

    /// Mark the transmitter empty (or not).
    pub fn tx_empty(&mut self, empty: bool) {
        self.sci.set_tx_empty(empty);
    }

    /// Drive the external IRQ1 line.
    pub fn set_irq(&mut self, asserted: bool) {
        self.cpu.set_irq(asserted);
    }

    #[must_use]
    pub fn registers(&self) -> Registers {
        self.cpu.registers()
    }

    #[must_use]
    pub fn cycles(&self) -> Cycles {
        self.cycles
    }

    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Read memory without side effects on registers (RAM and ROM only).
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.memory.read(address)
    }
}

const MCU_QUERY_PATHS: &[&str] = &[
    "pc",
    "a",
    "b",
    "d",
    "x",
    "sp",
    "ccr",
    "flags.h",
    "flags.i",
    "flags.n",
    "flags.z",
    "flags.v",
    "flags.c",
    "cycles",
    "halted",
    "port1.ddr",
    "port2.ddr",
    "port3.ddr",
    "port4.ddr",
    "port1.data",
    "port2.data",
    "port3.data",
    "port4.data",
    "timer.frc",
    "sci.busy",
    "sci.overruns",
];

impl<H: PortHooks> Observable for Hd6301<H> {
    fn query(&self, path: &str) -> Option<Value> {
        let latches = self.ports.latches();
        let port = |name: &str| match name {
            "port1" => Some(Port::P1),
            "port2" => Some(Port::P2),
            "port3" => Some(Port::P3),
            "port4" => Some(Port::P4),
            _ => None,
        };
        match path {
            "cycles" => Some(self.cycles.get().into()),
            "timer.frc" => Some(self.timer.counter().into()),
            "sci.busy" => Some(self.sci.busy().into()),
            "sci.overruns" => Some(self.sci.overruns().into()),
            _ => {
                let (name, field) = path.split_once('.').unwrap_or((path, ""));
                match (port(name), field) {
                    (Some(p), "ddr") => Some(latches.ddr(p).into()),
                    (Some(p), "data") => Some(latches.data(p).into()),
                    (Some(_), _) => None,
                    (None, _) => self.cpu.query(path),
                }
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        MCU_QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortLatches;

    #[derive(Default)]
    struct Wire {
        sent: Vec<u8>,
        port1: u8,
    }

    impl PortHooks for Wire {
        fn read_port(&mut self, port: Port, _latches: &PortLatches) -> u8 {
            match port {
                Port::P1 => self.port1,
                _ => 0xFF,
            }
        }

        fn transmit(&mut self, byte: u8) {
            self.sent.push(byte);
        }
    }

    fn mcu_with(program: &[u8]) -> Hd6301<Wire> {
        let mut rom = vec![0u8; 0x1000];
        rom[..program.len()].copy_from_slice(program);
        rom[0xFFE] = 0xF0;
        rom[0xFFF] = 0x00;
        let mut mcu = Hd6301::new(Wire::default()).expect("allocate");
        mcu.load_rom(&rom).expect("load");
        mcu.reset();
        mcu
    }

    #[test]
    fn reset_fetches_vector() {
        let mcu = mcu_with(&[0x20, 0xFE]);
        assert_eq!(mcu.registers().pc, 0xF000);
    }

    #[test]
    fn writing_tdr_transmits() {
        let mut mcu = mcu_with(&[
            0x86, 0x0A, // LDAA #RE|TE
            0x97, 0x11, // STAA TRCSR
            0x86, 0xF1, // LDAA #$F1
            0x97, 0x13, // STAA TDR
            0x20, 0xFE, // BRA *
        ]);
        mcu.run_clocks(100);
        assert_eq!(mcu.hooks().sent, vec![0xF1]);
    }

    #[test]
    fn received_byte_is_echoed() {
        let mut mcu = mcu_with(&[
            0x86, 0x0A, // LDAA #RE|TE
            0x97, 0x11, // STAA TRCSR
            0x96, 0x11, // loop: LDAA TRCSR
            0x2A, 0xFC, // BPL loop
            0x96, 0x12, // LDAA RDR
            0x97, 0x13, // STAA TDR
            0x20, 0xF6, // BRA loop
        ]);
        mcu.run_clocks(50);
        assert!(!mcu.sci_busy());
        assert!(mcu.receive_byte(0x1C));
        assert!(mcu.sci_busy());
        mcu.run_clocks(50);
        assert!(!mcu.sci_busy());
        assert_eq!(mcu.hooks().sent, vec![0x1C]);
    }

    #[test]
    fn receive_is_refused_before_rx_enabled() {
        let mut mcu = mcu_with(&[0x20, 0xFE]);
        assert!(!mcu.receive_byte(0x80));
    }

    #[test]
    fn input_pins_come_from_hooks() {
        let mut mcu = mcu_with(&[
            0x96, 0x02, // LDAA P1
            0x97, 0x80, // STAA $80
            0x20, 0xFE, // BRA *
        ]);
        mcu.hooks_mut().port1 = 0x5A;
        mcu.run_clocks(20);
        assert_eq!(mcu.peek(0x80), 0x5A);
    }

    #[test]
    fn run_clocks_runs_whole_instructions() {
        let mut mcu = mcu_with(&[0x20, 0xFE]);
        let ran = mcu.run_clocks(1000);
        assert!(ran.get() >= 1000);
        assert_eq!(mcu.cycles(), ran);
    }

    #[test]
    fn query_exposes_ports_and_cpu() {
        let mut mcu = mcu_with(&[
            0x86, 0xFF, // LDAA #$FF
            0x97, 0x04, // STAA P3DDR
            0x20, 0xFE, // BRA *
        ]);
        mcu.run_clocks(20);
        assert_eq!(mcu.query("port3.ddr"), Some(Value::U8(0xFF)));
        assert_eq!(mcu.query("a"), Some(Value::U8(0xFF)));
        assert_eq!(mcu.query("port5.ddr"), None);
        assert!(mcu.query_paths().contains(&"timer.frc"));
    }
}
