//! Hitachi HD6301V1 microcontroller, as used in the Atari ST keyboard.
//!
//! [`Hd6301Cpu`] is the bare CPU and can run against any [`ikbd_core::Bus`].
//! [`Hd6301`] is the whole chip: 128 bytes of RAM, 4 KB of mask ROM, the
//! register block, four parallel ports, the free-running timer and the
//! serial interface. Pin levels and transmitted bytes cross the chip
//! boundary through a [`PortHooks`] implementation.

mod cpu;
mod flags;
mod mcu;
mod memory;
mod ports;
mod registers;
mod sci;
mod timer;

pub use cpu::{Hd6301Cpu, vectors};
pub use flags::Ccr;
pub use mcu::{Hd6301, regs};
pub use memory::{MemoryError, ROM_SIZE, ROM_START};
pub use ports::{PORT2_MODE_BITS, Port, PortHooks, PortLatches};
pub use registers::Registers;
pub use sci::trcsr;
pub use timer::tcsr;
