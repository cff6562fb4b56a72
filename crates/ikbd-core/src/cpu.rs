//! CPU core trait.

use crate::{Bus, Cycles};

/// A CPU core.
///
/// The IKBD CPU is stepped one whole instruction at a time; the caller
/// accumulates the returned cycle counts to pace on-chip peripherals.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction (or service one pending interrupt) and
    /// return the cycles it took.
    fn step<B: Bus>(&mut self, bus: &mut B) -> Cycles;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a snapshot of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true while the CPU waits for an interrupt (`WAI`/`SLP`).
    fn is_halted(&self) -> bool;

    /// Drive the level-sensitive maskable interrupt line.
    fn set_irq(&mut self, asserted: bool);

    /// Latch a non-maskable interrupt for the next step.
    fn nmi(&mut self);

    /// Reset the CPU, fetching the reset vector through the bus.
    fn reset<B: Bus>(&mut self, bus: &mut B);
}
