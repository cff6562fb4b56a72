//! HD6301 CPU registers.

use crate::Ccr;

/// HD6301 register set.
///
/// - A, B: 8-bit accumulators, paired as the 16-bit D (A high)
/// - X: 16-bit index register
/// - SP: 16-bit stack pointer (post-decrement on push)
/// - PC: 16-bit program counter
/// - CCR: condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub x: u16,
    pub sp: u16,
    pub pc: u16,
    pub ccr: Ccr,
}

impl Registers {
    /// Registers as they come out of reset, before the vector fetch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            a: 0,
            b: 0,
            x: 0,
            sp: 0,
            pc: 0,
            ccr: Ccr::new(),
        }
    }

    /// The D accumulator (A:B).
    #[must_use]
    pub const fn d(&self) -> u16 {
        u16::from_be_bytes([self.a, self.b])
    }

    pub fn set_d(&mut self, value: u16) {
        let [a, b] = value.to_be_bytes();
        self.a = a;
        self.b = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d_is_a_high_b_low() {
        let mut regs = Registers::new();
        regs.set_d(0x12AB);
        assert_eq!(regs.a, 0x12);
        assert_eq!(regs.b, 0xAB);
        assert_eq!(regs.d(), 0x12AB);
    }
}
