//! HD6301 condition code register (CCR).
//!
//! Bits 6 and 7 are unused and always read as 1.

/// Carry / borrow.
pub const C: u8 = 0x01;

/// Two's-complement overflow.
pub const V: u8 = 0x02;

/// Zero result.
pub const Z: u8 = 0x04;

/// Negative result (bit 7, or bit 15 for 16-bit operations).
pub const N: u8 = 0x08;

/// Interrupt mask. When set, IRQ1 and the on-chip interrupts are held off.
pub const I: u8 = 0x10;

/// Half carry from bit 3, used by `DAA`.
pub const H: u8 = 0x20;

/// The two unused bits.
pub const UNUSED: u8 = 0xC0;

/// Condition code register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ccr(pub u8);

impl Default for Ccr {
    fn default() -> Self {
        Self::new()
    }
}

impl Ccr {
    /// Reset state: interrupts masked.
    #[must_use]
    pub const fn new() -> Self {
        Self(UNUSED | I)
    }

    /// Build from a raw byte (`TAP`, `RTI`), forcing the unused bits.
    #[must_use]
    pub const fn from_byte(value: u8) -> Self {
        Self(value | UNUSED)
    }

    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self.0 | UNUSED
    }

    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// Set N and Z from an 8-bit result.
    pub fn update_nz(&mut self, value: u8) {
        self.set_if(Z, value == 0);
        self.set_if(N, value & 0x80 != 0);
    }

    /// Set N and Z from a 16-bit result.
    pub fn update_nz16(&mut self, value: u16) {
        self.set_if(Z, value == 0);
        self.set_if(N, value & 0x8000 != 0);
    }

    /// Logical result: N and Z from the value, V cleared.
    pub fn update_logic(&mut self, value: u8) {
        self.update_nz(value);
        self.clear(V);
    }

    /// Shifts and rotates define V as N xor C after the operation.
    pub fn update_shift_overflow(&mut self) {
        let n = self.is_set(N);
        let c = self.is_set(C);
        self.set_if(V, n != c);
    }
}
