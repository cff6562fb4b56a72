//! 16-bit programmable timer: free-running counter, output compare and
//! input capture.

use crate::cpu::vectors;

/// TCSR bits.
pub mod tcsr {
    /// Input capture flag.
    pub const ICF: u8 = 0x80;
    /// Output compare flag.
    pub const OCF: u8 = 0x40;
    /// Timer overflow flag.
    pub const TOF: u8 = 0x20;
    pub const EICI: u8 = 0x10;
    pub const EOCI: u8 = 0x08;
    pub const ETOI: u8 = 0x04;
    pub const IEDG: u8 = 0x02;
    pub const OLVL: u8 = 0x01;
    /// The flag bits are read-only.
    pub const FLAGS: u8 = ICF | OCF | TOF;
}

use tcsr::{EICI, EOCI, ETOI, FLAGS, ICF, OCF, TOF};

#[derive(Debug)]
pub struct Timer {
    frc: u16,
    ocr: u16,
    icr: u16,
    tcsr: u8,
    /// Flags that were set when TCSR was last read. A flag is only cleared
    /// by the matching register access if it was seen here first.
    flags_seen: u8,
    /// Low byte captured when the counter's high byte is read.
    read_latch: u8,
    /// High byte held until the counter's low byte is written.
    write_latch: u8,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frc: 0,
            ocr: 0xFFFF,
            icr: 0,
            tcsr: 0,
            flags_seen: 0,
            read_latch: 0,
            write_latch: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance the counter by `cycles` E-clock cycles.
    pub fn tick(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.frc = self.frc.wrapping_add(1);
            if self.frc == self.ocr {
                self.tcsr |= OCF;
            }
            if self.frc == 0 {
                self.tcsr |= TOF;
            }
        }
    }

    #[must_use]
    pub fn counter(&self) -> u16 {
        self.frc
    }

    #[must_use]
    pub fn pending_vector(&self) -> Option<u16> {
        let t = self.tcsr;
        if t & ICF != 0 && t & EICI != 0 {
            Some(vectors::ICF)
        } else if t & OCF != 0 && t & EOCI != 0 {
            Some(vectors::OCF)
        } else if t & TOF != 0 && t & ETOI != 0 {
            Some(vectors::TOF)
        } else {
            None
        }
    }

    pub fn read_tcsr(&mut self) -> u8 {
        self.flags_seen = self.tcsr & FLAGS;
        self.tcsr
    }

    pub fn write_tcsr(&mut self, value: u8) {
        self.tcsr = (self.tcsr & FLAGS) | (value & !FLAGS);
    }

    pub fn read_counter_high(&mut self) -> u8 {
        self.clear_seen(TOF);
        let [hi, lo] = self.frc.to_be_bytes();
        self.read_latch = lo;
        hi
    }

    pub fn read_counter_low(&self) -> u8 {
        self.read_latch
    }

    pub fn write_counter_high(&mut self, value: u8) {
        self.write_latch = value;
    }

    pub fn write_counter_low(&mut self, value: u8) {
        self.frc = u16::from_be_bytes([self.write_latch, value]);
    }

    #[must_use]
    pub fn read_compare_high(&self) -> u8 {
        self.ocr.to_be_bytes()[0]
    }

    #[must_use]
    pub fn read_compare_low(&self) -> u8 {
        self.ocr.to_be_bytes()[1]
    }

    pub fn write_compare_high(&mut self, value: u8) {
        self.clear_seen(OCF);
        self.ocr = u16::from_be_bytes([value, self.ocr.to_be_bytes()[1]]);
    }

    pub fn write_compare_low(&mut self, value: u8) {
        self.clear_seen(OCF);
        self.ocr = u16::from_be_bytes([self.ocr.to_be_bytes()[0], value]);
    }

    pub fn read_capture_high(&mut self) -> u8 {
        self.clear_seen(ICF);
        self.icr.to_be_bytes()[0]
    }

    #[must_use]
    pub fn read_capture_low(&self) -> u8 {
        self.icr.to_be_bytes()[1]
    }

    fn clear_seen(&mut self, flag: u8) {
        if self.flags_seen & flag != 0 {
            self.tcsr &= !flag;
            self.flags_seen &= !flag;
        }
    }
}
