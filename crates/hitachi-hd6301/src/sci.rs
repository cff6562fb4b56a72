//! Serial communications interface.
//!
//! The IKBD talks to the ST through this at E/128, which with a 1 MHz E
//! clock is 7812.5 baud. A byte is ten bit times on the wire.

use crate::cpu::vectors;

/// TRCSR bits.
pub mod trcsr {
    /// Receive data register full.
    pub const RDRF: u8 = 0x80;
    /// Overrun or framing error.
    pub const ORFE: u8 = 0x40;
    /// Transmit data register empty.
    pub const TDRE: u8 = 0x20;
    pub const RIE: u8 = 0x10;
    pub const RE: u8 = 0x08;
    pub const TIE: u8 = 0x04;
    pub const TE: u8 = 0x02;
    pub const WU: u8 = 0x01;
    /// The status bits are read-only.
    pub const STATUS: u8 = RDRF | ORFE | TDRE;
}

use trcsr::{ORFE, RDRF, RE, RIE, STATUS, TDRE, TE, TIE};

/// Bits per frame: start, eight data, stop.
const FRAME_BITS: u32 = 10;

#[derive(Debug)]
pub struct Sci {
    rmcr: u8,
    trcsr: u8,
    rdr: u8,
    tdr: u8,
    /// TRCSR was read since the last RDR read; the next RDR read clears
    /// RDRF and ORFE.
    status_read: bool,
    /// Cycles until the byte in the shifter has left.
    tx_countdown: u32,
    overruns: u64,
}

impl Default for Sci {
    fn default() -> Self {
        Self::new()
    }
}

impl Sci {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rmcr: 0,
            trcsr: TDRE,
            rdr: 0,
            tdr: 0,
            status_read: false,
            tx_countdown: 0,
            overruns: 0,
        }
    }

    pub fn reset(&mut self) {
        let overruns = self.overruns;
        *self = Self::new();
        self.overruns = overruns;
    }

    /// E-clock cycles per bit for the RMCR speed select.
    #[must_use]
    pub fn bit_cycles(&self) -> u32 {
        match self.rmcr & 0x03 {
            0 => 16,
            1 => 128,
            2 => 1024,
            _ => 4096,
        }
    }

    #[must_use]
    pub fn byte_cycles(&self) -> u32 {
        FRAME_BITS * self.bit_cycles()
    }

    /// A byte arrives on the RX pin. Returns false when it was lost:
    /// receiver disabled, or the previous byte not yet read (overrun).
    pub fn receive(&mut self, byte: u8) -> bool {
        if self.trcsr & RE == 0 {
            log::trace!("SCI: receiver disabled, dropping {byte:#04X}");
            return false;
        }
        if self.trcsr & RDRF != 0 {
            self.trcsr |= ORFE;
            self.overruns += 1;
            log::debug!("SCI: overrun, dropping {byte:#04X}");
            return false;
        }
        self.rdr = byte;
        self.trcsr |= RDRF;
        true
    }

    /// The receiver still holds an unread byte.
    #[must_use]
    pub fn busy(&self) -> bool {
        self.trcsr & RDRF != 0
    }

    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Force the transmit-empty flag, as the host loop does between batches.
    pub fn set_tx_empty(&mut self, empty: bool) {
        if empty {
            self.trcsr |= TDRE;
            self.tx_countdown = 0;
        } else {
            self.trcsr &= !TDRE;
        }
    }

    pub fn tick(&mut self, cycles: u64) {
        if self.tx_countdown == 0 {
            return;
        }
        let step = u32::try_from(cycles).unwrap_or(u32::MAX);
        self.tx_countdown = self.tx_countdown.saturating_sub(step);
        if self.tx_countdown == 0 {
            self.trcsr |= TDRE;
        }
    }

    #[must_use]
    pub fn pending_vector(&self) -> Option<u16> {
        let t = self.trcsr;
        let rx = t & (RDRF | ORFE) != 0 && t & RIE != 0;
        let tx = t & TDRE != 0 && t & TIE != 0;
        (rx || tx).then_some(vectors::SCI)
    }

    #[must_use]
    pub fn read_rmcr(&self) -> u8 {
        self.rmcr
    }

    pub fn write_rmcr(&mut self, value: u8) {
        self.rmcr = value & 0x0F;
    }

    pub fn read_trcsr(&mut self) -> u8 {
        self.status_read = true;
        self.trcsr
    }

    pub fn write_trcsr(&mut self, value: u8) {
        self.trcsr = (self.trcsr & STATUS) | (value & !STATUS);
    }

    pub fn read_rdr(&mut self) -> u8 {
        if self.status_read {
            self.trcsr &= !(RDRF | ORFE);
            self.status_read = false;
        }
        self.rdr
    }

    #[must_use]
    pub fn read_tdr(&self) -> u8 {
        self.tdr
    }

    /// Load TDR. With the transmitter enabled the byte goes straight out
    /// and is returned for the wire.
    pub fn write_tdr(&mut self, value: u8) -> Option<u8> {
        self.tdr = value;
        if self.trcsr & TE == 0 {
            return None;
        }
        self.trcsr &= !TDRE;
        self.tx_countdown = self.byte_cycles();
        Some(value)
    }
}
