//! The HD6301V1 address space as seen by the IKBD.
//!
//! One block holds the low page (on-chip registers at 0x00-0x1F, internal
//! RAM at 0x80-0xFF) followed by the 4 KiB mask ROM, which the CPU sees at
//! 0xF000-0xFFFF. Nothing else is decoded in single-chip mode.

use thiserror::Error;

/// Size of the low page: registers plus internal RAM.
pub const LOW_PAGE_SIZE: usize = 0x100;

/// Size of the mask ROM.
pub const ROM_SIZE: usize = 0x1000;

/// Offset of the ROM image inside the block.
pub const ROM_BASE: usize = LOW_PAGE_SIZE;

/// CPU address of the first ROM byte.
pub const ROM_START: u16 = 0xF000;

/// First byte of on-chip RAM.
pub const RAM_START: u16 = 0x0080;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("cannot allocate {bytes} bytes of HD6301 memory")]
    Allocation { bytes: usize },
    #[error("ROM image is {len} bytes; the HD6301V1 holds {ROM_SIZE}")]
    RomTooLarge { len: usize },
}

/// Emulated memory block.
pub struct Memory {
    block: Vec<u8>,
}

impl Memory {
    /// Allocate the block once. Failure is the one unrecoverable error in
    /// the emulator: without memory the CPU cannot run.
    pub fn new() -> Result<Self, MemoryError> {
        let bytes = LOW_PAGE_SIZE + ROM_SIZE;
        let mut block = Vec::new();
        block
            .try_reserve_exact(bytes)
            .map_err(|_| MemoryError::Allocation { bytes })?;
        block.resize(bytes, 0);
        Ok(Self { block })
    }

    /// Copy a ROM image in at the ROM base. Shorter images leave the tail
    /// zeroed.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<(), MemoryError> {
        if image.len() > ROM_SIZE {
            return Err(MemoryError::RomTooLarge { len: image.len() });
        }
        let rom = &mut self.block[ROM_BASE..ROM_BASE + ROM_SIZE];
        rom.fill(0);
        rom[..image.len()].copy_from_slice(image);
        Ok(())
    }

    fn offset(address: u16) -> Option<usize> {
        if usize::from(address) < LOW_PAGE_SIZE {
            Some(usize::from(address))
        } else if address >= ROM_START {
            Some(ROM_BASE + usize::from(address - ROM_START))
        } else {
            None
        }
    }

    /// Read a byte. Undecoded addresses float high.
    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        Self::offset(address).map_or(0xFF, |i| self.block[i])
    }

    /// Write a byte. ROM and undecoded addresses ignore writes.
    pub fn write(&mut self, address: u16, value: u8) {
        if usize::from(address) < LOW_PAGE_SIZE {
            self.block[usize::from(address)] = value;
        }
    }

    /// The ROM image as loaded.
    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.block[ROM_BASE..]
    }
}
