//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The CPU reaches RAM, ROM and on-chip registers through this trait. The
/// implementor does the address decoding.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a big-endian word, high byte first.
    fn read_word(&mut self, address: u16) -> u16 {
        let hi = self.read(address);
        let lo = self.read(address.wrapping_add(1));
        u16::from_be_bytes([hi, lo])
    }

    /// Write a big-endian word, high byte first.
    fn write_word(&mut self, address: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.write(address, hi);
        self.write(address.wrapping_add(1), lo);
    }
}

/// A flat 64 KiB RAM bus with no decoding.
///
/// Used for instruction tests and for tooling that needs a CPU without a
/// machine around it.
pub struct FlatBus {
    memory: Box<[u8; 0x1_0000]>,
}

impl FlatBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x1_0000]),
        }
    }

    /// Copy `data` into memory starting at `address`, wrapping at the top.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.memory[usize::from(addr)] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FlatBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }
}
