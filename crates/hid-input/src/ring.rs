//! Mounted HID interfaces, newest last.

use ringbuf::StaticRb;
use ringbuf::traits::{Consumer, Observer, RingBuffer};

pub const HID_INTERFACE_RING_CAPACITY: usize = 16;

/// One mounted interface: device address and interface instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidInterface {
    pub dev_addr: u8,
    pub instance: u8,
}

/// Bounded record of mounted interfaces. When full, a push evicts the
/// oldest entry.
pub struct HidInterfaceRing {
    entries: StaticRb<HidInterface, HID_INTERFACE_RING_CAPACITY>,
}

impl Default for HidInterfaceRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HidInterfaceRing {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: StaticRb::default(),
        }
    }

    pub fn push(&mut self, interface: HidInterface) {
        if let Some(evicted) = self.entries.push_overwrite(interface) {
            log::debug!(
                "HID interface ring full, dropped addr={} instance={}",
                evicted.dev_addr,
                evicted.instance
            );
        }
    }

    pub fn pop(&mut self) -> Option<HidInterface> {
        self.entries.try_pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.occupied_len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry `index` places after the oldest.
    #[must_use]
    pub fn peek(&self, index: usize) -> Option<HidInterface> {
        self.entries.iter().nth(index).copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(dev_addr: u8) -> HidInterface {
        HidInterface {
            dev_addr,
            instance: 0,
        }
    }

    #[test]
    fn fifo_order() {
        let mut ring = HidInterfaceRing::new();
        ring.push(iface(1));
        ring.push(iface(2));
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.peek(1), Some(iface(2)));
        assert_eq!(ring.pop(), Some(iface(1)));
        assert_eq!(ring.pop(), Some(iface(2)));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_evicts_oldest() {
        let mut ring = HidInterfaceRing::new();
        for addr in 0..20 {
            ring.push(iface(addr));
        }
        assert_eq!(ring.len(), HID_INTERFACE_RING_CAPACITY);
        assert_eq!(ring.peek(0), Some(iface(4)));
        assert_eq!(ring.peek(15), Some(iface(19)));
        assert_eq!(ring.peek(16), None);
    }
}
