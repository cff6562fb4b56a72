//! Serial link to the Atari ST.
//!
//! Received bytes are pushed from the UART interrupt into a 256-slot ring
//! and drained by the cooperative loop. Transmission is one byte at a time
//! and blocks until the transmitter is empty; the HD6301 paces its own
//! output so nothing is buffered on that side.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Receive ring size.
pub const RX_BUFFER_SIZE: usize = 256;

/// IKBD line rate. The real divider gives 7812.5 baud.
pub const IKBD_BAUD: u32 = 7812;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    pub fifo: bool,
}

impl Default for UartConfig {
    /// 7812 baud, 8N1, FIFOs off.
    fn default() -> Self {
        Self {
            baud: IKBD_BAUD,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            fifo: false,
        }
    }
}

impl UartConfig {
    /// Microseconds to shift one frame (start + data + parity + stop).
    #[must_use]
    pub fn frame_us(&self) -> u64 {
        let parity = u32::from(self.parity != Parity::None);
        let bits = 1 + u32::from(self.data_bits) + parity + u32::from(self.stop_bits);
        u64::from(bits) * 1_000_000 / u64::from(self.baud.max(1))
    }
}

/// The receive side of a UART peripheral.
pub trait Uart {
    fn configure(&mut self, config: &UartConfig);

    fn set_rx_interrupt(&mut self, enabled: bool);

    /// Next byte from the receive register, if one is waiting.
    fn read_byte(&mut self) -> Option<u8>;
}

/// A UART fed from an in-process channel, for hosts without serial
/// hardware. Each byte sent on the channel arrives as a received byte.
pub struct ChannelUart {
    incoming: mpsc::Receiver<u8>,
    config: Option<UartConfig>,
    rx_interrupt: bool,
}

impl ChannelUart {
    #[must_use]
    pub fn new() -> (Self, mpsc::Sender<u8>) {
        let (tx, incoming) = mpsc::channel();
        (
            Self {
                incoming,
                config: None,
                rx_interrupt: false,
            },
            tx,
        )
    }

    #[must_use]
    pub fn config(&self) -> Option<&UartConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub fn rx_interrupt_enabled(&self) -> bool {
        self.rx_interrupt
    }
}

impl Uart for ChannelUart {
    fn configure(&mut self, config: &UartConfig) {
        self.config = Some(*config);
    }

    fn set_rx_interrupt(&mut self, enabled: bool) {
        self.rx_interrupt = enabled;
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.incoming.try_recv().ok()
    }
}

/// The interrupt-context half of the serial port.
pub struct SerialPort<U> {
    uart: U,
    config: UartConfig,
    rx: HeapProd<u8>,
    dropped: Arc<AtomicUsize>,
    open: bool,
}

impl<U: Uart> SerialPort<U> {
    /// Build the port and the consumer half of its receive ring.
    #[must_use]
    pub fn new(uart: U, config: UartConfig) -> (Self, RxBuffer) {
        let (rx, cons) = HeapRb::<u8>::new(RX_BUFFER_SIZE).split();
        let dropped = Arc::new(AtomicUsize::new(0));
        (
            Self {
                uart,
                config,
                rx,
                dropped: Arc::clone(&dropped),
                open: false,
            },
            RxBuffer { rx: cons, dropped },
        )
    }

    /// Configure the UART and enable the receive interrupt.
    pub fn open(&mut self) {
        self.uart.configure(&self.config);
        self.uart.set_rx_interrupt(true);
        self.open = true;
        log::info!(
            "Serial port open: {} baud, {}{}{}",
            self.config.baud,
            self.config.data_bits,
            match self.config.parity {
                Parity::None => 'N',
                Parity::Even => 'E',
                Parity::Odd => 'O',
            },
            self.config.stop_bits
        );
    }

    pub fn close(&mut self) {
        self.uart.set_rx_interrupt(false);
        self.open = false;
        log::info!("Serial port closed");
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    #[must_use]
    pub fn uart(&self) -> &U {
        &self.uart
    }

    /// Drain the UART into the ring. Bytes that find the ring full are
    /// dropped.
    pub fn on_rx_interrupt(&mut self) {
        if !self.open {
            return;
        }
        while let Some(byte) = self.uart.read_byte() {
            if self.rx.try_push(byte).is_err() {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::trace!("RX buffer full, dropped {byte:#04X} ({dropped} total)");
            }
        }
    }
}

/// The consumer half of the receive ring.
pub struct RxBuffer {
    rx: HeapCons<u8>,
    dropped: Arc<AtomicUsize>,
}

impl RxBuffer {
    /// Bytes waiting.
    #[must_use]
    pub fn rx_available(&self) -> usize {
        self.rx.occupied_len()
    }

    pub fn rx_buffer_get(&mut self) -> Option<u8> {
        self.rx.try_pop()
    }

    /// Bytes lost to a full ring since start-up.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Where the HD6301's transmitted bytes go.
pub trait SerialTx {
    /// Wait for the transmitter to empty, then send `byte`.
    fn send_blocking(&mut self, byte: u8);
}

impl SerialTx for Vec<u8> {
    fn send_blocking(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl SerialTx for mpsc::Sender<u8> {
    fn send_blocking(&mut self, byte: u8) {
        if self.send(byte).is_err() {
            log::warn!("TX receiver gone, dropped {byte:#04X}");
        }
    }
}

impl<T: SerialTx + ?Sized> SerialTx for Box<T> {
    fn send_blocking(&mut self, byte: u8) {
        (**self).send_blocking(byte);
    }
}

/// The transmit side of a UART peripheral.
pub trait TxLine {
    /// The transmit holding register can take a byte.
    fn is_writable(&mut self) -> bool;

    fn write(&mut self, byte: u8);
}

/// Busy-waits on a [`TxLine`] before each write.
pub struct BlockingTx<L> {
    line: L,
}

impl<L: TxLine> BlockingTx<L> {
    #[must_use]
    pub fn new(line: L) -> Self {
        Self { line }
    }

    #[must_use]
    pub fn into_inner(self) -> L {
        self.line
    }
}

impl<L: TxLine> SerialTx for BlockingTx<L> {
    fn send_blocking(&mut self, byte: u8) {
        while !self.line.is_writable() {
            std::hint::spin_loop();
        }
        self.line.write(byte);
    }
}
