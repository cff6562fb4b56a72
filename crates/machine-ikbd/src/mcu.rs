//! The CPU execution context.
//!
//! [`IkbdCore`] owns the HD6301 and runs it in fixed batches. Everything it
//! needs from the cooperative loop arrives through a [`CoreHandle`]: a
//! byte channel for serial input and two atomic flags.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use hitachi_hd6301::{Hd6301, MemoryError};
use ikbd_core::{Clock, Cycles};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use thiserror::Error;

use crate::ports::IkbdPorts;
use crate::serial::SerialTx;

/// Cycles run between checks for input and stop requests.
pub const CYCLES_PER_LOOP: u64 = 1000;

/// The HD6301 runs at 1 MHz: one cycle per microsecond.
pub const CYCLES_PER_US: u64 = 1;

/// Capacity of the byte channel into the core.
pub const INPUT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("HD6301 initialisation failed: {0}")]
    Memory(#[from] MemoryError),
}

/// The cooperative loop's side of the CPU context.
pub struct CoreHandle {
    input: HeapProd<u8>,
    sci_busy: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl CoreHandle {
    /// Queue a byte from the ST. Returns false if the channel is full.
    pub fn send(&mut self, byte: u8) -> bool {
        self.input.try_push(byte).is_ok()
    }

    /// The core's receiver is still full, or bytes are queued for it.
    #[must_use]
    pub fn sci_busy(&self) -> bool {
        self.sci_busy.load(Ordering::Acquire)
    }

    /// Ask the CPU context to stop after its current batch.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            log::info!("Stopping the HD6301 core");
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// A clone of the stop flag, for other threads.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

/// The HD6301 and its inbound byte channel.
pub struct IkbdCore<T: SerialTx> {
    mcu: Hd6301<IkbdPorts<T>>,
    input: HeapCons<u8>,
    sci_busy: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl<T: SerialTx> IkbdCore<T> {
    /// Allocate the chip, load `rom` and reset.
    pub fn new(ports: IkbdPorts<T>, rom: &[u8]) -> Result<(Self, CoreHandle), CoreError> {
        log::info!("Initialising HD6301...");
        let mut mcu = Hd6301::new(ports)?;
        mcu.load_rom(rom)?;
        log::info!("Resetting HD6301...");
        mcu.reset();

        let (prod, cons) = HeapRb::<u8>::new(INPUT_CHANNEL_SIZE).split();
        let sci_busy = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = CoreHandle {
            input: prod,
            sci_busy: Arc::clone(&sci_busy),
            stop: Arc::clone(&stop),
        };
        Ok((
            Self {
                mcu,
                input: cons,
                sci_busy,
                stop,
            },
            handle,
        ))
    }

    #[must_use]
    pub fn mcu(&self) -> &Hd6301<IkbdPorts<T>> {
        &self.mcu
    }

    pub fn mcu_mut(&mut self) -> &mut Hd6301<IkbdPorts<T>> {
        &mut self.mcu
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// One batch: mark the transmitter empty, run [`CYCLES_PER_LOOP`]
    /// cycles, then hand over a waiting byte if the receiver is free.
    pub fn run_batch(&mut self) -> Cycles {
        self.mcu.tx_empty(true);
        let cycles = self.mcu.run_clocks(CYCLES_PER_LOOP);
        let next = if self.mcu.sci_busy() {
            None
        } else {
            self.input.try_pop()
        };
        if let Some(byte) = next {
            log::trace!("ST -> 6301 {byte:#04X}");
            if !self.mcu.receive_byte(byte) {
                log::debug!("HD6301 receiver disabled, {byte:#04X} lost");
            }
        }
        let busy = self.mcu.sci_busy() || !self.input.is_empty();
        self.sci_busy.store(busy, Ordering::Release);
        cycles
    }

    /// Run batches as fast as possible until stopped.
    pub fn run(&mut self) {
        log::info!("Entering HD6301 core loop...");
        while !self.is_stopped() {
            self.run_batch();
        }
        log::info!("HD6301 core stopped after {} cycles", self.mcu.cycles().get());
    }

    /// Run batches until stopped, holding the chip to real time: after each
    /// batch, wait until `clock` has caught up with the cycles run.
    pub fn run_paced(&mut self, clock: &impl Clock, delay: &mut impl DelayNs) {
        log::info!("Entering HD6301 core loop (real time)...");
        let start = clock.now_us();
        let mut emulated_us = 0u64;
        while !self.is_stopped() {
            emulated_us += self.run_batch().get() / CYCLES_PER_US;
            let elapsed = clock.elapsed_since(start);
            if emulated_us > elapsed {
                delay.delay_us(u32::try_from(emulated_us - elapsed).unwrap_or(u32::MAX));
            }
        }
        log::info!("HD6301 core stopped after {} cycles", self.mcu.cycles().get());
    }
}
