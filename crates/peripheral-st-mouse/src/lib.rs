//! Atari ST quadrature mouse emulator.
//!
//! An ST mouse is two mechanical encoders producing two-phase square
//! waves. Here each axis is a 32-bit register holding the repeating
//! pattern `0011`; rotating it by one bit is one encoder edge and the IKBD
//! samples the low two bits. HID mice report deltas, so a delta becomes a
//! rotation *rate*: bigger deltas mean shorter periods between rotations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ikbd_core::Clock;
use rand::Rng;

/// Two-phase pattern loaded into each axis register.
pub const MOUSE_MASK: u32 = 0x3333_3333;

/// Speed constant: period (µs) = `MAX_SPEED / |speed|`.
pub const MAX_SPEED: f64 = 150_000.0;

/// Shortest period between edges (fastest emulated movement).
pub const MIN_PERIOD_US: i32 = 650;

/// Post-gain speeds within ±this are treated as zero.
pub const DEADZONE_SPEED: i32 = 1;

/// Periods longer than this stop the axis.
pub const STOP_IF_PERIOD_US: i32 = 100_000;

/// With no new input for this long both axes stop.
pub const IDLE_TIMEOUT_US: u64 = 80_000;

/// Gain per sensitivity level 0..=9.
pub const GAIN: [f32; 10] = [1.0, 1.3, 1.6, 1.9, 2.2, 2.5, 3.0, 3.2, 3.6, 4.0];

pub const MAX_SENSITIVITY: u8 = 9;

/// Anything that accepts a commanded mouse speed.
pub trait SpeedSink {
    fn set_speed(&mut self, x: i32, y: i32);
}

/// The two quadrature registers, shared with the CPU context.
///
/// Written only by [`MouseEmulator::update`]; read by the IKBD port hook.
#[derive(Debug)]
pub struct QuadratureRegisters {
    x: AtomicU32,
    y: AtomicU32,
}

impl QuadratureRegisters {
    #[must_use]
    pub fn new() -> Self {
        Self {
            x: AtomicU32::new(MOUSE_MASK),
            y: AtomicU32::new(MOUSE_MASK),
        }
    }

    /// Current X and Y registers. The IKBD uses the low two bits of each.
    #[must_use]
    pub fn tick(&self) -> (u32, u32) {
        (self.x.load(Ordering::Relaxed), self.y.load(Ordering::Relaxed))
    }

    fn store(&self, x: u32, y: u32) {
        self.x.store(x, Ordering::Relaxed);
        self.y.store(y, Ordering::Relaxed);
    }
}

impl Default for QuadratureRegisters {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale by the sensitivity gain, truncating toward zero.
#[must_use]
pub fn apply_gain(value: i32, level: u8) -> i32 {
    let gain = GAIN[usize::from(level.min(MAX_SENSITIVITY))];
    (value as f32 * gain) as i32
}

#[must_use]
pub fn with_deadzone(value: i32) -> i32 {
    if (-DEADZONE_SPEED..=DEADZONE_SPEED).contains(&value) {
        0
    } else {
        value
    }
}

/// Signed period in µs for a gained speed; 0 means stopped.
#[must_use]
pub fn speed_to_period(speed: i32) -> i32 {
    if speed == 0 {
        return 0;
    }
    let magnitude = (MAX_SPEED / f64::from(speed.unsigned_abs())) as i32;
    let period = magnitude.max(MIN_PERIOD_US);
    if period > STOP_IF_PERIOD_US {
        return 0;
    }
    if speed > 0 { period } else { -period }
}

/// Per-axis schedule.
#[derive(Debug, Clone, Copy, Default)]
struct Axis {
    period_us: i32,
    last_advance_us: u64,
}

impl Axis {
    /// Rotate `reg` if a period has elapsed. Returns the new register.
    fn advance(&mut self, reg: u32, now: u64) -> u32 {
        if self.period_us == 0 {
            self.last_advance_us = now;
            return reg;
        }
        let step = u64::from(self.period_us.unsigned_abs());
        if now.saturating_sub(self.last_advance_us) < step {
            return reg;
        }
        self.last_advance_us = now;
        if self.period_us > 0 {
            reg.rotate_left(1)
        } else {
            reg.rotate_right(1)
        }
    }
}

/// Converts commanded speeds into rotating quadrature registers.
pub struct MouseEmulator<C: Clock> {
    clock: C,
    registers: Arc<QuadratureRegisters>,
    x_reg: u32,
    y_reg: u32,
    x: Axis,
    y: Axis,
    last_input_us: u64,
    sensitivity: u8,
}

impl<C: Clock> MouseEmulator<C> {
    /// Create the emulator with a random starting phase on each axis.
    pub fn new(clock: C, rng: &mut impl Rng) -> Self {
        let x_reg = MOUSE_MASK.rotate_left(rng.random_range(0..16));
        let y_reg = MOUSE_MASK.rotate_left(rng.random_range(0..16));
        let now = clock.now_us();
        let registers = Arc::new(QuadratureRegisters::new());
        registers.store(x_reg, y_reg);
        Self {
            clock,
            registers,
            x_reg,
            y_reg,
            x: Axis {
                period_us: 0,
                last_advance_us: now,
            },
            y: Axis {
                period_us: 0,
                last_advance_us: now,
            },
            last_input_us: now,
            sensitivity: MAX_SENSITIVITY,
        }
    }

    /// Handle for the CPU context to sample the registers.
    #[must_use]
    pub fn registers(&self) -> Arc<QuadratureRegisters> {
        Arc::clone(&self.registers)
    }

    /// Set the gain level, clamped to 0..=9.
    pub fn set_sensitivity(&mut self, level: i32) {
        self.sensitivity = u8::try_from(level.clamp(0, i32::from(MAX_SENSITIVITY)))
            .unwrap_or(MAX_SENSITIVITY);
        log::debug!("Mouse sensitivity {}", self.sensitivity);
    }

    #[must_use]
    pub fn sensitivity(&self) -> u8 {
        self.sensitivity
    }

    /// Current signed periods (µs) for X and Y; 0 means stopped.
    #[must_use]
    pub fn periods(&self) -> (i32, i32) {
        (self.x.period_us, self.y.period_us)
    }

    /// Command a new speed from a HID delta.
    pub fn set_speed(&mut self, x: i32, y: i32) {
        let x = with_deadzone(apply_gain(x, self.sensitivity));
        let y = with_deadzone(apply_gain(y, self.sensitivity));
        self.x.period_us = speed_to_period(x);
        self.y.period_us = speed_to_period(y);
        self.last_input_us = self.clock.now_us();
        log::trace!(
            "Mouse speed ({x}, {y}) -> periods ({}, {}) us",
            self.x.period_us,
            self.y.period_us
        );
    }

    /// Advance each axis whose period has elapsed. Call far more often
    /// than the shortest period.
    pub fn update(&mut self) {
        let now = self.clock.now_us();
        if now.saturating_sub(self.last_input_us) > IDLE_TIMEOUT_US {
            self.x.period_us = 0;
            self.y.period_us = 0;
        }
        let x_reg = self.x.advance(self.x_reg, now);
        let y_reg = self.y.advance(self.y_reg, now);
        if x_reg != self.x_reg || y_reg != self.y_reg {
            self.x_reg = x_reg;
            self.y_reg = y_reg;
            self.registers.store(x_reg, y_reg);
        }
    }

    /// Current X and Y registers.
    #[must_use]
    pub fn tick(&self) -> (u32, u32) {
        (self.x_reg, self.y_reg)
    }
}

impl<C: Clock> SpeedSink for MouseEmulator<C> {
    fn set_speed(&mut self, x: i32, y: i32) {
        MouseEmulator::set_speed(self, x, y);
    }
}
