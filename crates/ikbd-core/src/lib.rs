//! Core traits and types for the IKBD emulator.
//!
//! Two clocks matter here. The emulated HD6301 counts machine cycles
//! ([`Cycles`]); everything on the input side runs against a monotonic
//! microsecond [`Clock`].

mod bus;
mod clock;
mod cpu;
mod cycles;
mod observable;
mod settings;

pub use bus::{Bus, FlatBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cpu::Cpu;
pub use cycles::Cycles;
pub use observable::{Observable, Value};
pub use settings::SettingsStore;
