//! Keyboard matrix: which scancode sits at each column/row crossing.
//!
//! The HD6301 drives one of 15 column lines low and reads the 8 row lines
//! on port 1. A row reads low when the key at the crossing is down.
//!
//! The ROM turns a crossing into a scancode through its own table, so the
//! only wiring that reproduces the ROM's output is the inverse of that
//! table. [`KeyMatrix::learn`] recovers it by holding each crossing in
//! turn on a scratch HD6301 and recording the make code the ROM sends.

use atari_st_keyboard::{KeyStateTable, scancode};
use hitachi_hd6301::{Hd6301, MemoryError, Port, PortHooks, PortLatches};

pub const COLUMNS: usize = 15;
pub const ROWS: usize = 8;

/// Cycles the ROM gets to finish its power-up work before the sweep.
pub const SETTLE_CYCLES: u64 = 500_000;

/// Cycles to wait for a make (or break) code after a crossing changes.
/// Several keyboard scans at the ROM's scan rate.
pub const HOLD_CYCLES: u64 = 100_000;

const SWEEP_BATCH: u64 = 1_000;

/// Bit set in a break code.
const BREAK: u8 = 0x80;

/// Column select lines driven low, as a 15-bit mask: port 3 bits 1..7 are
/// columns 0..6 and port 4 bits 0..7 are columns 7..14.
#[must_use]
pub fn selected_columns(port3_low: u8, port4_low: u8) -> u16 {
    u16::from(port3_low >> 1) | (u16::from(port4_low) << 7)
}

fn is_make_code(byte: u8) -> bool {
    (1..=scancode::MAX).contains(&byte)
}

/// Scancode at each `(column, row)`, 0 for an empty crossing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatrix {
    codes: [[u8; ROWS]; COLUMNS],
}

impl Default for KeyMatrix {
    fn default() -> Self {
        Self::column_major()
    }
}

impl KeyMatrix {
    /// Scancodes laid out column-major from 0x01: column `c` row `r` holds
    /// `c * 8 + r + 1`. Used when no ROM table is available, such as with
    /// test programs that read the rows directly.
    #[must_use]
    pub const fn column_major() -> Self {
        let mut codes = [[0; ROWS]; COLUMNS];
        let mut col = 0;
        while col < COLUMNS {
            let mut row = 0;
            while row < ROWS {
                let code = col * ROWS + row + 1;
                if code <= scancode::MAX as usize {
                    codes[col][row] = code as u8;
                }
                row += 1;
            }
            col += 1;
        }
        Self { codes }
    }

    #[must_use]
    pub const fn from_codes(codes: [[u8; ROWS]; COLUMNS]) -> Self {
        Self { codes }
    }

    /// The matrix `rom` scans: every crossing the ROM reports, with the
    /// scancode it reports for it.
    pub fn learn(rom: &[u8]) -> Result<Self, MemoryError> {
        Self::sweep(rom, SETTLE_CYCLES, HOLD_CYCLES)
    }

    /// [`learn`](Self::learn) with explicit cycle budgets.
    pub fn sweep(rom: &[u8], settle: u64, hold: u64) -> Result<Self, MemoryError> {
        let mut mcu = Hd6301::new(SweepHooks::default())?;
        mcu.load_rom(rom)?;
        mcu.reset();
        wait_for(&mut mcu, settle, |_| false);

        let mut codes = [[0; ROWS]; COLUMNS];
        for (col, column) in codes.iter_mut().enumerate() {
            for (row, slot) in column.iter_mut().enumerate() {
                mcu.hooks_mut().crossing = Some((col, row));
                let make = wait_for(&mut mcu, hold, is_make_code);
                mcu.hooks_mut().crossing = None;
                let Some(code) = make else {
                    continue;
                };
                log::trace!("Matrix column {col} row {row}: {code:#04X}");
                *slot = code;
                wait_for(&mut mcu, hold, |b| b == code | BREAK);
            }
        }
        let matrix = Self { codes };
        log::debug!("Keyboard matrix sweep found {} keys", matrix.assigned());
        Ok(matrix)
    }

    #[must_use]
    pub fn code(&self, column: usize, row: usize) -> u8 {
        self.codes
            .get(column)
            .and_then(|c| c.get(row))
            .copied()
            .unwrap_or(0)
    }

    /// Crossings that carry a key.
    #[must_use]
    pub fn assigned(&self) -> usize {
        self.codes.iter().flatten().filter(|&&c| c != 0).count()
    }

    /// Column and row of `code`, if it is on the matrix.
    #[must_use]
    pub fn position(&self, code: u8) -> Option<(usize, usize)> {
        if code == 0 {
            return None;
        }
        self.codes.iter().enumerate().find_map(|(col, rows)| {
            rows.iter().position(|&c| c == code).map(|row| (col, row))
        })
    }

    /// Port 1 level for the selected columns: a row bit is 0 when any key
    /// down in a selected column sits on that row.
    #[must_use]
    pub fn scan_rows(&self, keys: &KeyStateTable, columns: u16) -> u8 {
        let mut rows = 0u8;
        for (col, codes) in self.codes.iter().enumerate() {
            if columns & (1 << col) == 0 {
                continue;
            }
            for (row, &code) in codes.iter().enumerate() {
                if code != 0 && keys.is_down(code) {
                    rows |= 1 << row;
                }
            }
        }
        !rows
    }
}

/// Pins of the scratch chip: one crossing closed, everything else idle.
#[derive(Default)]
struct SweepHooks {
    crossing: Option<(usize, usize)>,
    sent: Vec<u8>,
}

impl PortHooks for SweepHooks {
    fn read_port(&mut self, port: Port, latches: &PortLatches) -> u8 {
        let Some((col, row)) = self.crossing else {
            return 0xFF;
        };
        if port != Port::P1 {
            return 0xFF;
        }
        let columns = selected_columns(latches.driven_low(Port::P3), latches.driven_low(Port::P4));
        if columns & (1 << col) == 0 {
            0xFF
        } else {
            !(1u8 << row)
        }
    }

    fn transmit(&mut self, byte: u8) {
        self.sent.push(byte);
    }
}

/// Run up to `budget` cycles until the ROM sends a byte matching `wanted`.
/// Everything sent meanwhile is discarded.
fn wait_for(
    mcu: &mut Hd6301<SweepHooks>,
    budget: u64,
    wanted: impl Fn(u8) -> bool,
) -> Option<u8> {
    let mut run = 0;
    while run < budget {
        mcu.tx_empty(true);
        run += mcu.run_clocks(SWEEP_BATCH).get();
        let found = mcu.hooks().sent.iter().copied().find(|&b| wanted(b));
        mcu.hooks_mut().sent.clear();
        if found.is_some() {
            return found;
        }
    }
    None
}
