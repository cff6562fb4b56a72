//! HID usage → ST scancode tables, one per keyboard layout.

use std::fmt;
use std::str::FromStr;

use crate::hid;
use crate::scancode as st;

/// Host keyboard layouts with their own translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    Us,
    Gb,
    De,
    Fr,
    It,
    Es,
}

impl Layout {
    pub const ALL: [Layout; 6] = [
        Layout::Us,
        Layout::Gb,
        Layout::De,
        Layout::Fr,
        Layout::It,
        Layout::Es,
    ];

    /// Parse a configured layout name ("us", "gb", ...), case-insensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|layout| layout.name().eq_ignore_ascii_case(name.trim()))
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Layout::Us => "us",
            Layout::Gb => "gb",
            Layout::De => "de",
            Layout::Fr => "fr",
            Layout::It => "it",
            Layout::Es => "es",
        }
    }

    const fn table(self) -> &'static [u8; 128] {
        match self {
            Layout::Us => &US,
            Layout::Gb => &GB,
            Layout::De => &DE,
            Layout::Fr => &FR,
            Layout::It => &IT,
            Layout::Es => &ES,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised layout name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLayout(pub String);

impl fmt::Display for UnknownLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown keyboard layout '{}'", self.0)
    }
}

impl std::error::Error for UnknownLayout {}

impl FromStr for Layout {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownLayout(s.to_string()))
    }
}

/// Positional mapping shared by every layout.
const BASE: &[(u8, u8)] = &[
    // Letters
    (0x04, st::A),
    (0x05, st::B),
    (0x06, st::C),
    (0x07, st::D),
    (0x08, st::E),
    (0x09, st::F),
    (0x0A, st::G),
    (0x0B, st::H),
    (0x0C, st::I),
    (0x0D, st::J),
    (0x0E, st::K),
    (0x0F, st::L),
    (0x10, st::M),
    (0x11, st::N),
    (0x12, st::O),
    (0x13, st::P),
    (0x14, st::Q),
    (0x15, st::R),
    (0x16, st::S),
    (0x17, st::T),
    (0x18, st::U),
    (0x19, st::V),
    (0x1A, st::W),
    (0x1B, st::X),
    (0x1C, st::Y),
    (0x1D, st::Z),
    // Digit row
    (0x1E, 0x02),
    (0x1F, 0x03),
    (0x20, 0x04),
    (0x21, 0x05),
    (0x22, 0x06),
    (0x23, 0x07),
    (0x24, 0x08),
    (0x25, 0x09),
    (0x26, 0x0A),
    (0x27, st::DIGIT_0),
    (hid::ENTER, st::RETURN),
    (hid::ESCAPE, st::ESC),
    (hid::BACKSPACE, st::BACKSPACE),
    (hid::TAB, st::TAB),
    (hid::SPACE, st::SPACE),
    (hid::MINUS, st::MINUS),
    (hid::EQUAL, st::EQUAL),
    (hid::BRACKET_LEFT, st::BRACKET_LEFT),
    (hid::BRACKET_RIGHT, st::BRACKET_RIGHT),
    (hid::BACKSLASH, st::BACKSLASH),
    (hid::NON_US_HASH, st::BACKSLASH),
    (hid::SEMICOLON, st::SEMICOLON),
    (hid::QUOTE, st::QUOTE),
    (hid::GRAVE, st::GRAVE),
    (hid::COMMA, st::COMMA),
    (hid::PERIOD, st::PERIOD),
    (hid::SLASH, st::SLASH),
    (hid::CAPS_LOCK, st::CAPS_LOCK),
    // F1-F10, then F11/F12 on Undo/Help
    (0x3A, 0x3B),
    (0x3B, 0x3C),
    (0x3C, 0x3D),
    (0x3D, 0x3E),
    (0x3E, 0x3F),
    (0x3F, 0x40),
    (0x40, 0x41),
    (0x41, 0x42),
    (0x42, 0x43),
    (0x43, st::F10),
    (0x44, st::UNDO),
    (hid::F12, st::HELP),
    // Editing and cursor block
    (hid::INSERT, st::INSERT),
    (hid::HOME, st::CLR_HOME),
    (hid::PAGE_UP, st::HELP),
    (hid::DELETE, st::DELETE),
    (hid::PAGE_DOWN, st::UNDO),
    (hid::RIGHT, st::RIGHT),
    (hid::LEFT, st::LEFT),
    (hid::DOWN, st::DOWN),
    (hid::UP, st::UP),
    // Keypad
    (hid::KP_SLASH, st::KP_SLASH),
    (hid::KP_STAR, st::KP_STAR),
    (hid::KP_MINUS, st::KP_MINUS),
    (hid::KP_PLUS, st::KP_PLUS),
    (hid::KP_ENTER, st::KP_ENTER),
    (0x59, st::KP_1),
    (0x5A, st::KP_2),
    (0x5B, st::KP_3),
    (0x5C, st::KP_4),
    (0x5D, st::KP_5),
    (0x5E, st::KP_6),
    (0x5F, st::KP_7),
    (0x60, st::KP_8),
    (0x61, st::KP_9),
    (hid::KP_0, st::KP_0),
    (hid::KP_PERIOD, st::KP_PERIOD),
    (hid::NON_US_BACKSLASH, st::ISO),
    // Num Lock and Scroll Lock sit where the ST has keypad parentheses.
    (hid::NUM_LOCK, st::KP_PAREN_LEFT),
    (hid::SCROLL_LOCK, st::KP_PAREN_RIGHT),
];

/// Continental ST keyboards put the key right of the main block (0x29)
/// beside Return, and the one left of 1 takes 0x2B.
const CONTINENTAL: &[(u8, u8)] = &[
    (hid::NON_US_HASH, st::GRAVE),
    (hid::GRAVE, st::BACKSLASH),
];

const fn build(overrides: &[(u8, u8)]) -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut i = 0;
    while i < BASE.len() {
        let (usage, code) = BASE[i];
        table[usage as usize] = code;
        i += 1;
    }
    let mut i = 0;
    while i < overrides.len() {
        let (usage, code) = overrides[i];
        table[usage as usize] = code;
        i += 1;
    }
    table
}

static US: [u8; 128] = build(&[]);
static GB: [u8; 128] = build(&[]);
static DE: [u8; 128] = build(CONTINENTAL);
static FR: [u8; 128] = build(CONTINENTAL);
static IT: [u8; 128] = build(CONTINENTAL);
static ES: [u8; 128] = build(CONTINENTAL);

/// Translate a non-modifier HID usage. Returns 0 for unmapped usages.
#[must_use]
pub fn lookup(layout: Layout, usage: u8) -> u8 {
    layout
        .table()
        .get(usize::from(usage))
        .copied()
        .unwrap_or(0)
}

/// Result of translating one HID usage, modifiers included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Translation {
    /// ST scancode, 0 when the usage has no ST key.
    pub scancode: u8,
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
}

/// Translate any HID usage, including the modifier usages 0xE0-0xE7,
/// which report which modifier they are.
#[must_use]
pub fn translate_hid(layout: Layout, usage: u8) -> Translation {
    let modifier = |scancode, shift, alt, ctrl| Translation {
        scancode,
        shift,
        alt,
        ctrl,
    };
    match usage {
        hid::LEFT_CTRL | hid::RIGHT_CTRL => modifier(st::CTRL, false, false, true),
        hid::LEFT_SHIFT => modifier(st::LSHIFT, true, false, false),
        hid::RIGHT_SHIFT => modifier(st::RSHIFT, true, false, false),
        hid::LEFT_ALT | hid::RIGHT_ALT => modifier(st::ALT, false, true, false),
        _ => Translation {
            scancode: lookup(layout, usage),
            ..Translation::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_positional_in_every_layout() {
        for layout in Layout::ALL {
            assert_eq!(lookup(layout, hid::A), st::A, "{layout}");
            assert_eq!(lookup(layout, hid::Z), st::Z, "{layout}");
            assert_eq!(lookup(layout, 0x1C), st::Y, "{layout}");
        }
    }

    #[test]
    fn continental_layouts_move_hash_key() {
        assert_eq!(lookup(Layout::Us, hid::NON_US_HASH), st::BACKSLASH);
        assert_eq!(lookup(Layout::De, hid::NON_US_HASH), st::GRAVE);
        assert_eq!(lookup(Layout::Es, hid::GRAVE), st::BACKSLASH);
    }

    #[test]
    fn function_and_cursor_keys() {
        assert_eq!(lookup(Layout::Us, hid::F1), st::F1);
        assert_eq!(lookup(Layout::Us, 0x43), st::F10);
        assert_eq!(lookup(Layout::Us, hid::UP), st::UP);
        assert_eq!(lookup(Layout::Us, hid::INSERT), st::INSERT);
        assert_eq!(lookup(Layout::Us, hid::HOME), st::CLR_HOME);
    }

    #[test]
    fn unmapped_and_out_of_range_usages_are_zero() {
        assert_eq!(lookup(Layout::Us, 0x00), 0);
        assert_eq!(lookup(Layout::Us, hid::PRINT_SCREEN), 0);
        assert_eq!(lookup(Layout::Us, 0xE1), 0);
    }

    #[test]
    fn translate_reports_modifiers() {
        let t = translate_hid(Layout::Gb, hid::RIGHT_SHIFT);
        assert_eq!(t.scancode, st::RSHIFT);
        assert!(t.shift && !t.alt && !t.ctrl);

        let t = translate_hid(Layout::Gb, hid::RIGHT_ALT);
        assert_eq!(t.scancode, st::ALT);
        assert!(t.alt);

        let t = translate_hid(Layout::Gb, hid::A);
        assert_eq!(t, Translation { scancode: st::A, ..Translation::default() });

        assert_eq!(translate_hid(Layout::Us, hid::LEFT_GUI).scancode, 0);
    }

    #[test]
    fn names_round_trip() {
        for layout in Layout::ALL {
            assert_eq!(layout.name().parse::<Layout>(), Ok(layout));
        }
        assert_eq!(Layout::from_name(" DE "), Some(Layout::De));
        assert!("xx".parse::<Layout>().is_err());
    }
}
