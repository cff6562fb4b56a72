//! Atari ST keyboard scancodes (make codes; break is make | 0x80).

pub const ESC: u8 = 0x01;
pub const DIGIT_1: u8 = 0x02;
pub const DIGIT_0: u8 = 0x0B;
pub const MINUS: u8 = 0x0C;
pub const EQUAL: u8 = 0x0D;
pub const BACKSPACE: u8 = 0x0E;
pub const TAB: u8 = 0x0F;
pub const Q: u8 = 0x10;
pub const W: u8 = 0x11;
pub const E: u8 = 0x12;
pub const R: u8 = 0x13;
pub const T: u8 = 0x14;
pub const Y: u8 = 0x15;
pub const U: u8 = 0x16;
pub const I: u8 = 0x17;
pub const O: u8 = 0x18;
pub const P: u8 = 0x19;
pub const BRACKET_LEFT: u8 = 0x1A;
pub const BRACKET_RIGHT: u8 = 0x1B;
pub const RETURN: u8 = 0x1C;
pub const CTRL: u8 = 0x1D;
pub const A: u8 = 0x1E;
pub const S: u8 = 0x1F;
pub const D: u8 = 0x20;
pub const F: u8 = 0x21;
pub const G: u8 = 0x22;
pub const H: u8 = 0x23;
pub const J: u8 = 0x24;
pub const K: u8 = 0x25;
pub const L: u8 = 0x26;
pub const SEMICOLON: u8 = 0x27;
pub const QUOTE: u8 = 0x28;
pub const GRAVE: u8 = 0x29;
pub const LSHIFT: u8 = 0x2A;
pub const BACKSLASH: u8 = 0x2B;
pub const Z: u8 = 0x2C;
pub const X: u8 = 0x2D;
pub const C: u8 = 0x2E;
pub const V: u8 = 0x2F;
pub const B: u8 = 0x30;
pub const N: u8 = 0x31;
pub const M: u8 = 0x32;
pub const COMMA: u8 = 0x33;
pub const PERIOD: u8 = 0x34;
pub const SLASH: u8 = 0x35;
pub const RSHIFT: u8 = 0x36;
pub const ALT: u8 = 0x38;
pub const SPACE: u8 = 0x39;
pub const CAPS_LOCK: u8 = 0x3A;
pub const F1: u8 = 0x3B;
pub const F10: u8 = 0x44;
pub const CLR_HOME: u8 = 0x47;
pub const UP: u8 = 0x48;
pub const KP_MINUS: u8 = 0x4A;
pub const LEFT: u8 = 0x4B;
pub const RIGHT: u8 = 0x4D;
pub const KP_PLUS: u8 = 0x4E;
pub const DOWN: u8 = 0x50;
pub const INSERT: u8 = 0x52;
pub const DELETE: u8 = 0x53;
/// The extra key left of Z on ISO keyboards.
pub const ISO: u8 = 0x60;
pub const UNDO: u8 = 0x61;
pub const HELP: u8 = 0x62;
pub const KP_PAREN_LEFT: u8 = 0x63;
pub const KP_PAREN_RIGHT: u8 = 0x64;
pub const KP_SLASH: u8 = 0x65;
pub const KP_STAR: u8 = 0x66;
pub const KP_7: u8 = 0x67;
pub const KP_8: u8 = 0x68;
pub const KP_9: u8 = 0x69;
pub const KP_4: u8 = 0x6A;
pub const KP_5: u8 = 0x6B;
pub const KP_6: u8 = 0x6C;
pub const KP_1: u8 = 0x6D;
pub const KP_2: u8 = 0x6E;
pub const KP_3: u8 = 0x6F;
pub const KP_0: u8 = 0x70;
pub const KP_PERIOD: u8 = 0x71;
pub const KP_ENTER: u8 = 0x72;

/// Highest scancode the keyboard can produce.
pub const MAX: u8 = 0x72;
