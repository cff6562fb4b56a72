//! HID keyboard usages (usage page 0x07) and boot-report modifier bits.

/// Modifier byte bits of a boot-protocol keyboard report.
pub mod modifier {
    pub const LEFT_CTRL: u8 = 0x01;
    pub const LEFT_SHIFT: u8 = 0x02;
    pub const LEFT_ALT: u8 = 0x04;
    pub const LEFT_GUI: u8 = 0x08;
    pub const RIGHT_CTRL: u8 = 0x10;
    pub const RIGHT_SHIFT: u8 = 0x20;
    pub const RIGHT_ALT: u8 = 0x40;
    pub const RIGHT_GUI: u8 = 0x80;

    pub const CTRL: u8 = LEFT_CTRL | RIGHT_CTRL;
    pub const SHIFT: u8 = LEFT_SHIFT | RIGHT_SHIFT;
    pub const ALT: u8 = LEFT_ALT | RIGHT_ALT;
}

pub const A: u8 = 0x04;
pub const Z: u8 = 0x1D;
pub const DIGIT_1: u8 = 0x1E;
pub const DIGIT_0: u8 = 0x27;
pub const ENTER: u8 = 0x28;
pub const ESCAPE: u8 = 0x29;
pub const BACKSPACE: u8 = 0x2A;
pub const TAB: u8 = 0x2B;
pub const SPACE: u8 = 0x2C;
pub const MINUS: u8 = 0x2D;
pub const EQUAL: u8 = 0x2E;
pub const BRACKET_LEFT: u8 = 0x2F;
pub const BRACKET_RIGHT: u8 = 0x30;
pub const BACKSLASH: u8 = 0x31;
pub const NON_US_HASH: u8 = 0x32;
pub const SEMICOLON: u8 = 0x33;
pub const QUOTE: u8 = 0x34;
pub const GRAVE: u8 = 0x35;
pub const COMMA: u8 = 0x36;
pub const PERIOD: u8 = 0x37;
pub const SLASH: u8 = 0x38;
pub const CAPS_LOCK: u8 = 0x39;
pub const F1: u8 = 0x3A;
pub const F12: u8 = 0x45;
pub const PRINT_SCREEN: u8 = 0x46;
pub const SCROLL_LOCK: u8 = 0x47;
pub const PAUSE: u8 = 0x48;
pub const INSERT: u8 = 0x49;
pub const HOME: u8 = 0x4A;
pub const PAGE_UP: u8 = 0x4B;
pub const DELETE: u8 = 0x4C;
pub const END: u8 = 0x4D;
pub const PAGE_DOWN: u8 = 0x4E;
pub const RIGHT: u8 = 0x4F;
pub const LEFT: u8 = 0x50;
pub const DOWN: u8 = 0x51;
pub const UP: u8 = 0x52;
pub const NUM_LOCK: u8 = 0x53;
pub const KP_SLASH: u8 = 0x54;
pub const KP_STAR: u8 = 0x55;
pub const KP_MINUS: u8 = 0x56;
pub const KP_PLUS: u8 = 0x57;
pub const KP_ENTER: u8 = 0x58;
pub const KP_1: u8 = 0x59;
pub const KP_0: u8 = 0x62;
pub const KP_PERIOD: u8 = 0x63;
pub const NON_US_BACKSLASH: u8 = 0x64;
pub const APPLICATION: u8 = 0x65;

pub const LEFT_CTRL: u8 = 0xE0;
pub const LEFT_SHIFT: u8 = 0xE1;
pub const LEFT_ALT: u8 = 0xE2;
pub const LEFT_GUI: u8 = 0xE3;
pub const RIGHT_CTRL: u8 = 0xE4;
pub const RIGHT_SHIFT: u8 = 0xE5;
pub const RIGHT_ALT: u8 = 0xE6;
pub const RIGHT_GUI: u8 = 0xE7;

const FUNCTION_KEYS: [&str; 12] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

/// Name of a non-printing key, for logs.
#[must_use]
pub fn usage_name(usage: u8) -> Option<&'static str> {
    let name = match usage {
        ENTER => "Enter",
        ESCAPE => "Escape",
        BACKSPACE => "Backspace",
        TAB => "Tab",
        SPACE => "Space",
        CAPS_LOCK => "CapsLock",
        F1..=F12 => FUNCTION_KEYS[usize::from(usage - F1)],
        PRINT_SCREEN => "PrintScreen",
        SCROLL_LOCK => "ScrollLock",
        PAUSE => "Pause",
        INSERT => "Insert",
        HOME => "Home",
        PAGE_UP => "PageUp",
        DELETE => "Delete",
        END => "End",
        PAGE_DOWN => "PageDown",
        RIGHT => "Right",
        LEFT => "Left",
        DOWN => "Down",
        UP => "Up",
        NUM_LOCK => "NumLock",
        KP_ENTER => "KeypadEnter",
        APPLICATION => "Application",
        LEFT_CTRL => "LeftCtrl",
        LEFT_SHIFT => "LeftShift",
        LEFT_ALT => "LeftAlt",
        LEFT_GUI => "LeftGui",
        RIGHT_CTRL => "RightCtrl",
        RIGHT_SHIFT => "RightShift",
        RIGHT_ALT => "RightAlt",
        RIGHT_GUI => "RightGui",
        _ => return None,
    };
    Some(name)
}

/// The character a key prints on a US keyboard, if any.
#[must_use]
pub fn usage_char(usage: u8, shifted: bool) -> Option<char> {
    let pair = match usage {
        A..=Z => {
            let lower = char::from(b'a' + (usage - A));
            return Some(if shifted {
                lower.to_ascii_uppercase()
            } else {
                lower
            });
        }
        DIGIT_1..=DIGIT_0 => {
            const DIGITS: &[u8; 10] = b"1234567890";
            const SHIFTED: &[u8; 10] = b"!@#$%^&*()";
            let i = usize::from(usage - DIGIT_1);
            (DIGITS[i], SHIFTED[i])
        }
        MINUS => (b'-', b'_'),
        EQUAL => (b'=', b'+'),
        BRACKET_LEFT => (b'[', b'{'),
        BRACKET_RIGHT => (b']', b'}'),
        BACKSLASH | NON_US_BACKSLASH => (b'\\', b'|'),
        NON_US_HASH => (b'#', b'~'),
        SEMICOLON => (b';', b':'),
        QUOTE => (b'\'', b'"'),
        GRAVE => (b'`', b'~'),
        COMMA => (b',', b'<'),
        PERIOD => (b'.', b'>'),
        SLASH => (b'/', b'?'),
        KP_SLASH => (b'/', b'/'),
        KP_STAR => (b'*', b'*'),
        KP_MINUS => (b'-', b'-'),
        KP_PLUS => (b'+', b'+'),
        KP_1..=KP_0 => {
            const KEYPAD: &[u8; 10] = b"1234567890";
            let c = KEYPAD[usize::from(usage - KP_1)];
            (c, c)
        }
        KP_PERIOD => (b'.', b'.'),
        _ => return None,
    };
    Some(char::from(if shifted { pair.1 } else { pair.0 }))
}

/// Human-readable description of a key for debug logs.
#[must_use]
pub fn describe(usage: u8, shifted: bool) -> String {
    if let Some(c) = usage_char(usage, shifted) {
        format!("'{c}'")
    } else if let Some(name) = usage_name(usage) {
        name.to_string()
    } else {
        format!("usage {usage:#04X}")
    }
}
