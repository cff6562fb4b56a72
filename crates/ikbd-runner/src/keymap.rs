//! Host keys to USB HID usages, and the boot reports built from them.

use machine_ikbd::atari_st_keyboard::hid::{self, modifier};
use winit::keyboard::KeyCode;

/// Most keys a boot report carries.
const MAX_KEYS: usize = 6;

/// Usage ID for a physical key. Modifiers are included; see
/// [`modifier_bit`].
#[must_use]
pub fn usage(code: KeyCode) -> Option<u8> {
    let usage = match code {
        KeyCode::KeyA => hid::A,
        KeyCode::KeyB => hid::A + 1,
        KeyCode::KeyC => hid::A + 2,
        KeyCode::KeyD => hid::A + 3,
        KeyCode::KeyE => hid::A + 4,
        KeyCode::KeyF => hid::A + 5,
        KeyCode::KeyG => hid::A + 6,
        KeyCode::KeyH => hid::A + 7,
        KeyCode::KeyI => hid::A + 8,
        KeyCode::KeyJ => hid::A + 9,
        KeyCode::KeyK => hid::A + 10,
        KeyCode::KeyL => hid::A + 11,
        KeyCode::KeyM => hid::A + 12,
        KeyCode::KeyN => hid::A + 13,
        KeyCode::KeyO => hid::A + 14,
        KeyCode::KeyP => hid::A + 15,
        KeyCode::KeyQ => hid::A + 16,
        KeyCode::KeyR => hid::A + 17,
        KeyCode::KeyS => hid::A + 18,
        KeyCode::KeyT => hid::A + 19,
        KeyCode::KeyU => hid::A + 20,
        KeyCode::KeyV => hid::A + 21,
        KeyCode::KeyW => hid::A + 22,
        KeyCode::KeyX => hid::A + 23,
        KeyCode::KeyY => hid::A + 24,
        KeyCode::KeyZ => hid::Z,
        KeyCode::Digit1 => hid::DIGIT_1,
        KeyCode::Digit2 => hid::DIGIT_1 + 1,
        KeyCode::Digit3 => hid::DIGIT_1 + 2,
        KeyCode::Digit4 => hid::DIGIT_1 + 3,
        KeyCode::Digit5 => hid::DIGIT_1 + 4,
        KeyCode::Digit6 => hid::DIGIT_1 + 5,
        KeyCode::Digit7 => hid::DIGIT_1 + 6,
        KeyCode::Digit8 => hid::DIGIT_1 + 7,
        KeyCode::Digit9 => hid::DIGIT_1 + 8,
        KeyCode::Digit0 => hid::DIGIT_0,
        KeyCode::Enter => hid::ENTER,
        KeyCode::Escape => hid::ESCAPE,
        KeyCode::Backspace => hid::BACKSPACE,
        KeyCode::Tab => hid::TAB,
        KeyCode::Space => hid::SPACE,
        KeyCode::Minus => hid::MINUS,
        KeyCode::Equal => hid::EQUAL,
        KeyCode::BracketLeft => hid::BRACKET_LEFT,
        KeyCode::BracketRight => hid::BRACKET_RIGHT,
        KeyCode::Backslash => hid::BACKSLASH,
        KeyCode::Semicolon => hid::SEMICOLON,
        KeyCode::Quote => hid::QUOTE,
        KeyCode::Backquote => hid::GRAVE,
        KeyCode::Comma => hid::COMMA,
        KeyCode::Period => hid::PERIOD,
        KeyCode::Slash => hid::SLASH,
        KeyCode::CapsLock => hid::CAPS_LOCK,
        KeyCode::F1 => hid::F1,
        KeyCode::F2 => hid::F1 + 1,
        KeyCode::F3 => hid::F1 + 2,
        KeyCode::F4 => hid::F1 + 3,
        KeyCode::F5 => hid::F1 + 4,
        KeyCode::F6 => hid::F1 + 5,
        KeyCode::F7 => hid::F1 + 6,
        KeyCode::F8 => hid::F1 + 7,
        KeyCode::F9 => hid::F1 + 8,
        KeyCode::F10 => hid::F1 + 9,
        KeyCode::PrintScreen => hid::PRINT_SCREEN,
        KeyCode::ScrollLock => hid::SCROLL_LOCK,
        KeyCode::Pause => hid::PAUSE,
        KeyCode::Insert => hid::INSERT,
        KeyCode::Home => hid::HOME,
        KeyCode::PageUp => hid::PAGE_UP,
        KeyCode::Delete => hid::DELETE,
        KeyCode::End => hid::END,
        KeyCode::PageDown => hid::PAGE_DOWN,
        KeyCode::ArrowRight => hid::RIGHT,
        KeyCode::ArrowLeft => hid::LEFT,
        KeyCode::ArrowDown => hid::DOWN,
        KeyCode::ArrowUp => hid::UP,
        KeyCode::NumLock => hid::NUM_LOCK,
        KeyCode::NumpadDivide => hid::KP_SLASH,
        KeyCode::NumpadMultiply => hid::KP_STAR,
        KeyCode::NumpadSubtract => hid::KP_MINUS,
        KeyCode::NumpadAdd => hid::KP_PLUS,
        KeyCode::NumpadEnter => hid::KP_ENTER,
        KeyCode::Numpad1 => hid::KP_1,
        KeyCode::Numpad2 => hid::KP_1 + 1,
        KeyCode::Numpad3 => hid::KP_1 + 2,
        KeyCode::Numpad4 => hid::KP_1 + 3,
        KeyCode::Numpad5 => hid::KP_1 + 4,
        KeyCode::Numpad6 => hid::KP_1 + 5,
        KeyCode::Numpad7 => hid::KP_1 + 6,
        KeyCode::Numpad8 => hid::KP_1 + 7,
        KeyCode::Numpad9 => hid::KP_1 + 8,
        KeyCode::Numpad0 => hid::KP_0,
        KeyCode::NumpadDecimal => hid::KP_PERIOD,
        KeyCode::IntlBackslash => hid::NON_US_BACKSLASH,
        KeyCode::ContextMenu => hid::APPLICATION,
        KeyCode::ControlLeft => hid::LEFT_CTRL,
        KeyCode::ShiftLeft => hid::LEFT_SHIFT,
        KeyCode::AltLeft => hid::LEFT_ALT,
        KeyCode::SuperLeft => hid::LEFT_GUI,
        KeyCode::ControlRight => hid::RIGHT_CTRL,
        KeyCode::ShiftRight => hid::RIGHT_SHIFT,
        KeyCode::AltRight => hid::RIGHT_ALT,
        KeyCode::SuperRight => hid::RIGHT_GUI,
        _ => return None,
    };
    Some(usage)
}

/// Modifier byte bit for a modifier usage (0xE0..=0xE7).
#[must_use]
pub fn modifier_bit(usage: u8) -> Option<u8> {
    match usage {
        hid::LEFT_CTRL => Some(modifier::LEFT_CTRL),
        hid::LEFT_SHIFT => Some(modifier::LEFT_SHIFT),
        hid::LEFT_ALT => Some(modifier::LEFT_ALT),
        hid::LEFT_GUI => Some(modifier::LEFT_GUI),
        hid::RIGHT_CTRL => Some(modifier::RIGHT_CTRL),
        hid::RIGHT_SHIFT => Some(modifier::RIGHT_SHIFT),
        hid::RIGHT_ALT => Some(modifier::RIGHT_ALT),
        hid::RIGHT_GUI => Some(modifier::RIGHT_GUI),
        _ => None,
    }
}

/// The host keyboard as a USB boot keyboard.
#[derive(Debug, Default, Clone)]
pub struct BootKeyboard {
    modifiers: u8,
    held: Vec<u8>,
}

impl BootKeyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a key event. Returns true if the report changed.
    pub fn key(&mut self, usage: u8, pressed: bool) -> bool {
        if let Some(bit) = modifier_bit(usage) {
            let before = self.modifiers;
            if pressed {
                self.modifiers |= bit;
            } else {
                self.modifiers &= !bit;
            }
            return before != self.modifiers;
        }

        let position = self.held.iter().position(|&u| u == usage);
        match (pressed, position) {
            (true, None) => {
                self.held.push(usage);
                true
            }
            (false, Some(index)) => {
                self.held.remove(index);
                true
            }
            _ => false,
        }
    }

    /// `modifiers, reserved, keys[6]`. Only the first six held keys fit.
    #[must_use]
    pub fn report(&self) -> [u8; 8] {
        let mut report = [0u8; 8];
        report[0] = self.modifiers;
        for (slot, &usage) in report[2..].iter_mut().zip(self.held.iter().take(MAX_KEYS)) {
            *slot = usage;
        }
        report
    }

    pub fn release_all(&mut self) {
        self.modifiers = 0;
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_digits_follow_usage_order() {
        assert_eq!(usage(KeyCode::KeyA), Some(0x04));
        assert_eq!(usage(KeyCode::KeyZ), Some(0x1D));
        assert_eq!(usage(KeyCode::KeyY), Some(0x1C));
        assert_eq!(usage(KeyCode::Digit1), Some(0x1E));
        assert_eq!(usage(KeyCode::Digit9), Some(0x26));
        assert_eq!(usage(KeyCode::Digit0), Some(0x27));
        assert_eq!(usage(KeyCode::F10), Some(0x43));
        assert_eq!(usage(KeyCode::Numpad9), Some(0x61));
    }

    #[test]
    fn unmapped_key() {
        assert_eq!(usage(KeyCode::F12), None);
    }

    #[test]
    fn modifiers_go_to_the_first_byte() {
        let mut kb = BootKeyboard::new();
        assert!(kb.key(hid::LEFT_SHIFT, true));
        assert!(kb.key(hid::A, true));
        assert_eq!(kb.report(), [0x02, 0, 0x04, 0, 0, 0, 0, 0]);
        assert!(!kb.key(hid::LEFT_SHIFT, true));
        assert!(kb.key(hid::LEFT_SHIFT, false));
        assert_eq!(kb.report()[0], 0);
    }

    #[test]
    fn release_keeps_order_of_the_rest() {
        let mut kb = BootKeyboard::new();
        for usage in [0x04, 0x05, 0x06] {
            kb.key(usage, true);
        }
        kb.key(0x05, false);
        assert_eq!(&kb.report()[2..5], &[0x04, 0x06, 0]);
        assert!(!kb.key(0x05, false));
    }

    #[test]
    fn seventh_key_is_held_but_not_reported() {
        let mut kb = BootKeyboard::new();
        for usage in 0x04..0x0B {
            kb.key(usage, true);
        }
        assert_eq!(&kb.report()[2..], &[0x04, 0x05, 0x06, 0x07, 0x08, 0x09]);
        kb.key(0x04, false);
        assert_eq!(kb.report()[7], 0x0A);
        kb.release_all();
        assert_eq!(kb.report(), [0; 8]);
    }
}
