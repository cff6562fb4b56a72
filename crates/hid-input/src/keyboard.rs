//! Keyboard reports into the Key State Table.

use std::sync::Arc;

use atari_st_keyboard::hid::{self, modifier};
use atari_st_keyboard::{KeyStateTable, Layout, apply_keyboard_report_layout};

/// Length of a boot-protocol keyboard report.
pub const BOOT_REPORT_LEN: usize = 8;

/// A boot-protocol keyboard report: modifier bits and up to six usages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub keys: [u8; 6],
}

impl KeyboardReport {
    #[must_use]
    pub const fn new(modifiers: u8, keys: [u8; 6]) -> Self {
        Self { modifiers, keys }
    }

    /// Parse `modifier, reserved, keycode[6]`. Short reports are rejected.
    #[must_use]
    pub fn from_boot_report(report: &[u8]) -> Option<Self> {
        if report.len() < BOOT_REPORT_LEN {
            return None;
        }
        let mut keys = [0; 6];
        keys.copy_from_slice(&report[2..BOOT_REPORT_LEN]);
        Some(Self {
            modifiers: report[0],
            keys,
        })
    }

    /// Rewrite the shortcuts for keys the ST has and PC keyboards lack.
    ///
    /// With ALT held, BACKSPACE becomes INSERT and CTRL is dropped, and
    /// DELETE becomes CLR/HOME and ALT itself is dropped.
    #[must_use]
    pub fn with_alt_shortcuts(mut self) -> Self {
        if self.modifiers & modifier::ALT == 0 {
            return self;
        }
        if replace(&mut self.keys, hid::BACKSPACE, hid::INSERT) {
            self.modifiers &= !modifier::CTRL;
            log::debug!("Shortcut: ALT+BACKSPACE -> INSERT");
        }
        if replace(&mut self.keys, hid::DELETE, hid::HOME) {
            self.modifiers &= !modifier::ALT;
            log::debug!("Shortcut: ALT+DELETE -> CLR/HOME");
        }
        self
    }
}

fn replace(keys: &mut [u8; 6], from: u8, to: u8) -> bool {
    let mut replaced = false;
    for key in keys.iter_mut().filter(|k| **k == from) {
        *key = to;
        replaced = true;
    }
    replaced
}

/// One keyboard source's view of the Key State Table.
///
/// Holds the previous report's keys so releases can be detected. Each
/// keyboard source (USB, Bluetooth) gets its own pipeline.
pub struct KeyboardPipeline {
    keys: Arc<KeyStateTable>,
    layout: Layout,
    prev_keys: [u8; 6],
}

impl KeyboardPipeline {
    #[must_use]
    pub fn new(keys: Arc<KeyStateTable>, layout: Layout) -> Self {
        Self {
            keys,
            layout,
            prev_keys: [0; 6],
        }
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    #[must_use]
    pub fn key_states(&self) -> &Arc<KeyStateTable> {
        &self.keys
    }

    /// Apply a report. Modifiers are written even if the report is
    /// identical to the last one.
    pub fn handle_report(&mut self, report: &KeyboardReport) {
        let report = report.with_alt_shortcuts();
        log::trace!(
            "Keyboard modifiers {:#04X}, keys {:02X?}",
            report.modifiers,
            report.keys
        );

        if log::log_enabled!(log::Level::Debug) {
            let shifted = report.modifiers & modifier::SHIFT != 0;
            for &usage in report.keys.iter().filter(|&&u| u != 0) {
                if !self.prev_keys.contains(&usage) {
                    log::debug!("Key pressed: {}", hid::describe(usage, shifted));
                }
            }
        }

        apply_keyboard_report_layout(
            &self.keys,
            &self.prev_keys,
            &report.keys,
            report.modifiers,
            self.layout,
        );
        self.prev_keys = report.keys;
    }

    /// Forget the previous report and release everything it held.
    pub fn reset(&mut self) {
        apply_keyboard_report_layout(&self.keys, &self.prev_keys, &[0; 6], 0, self.layout);
        self.prev_keys = [0; 6];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atari_st_keyboard::scancode;

    fn pipeline() -> KeyboardPipeline {
        KeyboardPipeline::new(Arc::new(KeyStateTable::new()), Layout::Us)
    }

    fn held(p: &KeyboardPipeline) -> Vec<u8> {
        p.key_states().pressed().collect()
    }

    #[test]
    fn short_reports_are_rejected() {
        assert_eq!(KeyboardReport::from_boot_report(&[0; 7]), None);
        let report = KeyboardReport::from_boot_report(&[0x02, 0, 0x04, 0, 0, 0, 0, 0]);
        assert_eq!(report, Some(KeyboardReport::new(0x02, [0x04, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn a_press_and_release() {
        let mut p = pipeline();
        p.handle_report(&KeyboardReport::new(0, [hid::A, 0, 0, 0, 0, 0]));
        assert_eq!(held(&p), vec![scancode::A]);
        p.handle_report(&KeyboardReport::default());
        assert!(held(&p).is_empty());
    }

    #[test]
    fn repeated_report_keeps_modifier_down() {
        let mut p = pipeline();
        let report = KeyboardReport::new(modifier::LEFT_SHIFT, [hid::A, 0, 0, 0, 0, 0]);
        p.handle_report(&report);
        p.handle_report(&report);
        assert!(p.key_states().is_down(scancode::LSHIFT));
        assert!(p.key_states().is_down(scancode::A));
    }

    #[test]
    fn alt_backspace_becomes_insert_without_ctrl() {
        let mut p = pipeline();
        p.key_states().set(scancode::CTRL, true);
        let report = KeyboardReport::new(
            modifier::LEFT_ALT | modifier::LEFT_CTRL,
            [0, 0, hid::BACKSPACE, 0, 0, 0],
        );
        p.handle_report(&report);
        assert!(p.key_states().is_down(scancode::INSERT));
        assert!(!p.key_states().is_down(scancode::CTRL));
        assert!(!p.key_states().is_down(scancode::BACKSPACE));
        assert!(p.key_states().is_down(scancode::ALT));
    }

    #[test]
    fn alt_delete_becomes_clr_home_without_alt() {
        let mut p = pipeline();
        p.handle_report(&KeyboardReport::new(
            modifier::RIGHT_ALT,
            [hid::DELETE, 0, 0, 0, 0, 0],
        ));
        assert!(p.key_states().is_down(scancode::CLR_HOME));
        assert!(!p.key_states().is_down(scancode::ALT));
        assert!(!p.key_states().is_down(scancode::DELETE));
    }

    #[test]
    fn backspace_without_alt_is_untouched() {
        let report = KeyboardReport::new(modifier::LEFT_CTRL, [hid::BACKSPACE, 0, 0, 0, 0, 0]);
        assert_eq!(report.with_alt_shortcuts(), report);
    }

    #[test]
    fn reset_releases_held_keys() {
        let mut p = pipeline();
        p.handle_report(&KeyboardReport::new(modifier::LEFT_SHIFT, [hid::A, hid::Z, 0, 0, 0, 0]));
        p.reset();
        assert!(held(&p).is_empty());
    }
}
