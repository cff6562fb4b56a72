//! Host gamepads through gilrs, as Bluetooth gamepads or USB joysticks.

use std::collections::HashMap;

use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};
use machine_ikbd::hid_input::bluetooth::{self, button, dpad, misc_button};

/// Stick deflection that counts as a direction on the USB joystick path.
const AXIS_THRESHOLD: f32 = 0.5;

/// Full-scale stick value on the Bluetooth path.
const BT_AXIS_SCALE: f32 = 511.0;

/// USB joystick report axis value for a deflected direction.
const USB_AXIS_DEFLECTED: i16 = 0x0100;

/// Button bit in byte 0 of the USB joystick report. Bit 0 is ignored by
/// the decoder.
const USB_FIRE: u8 = 0x02;

/// What the runner reads from one host gamepad.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PadSnapshot {
    pub dpad: u8,
    pub buttons: u16,
    pub misc_buttons: u8,
    /// Stick axes in -1.0..=1.0, up positive.
    pub left: (f32, f32),
    pub right: (f32, f32),
}

impl PadSnapshot {
    fn read(pad: &gilrs::Gamepad<'_>) -> Self {
        let mut snapshot = Self::default();
        for (host, bit) in [
            (Button::DPadUp, dpad::UP),
            (Button::DPadDown, dpad::DOWN),
            (Button::DPadLeft, dpad::LEFT),
            (Button::DPadRight, dpad::RIGHT),
        ] {
            if pad.is_pressed(host) {
                snapshot.dpad |= bit;
            }
        }
        for (host, bit) in [
            (Button::South, button::A),
            (Button::East, button::B),
            (Button::West, button::X),
            (Button::North, button::Y),
            (Button::LeftTrigger, button::SHOULDER_L),
            (Button::RightTrigger, button::SHOULDER_R),
            (Button::LeftTrigger2, button::TRIGGER_L),
            (Button::RightTrigger2, button::TRIGGER_R),
            (Button::LeftThumb, button::THUMB_L),
            (Button::RightThumb, button::THUMB_R),
        ] {
            if pad.is_pressed(host) {
                snapshot.buttons |= bit;
            }
        }
        for (host, bit) in [
            (Button::Mode, misc_button::SYSTEM),
            (Button::Select, misc_button::SELECT),
            (Button::Start, misc_button::START),
        ] {
            if pad.is_pressed(host) {
                snapshot.misc_buttons |= bit;
            }
        }
        snapshot.left = (pad.value(Axis::LeftStickX), pad.value(Axis::LeftStickY));
        snapshot.right = (pad.value(Axis::RightStickX), pad.value(Axis::RightStickY));
        snapshot
    }

    /// The controller data a Bluetooth stack would deliver. Stick Y runs
    /// down positive there.
    #[must_use]
    pub fn to_bluetooth(&self) -> bluetooth::Gamepad {
        let scale = |v: f32| (v.clamp(-1.0, 1.0) * BT_AXIS_SCALE) as i32;
        bluetooth::Gamepad {
            dpad: self.dpad,
            axis_x: scale(self.left.0),
            axis_y: scale(-self.left.1),
            axis_rx: scale(self.right.0),
            axis_ry: scale(-self.right.1),
            buttons: self.buttons,
            misc_buttons: self.misc_buttons,
            ..bluetooth::Gamepad::default()
        }
    }

    /// A 7-byte USB joystick report: buttons, X low, Y low, X high, Y high,
    /// hat, extra buttons. The decoder reads positive Y as up and positive
    /// X as left.
    #[must_use]
    pub fn to_usb_report(&self) -> [u8; 7] {
        let (sx, sy) = self.left;
        let up = self.dpad & dpad::UP != 0 || sy > AXIS_THRESHOLD;
        let down = self.dpad & dpad::DOWN != 0 || sy < -AXIS_THRESHOLD;
        let left = self.dpad & dpad::LEFT != 0 || sx < -AXIS_THRESHOLD;
        let right = self.dpad & dpad::RIGHT != 0 || sx > AXIS_THRESHOLD;

        let y = direction(up, down);
        let x = direction(left, right);
        let [x_hi, x_lo] = x.to_be_bytes();
        let [y_hi, y_lo] = y.to_be_bytes();
        let fire = if self.buttons != 0 { USB_FIRE } else { 0 };
        [fire, x_lo, y_lo, x_hi, y_hi, 0, 0]
    }
}

fn direction(positive: bool, negative: bool) -> i16 {
    match (positive, negative) {
        (true, false) => USB_AXIS_DEFLECTED,
        (false, true) => -USB_AXIS_DEFLECTED,
        _ => 0,
    }
}

/// Connected host gamepads and their last reported state.
pub struct Gamepads {
    gilrs: Option<Gilrs>,
    last: HashMap<GamepadId, PadSnapshot>,
}

impl Gamepads {
    /// Gamepad support is optional; without it no pads ever appear.
    #[must_use]
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => {
                for (id, pad) in gilrs.gamepads() {
                    log::info!("Gamepad {id}: {}", pad.name());
                }
                Some(gilrs)
            }
            Err(e) => {
                log::warn!("Gamepad support disabled: {e}");
                None
            }
        };
        Self {
            gilrs,
            last: HashMap::new(),
        }
    }

    /// A stand-in with no gamepad backend.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            gilrs: None,
            last: HashMap::new(),
        }
    }

    /// Drain pending events. Returns the pads whose state changed.
    pub fn poll(&mut self) -> Vec<(GamepadId, PadSnapshot)> {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return Vec::new();
        };

        let mut touched = Vec::new();
        while let Some(event) = gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    let pad = gilrs.gamepad(event.id);
                    let name = pad.name();
                    log::info!("Gamepad {} connected: {name}", event.id);
                }
                EventType::Disconnected => {
                    log::info!("Gamepad {} disconnected", event.id);
                    self.last.remove(&event.id);
                    continue;
                }
                _ => {}
            }
            if !touched.contains(&event.id) {
                touched.push(event.id);
            }
        }

        let mut changed = Vec::new();
        for id in touched {
            let Some(pad) = gilrs.connected_gamepad(id) else {
                continue;
            };
            let snapshot = PadSnapshot::read(&pad);
            if self.last.get(&id) != Some(&snapshot) {
                self.last.insert(id, snapshot);
                changed.push((id, snapshot));
            }
        }
        changed
    }
}

impl Default for Gamepads {
    fn default() -> Self {
        Self::new()
    }
}
