//! Bluetooth HID: discovery filtering, the allow-list and controller data.
//!
//! The Bluetooth stack is external. It calls into a [`BluetoothPlatform`]
//! as devices are discovered, connect and send data; [`IkbdBluetooth`] is
//! the one implementation, routing keyboards through a
//! [`KeyboardPipeline`], mice and gamepads into an [`InputSink`].

use std::fmt;
use std::str::FromStr;

use ikbd_core::SettingsStore;
use peripheral_st_joystick::{axis, fire};
use thiserror::Error;

use crate::InputSink;
use crate::keyboard::{KeyboardPipeline, KeyboardReport};

/// Name the platform registers under.
pub const PLATFORM_NAME: &str = "ikbd";

/// Class-of-Device fields.
pub mod cod {
    pub const MAJOR_MASK: u32 = 0x1F00;
    pub const MAJOR_PERIPHERAL: u32 = 0x0500;
    pub const MINOR_MASK: u32 = 0x00FC;
    pub const MINOR_KEYBOARD: u32 = 0x40;
    pub const MINOR_MICE: u32 = 0x80;
    pub const MINOR_KEYBOARD_AND_MICE: u32 = 0xC0;
    pub const MINOR_JOYSTICK: u32 = 0x04;
    pub const MINOR_GAMEPAD: u32 = 0x08;

    /// Minor classes the IKBD can use.
    pub const ALLOWED_MINOR: u32 =
        MINOR_KEYBOARD_AND_MICE | MINOR_KEYBOARD | MINOR_MICE | MINOR_GAMEPAD | MINOR_JOYSTICK;

    #[must_use]
    pub const fn is_peripheral(cod: u32) -> bool {
        cod & MAJOR_MASK == MAJOR_PERIPHERAL
    }

    #[must_use]
    pub const fn is_keyboard(cod: u32) -> bool {
        cod & MINOR_MASK & MINOR_KEYBOARD != 0
    }

    #[must_use]
    pub const fn is_mouse(cod: u32) -> bool {
        cod & MINOR_MASK & MINOR_MICE != 0
    }

    #[must_use]
    pub const fn is_gamepad(cod: u32) -> bool {
        cod & MINOR_MASK & (MINOR_GAMEPAD | MINOR_JOYSTICK) != 0
    }

    #[must_use]
    pub const fn is_supported(cod: u32) -> bool {
        is_peripheral(cod) && cod & MINOR_MASK & ALLOWED_MINOR != 0
    }
}

/// A Bluetooth device address, most significant octet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr(pub [u8; 6]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BdAddrParseError {
    #[error("expected 6 octets, found {0}")]
    OctetCount(usize),
    #[error("invalid octet '{0}'")]
    Octet(String),
}

impl FromStr for BdAddr {
    type Err = BdAddrParseError;

    /// `AA:BB:CC:DD:EE:FF`, with `:` or `-` between octets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(BdAddrParseError::OctetCount(parts.len()));
        }
        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(BdAddrParseError::Octet((*part).to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| BdAddrParseError::Octet((*part).to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Answer to the stack when it asks whether to go on with a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Ignore,
}

/// The three allow-list slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowSlot {
    Keyboard,
    Mouse,
    Gamepad,
}

impl AllowSlot {
    pub const ALL: [Self; 3] = [Self::Keyboard, Self::Mouse, Self::Gamepad];

    const fn index(self) -> usize {
        match self {
            Self::Keyboard => 0,
            Self::Mouse => 1,
            Self::Gamepad => 2,
        }
    }

    /// Settings parameter holding this slot's address.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Keyboard => "BT_KEYBOARD",
            Self::Mouse => "BT_MOUSE",
            Self::Gamepad => "BT_GAMEPAD",
        }
    }
}

/// One address per device category. A discovered device takes the first
/// free slot of its category; once taken, only that address is accepted
/// for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    slots: [Option<BdAddr>; 3],
}

impl AllowList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the persisted addresses. Missing or malformed entries leave
    /// their slot empty.
    pub fn load(&mut self, settings: &impl SettingsStore) {
        for slot in AllowSlot::ALL {
            self.slots[slot.index()] = None;
            let value = settings.find(slot.param()).map(str::trim).unwrap_or("");
            if value.is_empty() {
                log::info!("No BD_ADDR configured for {}", slot.param());
                continue;
            }
            match value.parse::<BdAddr>() {
                Ok(addr) => {
                    log::info!("Loaded BD_ADDR for {}: {addr}", slot.param());
                    self.slots[slot.index()] = Some(addr);
                }
                Err(err) => log::warn!("Invalid BD_ADDR for {}: '{value}' ({err})", slot.param()),
            }
        }
    }

    #[must_use]
    pub fn get(&self, slot: AllowSlot) -> Option<BdAddr> {
        self.slots[slot.index()]
    }

    pub fn set(&mut self, slot: AllowSlot, addr: BdAddr) {
        self.slots[slot.index()] = Some(addr);
    }

    /// The slot already holding `addr`, if any.
    #[must_use]
    pub fn slot_of(&self, addr: BdAddr) -> Option<AllowSlot> {
        AllowSlot::ALL
            .into_iter()
            .find(|slot| self.slots[slot.index()] == Some(addr))
    }

    /// Decide on a device seen during discovery.
    pub fn filter_discovered(&mut self, addr: BdAddr, cod: u32) -> Verdict {
        log::debug!(
            "is_peripheral={}, is_keyboard={}, is_mouse={}, is_gamepad={}",
            cod::is_peripheral(cod),
            cod::is_keyboard(cod),
            cod::is_mouse(cod),
            cod::is_gamepad(cod)
        );

        if !cod::is_supported(cod) {
            log::info!("Ignoring device {addr}: unsupported COD {cod:#08x}");
            return Verdict::Ignore;
        }
        if self.slot_of(addr).is_some() {
            return Verdict::Accept;
        }

        let free = |slot: AllowSlot| self.get(slot).is_none();
        let slot = if cod::is_keyboard(cod) && free(AllowSlot::Keyboard) {
            Some(AllowSlot::Keyboard)
        } else if cod::is_mouse(cod) && free(AllowSlot::Mouse) {
            Some(AllowSlot::Mouse)
        } else if cod::is_gamepad(cod) && free(AllowSlot::Gamepad) {
            Some(AllowSlot::Gamepad)
        } else {
            None
        };

        match slot {
            Some(slot) => {
                self.set(slot, addr);
                log::info!("Assigned {addr} to {}", slot.param());
                Verdict::Accept
            }
            None => {
                log::info!("Ignoring device {addr}: no available allow entry slot");
                Verdict::Ignore
            }
        }
    }
}

/// Gamepad d-pad bits.
pub mod dpad {
    pub const UP: u8 = 1 << 0;
    pub const DOWN: u8 = 1 << 1;
    pub const RIGHT: u8 = 1 << 2;
    pub const LEFT: u8 = 1 << 3;
}

/// Gamepad face, shoulder and thumb buttons.
pub mod button {
    pub const A: u16 = 1 << 0;
    pub const B: u16 = 1 << 1;
    pub const X: u16 = 1 << 2;
    pub const Y: u16 = 1 << 3;
    pub const SHOULDER_L: u16 = 1 << 4;
    pub const SHOULDER_R: u16 = 1 << 5;
    pub const TRIGGER_L: u16 = 1 << 6;
    pub const TRIGGER_R: u16 = 1 << 7;
    pub const THUMB_L: u16 = 1 << 8;
    pub const THUMB_R: u16 = 1 << 9;
}

/// Gamepad system buttons.
pub mod misc_button {
    pub const SYSTEM: u8 = 1 << 0;
    pub const SELECT: u8 = 1 << 1;
    pub const START: u8 = 1 << 2;
    pub const CAPTURE: u8 = 1 << 3;
}

pub mod mouse_button {
    pub const LEFT: u16 = 1 << 0;
    pub const RIGHT: u16 = 1 << 1;
    pub const MIDDLE: u16 = 1 << 2;
}

const BUTTON_NAMES: [(u16, &str); 10] = [
    (button::A, "A"),
    (button::B, "B"),
    (button::X, "X"),
    (button::Y, "Y"),
    (button::SHOULDER_L, "L1"),
    (button::SHOULDER_R, "R1"),
    (button::TRIGGER_L, "L2"),
    (button::TRIGGER_R, "R2"),
    (button::THUMB_L, "L3"),
    (button::THUMB_R, "R3"),
];

const MISC_BUTTON_NAMES: [(u8, &str); 4] = [
    (misc_button::SYSTEM, "SYSTEM"),
    (misc_button::SELECT, "SELECT"),
    (misc_button::START, "START"),
    (misc_button::CAPTURE, "CAPTURE"),
];

const DPAD_NAMES: [(u8, &str); 4] = [
    (dpad::UP, "DPAD_UP"),
    (dpad::DOWN, "DPAD_DOWN"),
    (dpad::LEFT, "DPAD_LEFT"),
    (dpad::RIGHT, "DPAD_RIGHT"),
];

/// Normalized gamepad state. Stick axes run roughly -512..=511.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gamepad {
    pub dpad: u8,
    pub axis_x: i32,
    pub axis_y: i32,
    pub axis_rx: i32,
    pub axis_ry: i32,
    pub brake: i32,
    pub throttle: i32,
    pub buttons: u16,
    pub misc_buttons: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mouse {
    pub delta_x: i32,
    pub delta_y: i32,
    pub buttons: u16,
    pub misc_buttons: u8,
    pub scroll_wheel: i8,
}

pub const KEYBOARD_PRESSED_KEYS_MAX: usize = 10;

/// Keyboard state as the stack decodes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub modifiers: u8,
    pub pressed_keys: [u8; KEYBOARD_PRESSED_KEYS_MAX],
}

impl Keyboard {
    /// The equivalent boot report. Keys past the sixth are dropped.
    #[must_use]
    pub fn to_report(&self) -> KeyboardReport {
        let mut keys = [0; 6];
        keys.copy_from_slice(&self.pressed_keys[..6]);
        KeyboardReport::new(self.modifiers, keys)
    }
}

/// One controller-data callback's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerData {
    Gamepad(Gamepad),
    Mouse(Mouse),
    Keyboard(Keyboard),
    BalanceBoard,
}

impl ControllerData {
    fn class_name(&self) -> &'static str {
        match self {
            Self::Gamepad(_) => "gamepad",
            Self::Mouse(_) => "mouse",
            Self::Keyboard(_) => "keyboard",
            Self::BalanceBoard => "balance board",
        }
    }
}

/// What the platform knows about a connected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtDevice {
    pub addr: BdAddr,
    pub cod: u32,
    pub name: String,
}

/// Output features a gamepad may have. Devices override what they
/// support; the rest are no-ops.
pub trait GamepadFeedback {
    fn play_dual_rumble(&mut self, _delay_ms: u16, _duration_ms: u16, _weak: u8, _strong: u8) {}

    fn set_player_leds(&mut self, _leds: u8) {}

    fn set_lightbar_color(&mut self, _red: u8, _green: u8, _blue: u8) {}
}

/// Out-of-band notifications from the stack.
pub enum OobEvent<'a> {
    GamepadSystemButton(&'a mut dyn GamepadFeedback),
    BluetoothEnabled(bool),
    Other(u16),
}

/// The stack operations a platform may call back into.
pub trait ScanControl {
    fn start_scanning_and_autoconnect(&mut self);
}

/// Callbacks the Bluetooth stack makes into the application.
pub trait BluetoothPlatform {
    fn name(&self) -> &str;

    fn init(&mut self) {}

    fn on_init_complete(&mut self, scan: &mut dyn ScanControl);

    fn on_device_discovered(
        &mut self,
        addr: BdAddr,
        name: Option<&str>,
        cod: u32,
        rssi: i8,
    ) -> Verdict;

    fn on_device_connected(&mut self, device: &BtDevice);

    fn on_device_disconnected(&mut self, device: &BtDevice);

    fn on_device_ready(&mut self, device: &BtDevice) -> Verdict;

    fn on_oob_event(&mut self, event: OobEvent<'_>);

    fn on_controller_data(&mut self, device: &BtDevice, data: &ControllerData);

    fn get_property(&self, _index: u16) -> Option<&str> {
        None
    }
}

/// The Bluetooth stack as the mode loop drives it.
pub trait BluetoothStack {
    /// Bring the stack up with `platform` receiving its callbacks.
    fn init(&mut self, platform: &mut dyn BluetoothPlatform);

    /// Run pending work without blocking.
    fn poll(&mut self, platform: &mut dyn BluetoothPlatform);
}

/// Stick values inside this band count as centred.
const AXIS_IDLE_MIN: i32 = -65;
const AXIS_IDLE_MAX: i32 = 64;

#[must_use]
pub fn normalize_axis(value: i32) -> i32 {
    if (AXIS_IDLE_MIN..=AXIS_IDLE_MAX).contains(&value) {
        0
    } else {
        value
    }
}

/// Fire and axis bits (port 0 encoding) for a gamepad.
///
/// The d-pad and both sticks all steer. Any button fires.
#[must_use]
pub fn gamepad_joystick_state(gp: &Gamepad) -> (u8, u8) {
    let mut axis_bits = 0;
    if gp.dpad & dpad::UP != 0 {
        axis_bits |= axis::UP;
    }
    if gp.dpad & dpad::DOWN != 0 {
        axis_bits |= axis::DOWN;
    }
    if gp.dpad & dpad::LEFT != 0 {
        axis_bits |= axis::LEFT;
    }
    if gp.dpad & dpad::RIGHT != 0 {
        axis_bits |= axis::RIGHT;
    }
    for (x, y) in [(gp.axis_x, gp.axis_y), (gp.axis_rx, gp.axis_ry)] {
        axis_bits |= stick_bits(normalize_axis(x), normalize_axis(y));
    }

    let fire_bits = if gp.buttons != 0 || gp.misc_buttons != 0 {
        fire::PORT0
    } else {
        0
    };
    (fire_bits, axis_bits)
}

fn stick_bits(x: i32, y: i32) -> u8 {
    let mut bits = 0;
    if y < 0 {
        bits |= axis::UP;
    }
    if y > 0 {
        bits |= axis::DOWN;
    }
    if x < 0 {
        bits |= axis::LEFT;
    }
    if x > 0 {
        bits |= axis::RIGHT;
    }
    bits
}

fn axis_dir(value: i32, negative: &'static str, positive: &'static str) -> &'static str {
    match value.signum() {
        -1 => negative,
        1 => positive,
        _ => "center",
    }
}

fn log_button_changes<T>(names: &[(T, &str)], old: T, new: T)
where
    T: Copy + PartialEq + Default + std::ops::BitAnd<Output = T> + std::ops::BitXor<Output = T>,
{
    let changed = old ^ new;
    for &(mask, name) in names {
        if changed & mask != T::default() {
            let state = if new & mask != T::default() {
                "pressed"
            } else {
                "released"
            };
            log::debug!("Button {name} {state}");
        }
    }
}

fn log_gamepad_changes(old: &Gamepad, new: &Gamepad) {
    log_button_changes(&BUTTON_NAMES, old.buttons, new.buttons);
    log_button_changes(&MISC_BUTTON_NAMES, old.misc_buttons, new.misc_buttons);
    log_button_changes(&DPAD_NAMES, old.dpad, new.dpad);

    let axes = [
        ("LX", old.axis_x, new.axis_x, "left", "right"),
        ("LY", old.axis_y, new.axis_y, "up", "down"),
        ("RX", old.axis_rx, new.axis_rx, "left", "right"),
        ("RY", old.axis_ry, new.axis_ry, "up", "down"),
    ];
    for (name, old, new, negative, positive) in axes {
        let (old, new) = (normalize_axis(old), normalize_axis(new));
        if old != new {
            log::debug!("Axis {name}: {} ({new})", axis_dir(new, negative, positive));
        }
    }
}

/// Initial lightbar colour; each system-button press steps it.
const LIGHTBAR_START: (u8, u8, u8) = (0x10, 0x20, 0x40);

/// The IKBD's Bluetooth platform.
pub struct IkbdBluetooth<S> {
    allow_list: AllowList,
    keyboard: KeyboardPipeline,
    sink: S,
    prev_gamepad: Gamepad,
    player_leds: u8,
    lightbar: (u8, u8, u8),
}

impl<S: InputSink> IkbdBluetooth<S> {
    #[must_use]
    pub fn new(allow_list: AllowList, keyboard: KeyboardPipeline, sink: S) -> Self {
        Self {
            allow_list,
            keyboard,
            sink,
            prev_gamepad: Gamepad::default(),
            player_leds: 0,
            lightbar: LIGHTBAR_START,
        }
    }

    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    #[must_use]
    pub fn keyboard(&self) -> &KeyboardPipeline {
        &self.keyboard
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Rumble, step the player LEDs and step the lightbar colour.
    fn trigger_event_on_gamepad(&mut self, gamepad: &mut dyn GamepadFeedback) {
        gamepad.play_dual_rumble(0, 50, 128, 40);

        self.player_leds = self.player_leds.wrapping_add(1) & 0x0F;
        gamepad.set_player_leds(self.player_leds);

        let (r, g, b) = self.lightbar;
        self.lightbar = (r.wrapping_add(0x10), g.wrapping_sub(0x20), b.wrapping_add(0x40));
        let (r, g, b) = self.lightbar;
        gamepad.set_lightbar_color(r, g, b);
    }

    fn handle_gamepad(&mut self, gp: &Gamepad) {
        let (fire_bits, axis_bits) = gamepad_joystick_state(gp);
        self.sink.set_joystick_state(fire_bits, axis_bits);
        log_gamepad_changes(&self.prev_gamepad, gp);
        self.prev_gamepad = *gp;
    }

    fn handle_mouse(&mut self, ms: &Mouse) {
        let left = ms.buttons & mouse_button::LEFT != 0;
        let right = ms.buttons & mouse_button::RIGHT != 0;
        let dx = ms.delta_x.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        let dy = ms.delta_y.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        log::trace!("Mouse move: dx={dx}, dy={dy}, left={left}, right={right}");
        self.sink.update_mouse(dx, dy, left, right);
    }
}

impl<S: InputSink> BluetoothPlatform for IkbdBluetooth<S> {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    fn init(&mut self) {
        log::debug!("Bluetooth platform init");
    }

    fn on_init_complete(&mut self, scan: &mut dyn ScanControl) {
        log::info!("Bluetooth init complete, scanning for devices");
        for slot in AllowSlot::ALL {
            match self.allow_list.get(slot) {
                Some(addr) => log::info!("Allow-list {}: {addr}", slot.param()),
                None => log::info!("Allow-list {}: free", slot.param()),
            }
        }
        scan.start_scanning_and_autoconnect();
    }

    fn on_device_discovered(
        &mut self,
        addr: BdAddr,
        name: Option<&str>,
        cod: u32,
        rssi: i8,
    ) -> Verdict {
        log::debug!(
            "{addr}, name='{}', cod={cod:#08x}, rssi={rssi}",
            name.unwrap_or("<null>")
        );
        self.allow_list.filter_discovered(addr, cod)
    }

    fn on_device_connected(&mut self, device: &BtDevice) {
        log::info!("Device connected: {} ({})", device.addr, device.name);
    }

    fn on_device_disconnected(&mut self, device: &BtDevice) {
        log::info!("Device disconnected: {} ({})", device.addr, device.name);
    }

    fn on_device_ready(&mut self, device: &BtDevice) -> Verdict {
        log::info!("Device ready: {} ({})", device.addr, device.name);
        Verdict::Accept
    }

    fn on_oob_event(&mut self, event: OobEvent<'_>) {
        match event {
            OobEvent::GamepadSystemButton(gamepad) => self.trigger_event_on_gamepad(gamepad),
            OobEvent::BluetoothEnabled(enabled) => log::info!("Bluetooth enabled: {enabled}"),
            OobEvent::Other(code) => log::debug!("Unsupported OOB event: {code:#06x}"),
        }
    }

    fn on_controller_data(&mut self, device: &BtDevice, data: &ControllerData) {
        // Some mice report as another class; their COD tells the truth.
        if cod::is_mouse(device.cod) && !matches!(data, ControllerData::Mouse(_)) {
            log::debug!(
                "Overriding controller class to MOUSE based on COD, dropping {} data",
                data.class_name()
            );
            return;
        }

        match data {
            ControllerData::Gamepad(gp) => self.handle_gamepad(gp),
            ControllerData::Mouse(ms) => self.handle_mouse(ms),
            ControllerData::Keyboard(kb) => {
                log::trace!(
                    "Keyboard modifiers {:#04X}, keys {:02X?}",
                    kb.modifiers,
                    kb.pressed_keys
                );
                self.keyboard.handle_report(&kb.to_report());
            }
            ControllerData::BalanceBoard => {
                log::debug!("Unsupported controller class: {}", data.class_name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use atari_st_keyboard::hid::{self, modifier};
    use atari_st_keyboard::{KeyStateTable, Layout, scancode};

    use super::*;
    use crate::testing::RecordingSink;

    const KEYBOARD_COD: u32 = 0x0540;
    const MOUSE_COD: u32 = 0x0580;
    const GAMEPAD_COD: u32 = 0x0508;

    fn addr(last: u8) -> BdAddr {
        BdAddr([0x60, 0xC5, 0x47, 0x1E, 0x01, last])
    }

    fn platform() -> IkbdBluetooth<RecordingSink> {
        IkbdBluetooth::new(
            AllowList::new(),
            KeyboardPipeline::new(Arc::new(KeyStateTable::new()), Layout::Us),
            RecordingSink::default(),
        )
    }

    fn device(cod: u32) -> BtDevice {
        BtDevice {
            addr: addr(1),
            cod,
            name: "test".to_string(),
        }
    }

    #[test]
    fn bd_addr_parse_and_display() {
        let parsed: BdAddr = "60:c5:47:1e:01:74".parse().unwrap();
        assert_eq!(parsed, BdAddr([0x60, 0xC5, 0x47, 0x1E, 0x01, 0x74]));
        assert_eq!(parsed.to_string(), "60:C5:47:1E:01:74");
        assert_eq!("60-C5-47-1E-01-74".parse::<BdAddr>(), Ok(parsed));
        assert_eq!(
            "60:C5:47".parse::<BdAddr>(),
            Err(BdAddrParseError::OctetCount(3))
        );
        assert!("60:C5:47:1E:01:7G".parse::<BdAddr>().is_err());
    }

    #[test]
    fn first_keyboard_takes_the_slot() {
        let mut list = AllowList::new();
        assert_eq!(list.filter_discovered(addr(1), KEYBOARD_COD), Verdict::Accept);
        assert_eq!(list.filter_discovered(addr(2), KEYBOARD_COD), Verdict::Ignore);
        assert_eq!(list.filter_discovered(addr(3), KEYBOARD_COD), Verdict::Ignore);
        assert_eq!(list.get(AllowSlot::Keyboard), Some(addr(1)));
        // Known again later.
        assert_eq!(list.filter_discovered(addr(1), KEYBOARD_COD), Verdict::Accept);
    }

    #[test]
    fn keyboard_and_mouse_use_separate_slots() {
        let mut list = AllowList::new();
        assert_eq!(list.filter_discovered(addr(1), KEYBOARD_COD), Verdict::Accept);
        assert_eq!(list.filter_discovered(addr(2), MOUSE_COD), Verdict::Accept);
        assert_eq!(list.filter_discovered(addr(3), GAMEPAD_COD), Verdict::Accept);
        assert_eq!(list.slot_of(addr(2)), Some(AllowSlot::Mouse));
        assert_eq!(list.slot_of(addr(3)), Some(AllowSlot::Gamepad));
    }

    #[test]
    fn combo_device_falls_through_to_mouse_slot() {
        let mut list = AllowList::new();
        list.filter_discovered(addr(1), KEYBOARD_COD);
        assert_eq!(list.filter_discovered(addr(2), 0x05C0), Verdict::Accept);
        assert_eq!(list.slot_of(addr(2)), Some(AllowSlot::Mouse));
    }

    #[test]
    fn non_peripheral_is_ignored() {
        let mut list = AllowList::new();
        // Audio major class with a keyboard-looking minor.
        assert_eq!(list.filter_discovered(addr(1), 0x0440), Verdict::Ignore);
        // Peripheral with an unsupported minor (remote control).
        assert_eq!(list.filter_discovered(addr(1), 0x0530), Verdict::Ignore);
        assert_eq!(list, AllowList::new());
    }

    #[test]
    fn load_from_settings() {
        let mut settings = HashMap::new();
        settings.insert("BT_KEYBOARD".to_string(), "60:C5:47:1E:01:74".to_string());
        settings.insert("BT_MOUSE".to_string(), "bogus".to_string());
        settings.insert("BT_GAMEPAD".to_string(), String::new());
        let mut list = AllowList::new();
        list.set(AllowSlot::Mouse, addr(9));
        list.load(&settings);
        assert_eq!(list.get(AllowSlot::Keyboard), Some(addr(0x74)));
        assert_eq!(list.get(AllowSlot::Mouse), None);
        assert_eq!(list.get(AllowSlot::Gamepad), None);
    }

    #[test]
    fn axis_deadband() {
        assert_eq!(normalize_axis(-65), 0);
        assert_eq!(normalize_axis(64), 0);
        assert_eq!(normalize_axis(-66), -66);
        assert_eq!(normalize_axis(65), 65);
    }

    #[test]
    fn gamepad_steers_with_dpad_and_sticks() {
        let gp = Gamepad {
            dpad: dpad::UP,
            axis_x: 300,
            axis_ry: 200,
            ..Gamepad::default()
        };
        assert_eq!(
            gamepad_joystick_state(&gp),
            (0, axis::UP | axis::RIGHT | axis::DOWN)
        );

        let fire_only = Gamepad {
            misc_buttons: misc_button::START,
            axis_y: -40,
            ..Gamepad::default()
        };
        assert_eq!(gamepad_joystick_state(&fire_only), (fire::PORT0, 0));
    }

    #[test]
    fn gamepad_data_reaches_sink() {
        let mut bt = platform();
        let gp = Gamepad {
            buttons: button::TRIGGER_R,
            axis_x: -200,
            ..Gamepad::default()
        };
        bt.on_controller_data(&device(GAMEPAD_COD), &ControllerData::Gamepad(gp));
        assert_eq!(bt.sink().joystick, vec![(fire::PORT0, axis::LEFT)]);
    }

    #[test]
    fn mouse_data_reaches_sink() {
        let mut bt = platform();
        let ms = Mouse {
            delta_x: 4,
            delta_y: -3,
            buttons: mouse_button::RIGHT,
            ..Mouse::default()
        };
        bt.on_controller_data(&device(MOUSE_COD), &ControllerData::Mouse(ms));
        assert_eq!(bt.sink().mouse, vec![(4, -3, false, true)]);
    }

    #[test]
    fn mouse_cod_drops_other_classes() {
        let mut bt = platform();
        let gp = Gamepad {
            buttons: button::A,
            ..Gamepad::default()
        };
        bt.on_controller_data(&device(MOUSE_COD), &ControllerData::Gamepad(gp));
        assert!(bt.sink().joystick.is_empty());
        assert!(bt.sink().mouse.is_empty());
    }

    #[test]
    fn keyboard_data_uses_all_six_keys() {
        let mut bt = platform();
        let mut pressed_keys = [0; KEYBOARD_PRESSED_KEYS_MAX];
        pressed_keys[..6].copy_from_slice(&[hid::A, 0x05, 0x06, 0x07, 0x08, hid::Z]);
        let kb = Keyboard {
            modifiers: modifier::LEFT_SHIFT,
            pressed_keys,
        };
        bt.on_controller_data(&device(KEYBOARD_COD), &ControllerData::Keyboard(kb));
        let keys = bt.keyboard().key_states();
        assert!(keys.is_down(scancode::A));
        assert!(keys.is_down(scancode::LSHIFT));
        assert_eq!(keys.pressed().count(), 7);
    }

    #[test]
    fn keyboard_alt_shortcut_applies_over_bluetooth() {
        let mut bt = platform();
        let mut pressed_keys = [0; KEYBOARD_PRESSED_KEYS_MAX];
        pressed_keys[0] = hid::BACKSPACE;
        let kb = Keyboard {
            modifiers: modifier::LEFT_ALT | modifier::RIGHT_CTRL,
            pressed_keys,
        };
        bt.on_controller_data(&device(KEYBOARD_COD), &ControllerData::Keyboard(kb));
        let keys = bt.keyboard().key_states();
        assert!(keys.is_down(scancode::INSERT));
        assert!(!keys.is_down(scancode::CTRL));
    }

    #[derive(Default)]
    struct Pad {
        rumble: Vec<(u16, u16, u8, u8)>,
        leds: Vec<u8>,
        colors: Vec<(u8, u8, u8)>,
    }

    impl GamepadFeedback for Pad {
        fn play_dual_rumble(&mut self, delay_ms: u16, duration_ms: u16, weak: u8, strong: u8) {
            self.rumble.push((delay_ms, duration_ms, weak, strong));
        }

        fn set_player_leds(&mut self, leds: u8) {
            self.leds.push(leds);
        }

        fn set_lightbar_color(&mut self, red: u8, green: u8, blue: u8) {
            self.colors.push((red, green, blue));
        }
    }

    #[test]
    fn system_button_feedback() {
        let mut bt = platform();
        let mut pad = Pad::default();
        for _ in 0..16 {
            bt.on_oob_event(OobEvent::GamepadSystemButton(&mut pad));
        }
        assert_eq!(pad.rumble[0], (0, 50, 128, 40));
        assert_eq!(&pad.leds[..3], &[1, 2, 3]);
        assert_eq!(pad.leds[15], 0);
        assert_eq!(pad.colors[0], (0x20, 0x00, 0x80));
        assert_eq!(pad.colors[1], (0x30, 0xE0, 0xC0));
    }

    struct Scanner(bool);

    impl ScanControl for Scanner {
        fn start_scanning_and_autoconnect(&mut self) {
            self.0 = true;
        }
    }

    #[test]
    fn init_complete_starts_scanning() {
        let mut bt = platform();
        let mut scan = Scanner(false);
        bt.on_init_complete(&mut scan);
        assert!(scan.0);
        assert_eq!(bt.name(), "ikbd");
        assert_eq!(bt.get_property(0), None);
        assert_eq!(bt.on_device_ready(&device(GAMEPAD_COD)), Verdict::Accept);
    }
}
