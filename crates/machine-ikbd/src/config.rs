//! Persisted settings and the configuration resolved from them.
//!
//! Every parameter is read once when a mode loop starts. Missing or bad
//! values never fail: each falls back to a default and says so in the log.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use atari_st_keyboard::Layout;
use ikbd_core::SettingsStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter names.
pub mod param {
    pub const MODE: &str = "MODE";
    pub const MOUSE_SPEED: &str = "MOUSE_SPEED";
    pub const MOUSE_ORIGINAL: &str = "MOUSE_ORIGINAL";
    pub const JOYSTICK_USB: &str = "JOYSTICK_USB";
    pub const JOYSTICK_USB_PORT: &str = "JOYSTICK_USB_PORT";
    pub const BT_KB_LAYOUT: &str = "BT_KB_LAYOUT";
    pub const KB_LAYOUT: &str = "KB_LAYOUT";
    pub const BT_KEYBOARD: &str = "BT_KEYBOARD";
    pub const BT_MOUSE: &str = "BT_MOUSE";
    pub const BT_GAMEPAD: &str = "BT_GAMEPAD";
}

pub const DEFAULT_MOUSE_SPEED: i32 = 5;
pub const MAX_MOUSE_SPEED: i32 = 9;
pub const DEFAULT_JOYSTICK_USB_PORT: u8 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cannot read settings from {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// What the board does after power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardMode {
    /// The original keyboard is wired straight through.
    Native,
    /// USB host devices drive the emulated IKBD.
    Usb,
    /// Bluetooth devices drive the emulated IKBD.
    Bluetooth,
    /// No source selected; the configuration app owns the board.
    Configuration,
}

impl KeyboardMode {
    /// Mode from its stored number: 0 native, 1 USB, 2 Bluetooth, and
    /// anything else configuration.
    #[must_use]
    pub const fn from_number(value: i64) -> Self {
        match value {
            0 => Self::Native,
            1 => Self::Usb,
            2 => Self::Bluetooth,
            _ => Self::Configuration,
        }
    }

    /// Mode from a name as typed on a command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "native" | "0" => Some(Self::Native),
            "usb" | "1" => Some(Self::Usb),
            "bt" | "bluetooth" | "2" => Some(Self::Bluetooth),
            "config" | "configuration" | "255" => Some(Self::Configuration),
            _ => None,
        }
    }

    /// Resolve the `MODE` parameter.
    #[must_use]
    pub fn from_settings(settings: &impl SettingsStore) -> Self {
        let Some(value) = settings.find(param::MODE).filter(|v| !v.is_empty()) else {
            log::warn!("MODE missing. Falling back to configuration mode.");
            return Self::Configuration;
        };
        match leading_int(value) {
            Some(number) => {
                log::info!("Configured keyboard mode: {number}");
                Self::from_number(number)
            }
            None => {
                log::warn!("Invalid MODE value '{value}'. Starting configuration mode.");
                Self::Configuration
            }
        }
    }
}

impl fmt::Display for KeyboardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Usb => "usb",
            Self::Bluetooth => "bluetooth",
            Self::Configuration => "configuration",
        })
    }
}

/// The leading decimal integer of `text`, ignoring what follows it.
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Boolean settings are true when they start with t, y or 1.
fn truthy(value: &str) -> bool {
    matches!(value.as_bytes().first(), Some(b't' | b'T' | b'1' | b'y' | b'Y'))
}

/// The configuration every mode loop works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IkbdConfig {
    pub mode: KeyboardMode,
    /// Mouse gain level, 0..=9.
    pub mouse_speed: i32,
    /// Decode an original ST mouse on the joystick 0 pins.
    pub mouse_original: bool,
    pub joystick_usb: bool,
    /// Which ST port the USB joystick drives: 0 or 1.
    pub joystick_usb_port: u8,
    /// Layout for USB keyboards.
    pub kb_layout: Layout,
    /// Layout for Bluetooth keyboards.
    pub bt_kb_layout: Layout,
}

impl Default for IkbdConfig {
    fn default() -> Self {
        Self {
            mode: KeyboardMode::Configuration,
            mouse_speed: DEFAULT_MOUSE_SPEED,
            mouse_original: false,
            joystick_usb: false,
            joystick_usb_port: DEFAULT_JOYSTICK_USB_PORT,
            kb_layout: Layout::Us,
            bt_kb_layout: Layout::Us,
        }
    }
}

impl IkbdConfig {
    #[must_use]
    pub fn load(settings: &impl SettingsStore) -> Self {
        Self {
            mode: KeyboardMode::from_settings(settings),
            mouse_speed: mouse_speed(settings),
            mouse_original: flag(settings, param::MOUSE_ORIGINAL),
            joystick_usb: flag(settings, param::JOYSTICK_USB),
            joystick_usb_port: joystick_usb_port(settings),
            kb_layout: layout(settings, param::KB_LAYOUT),
            bt_kb_layout: layout(settings, param::BT_KB_LAYOUT),
        }
    }
}

fn mouse_speed(settings: &impl SettingsStore) -> i32 {
    let Some(value) = settings.find(param::MOUSE_SPEED) else {
        log::warn!("{} not set. Defaulting to {DEFAULT_MOUSE_SPEED}", param::MOUSE_SPEED);
        return DEFAULT_MOUSE_SPEED;
    };
    log::info!("Mouse speed setting: {value}");
    match leading_int(value) {
        Some(speed) if (0..=i64::from(MAX_MOUSE_SPEED)).contains(&speed) => speed as i32,
        Some(speed) => {
            let clamped = speed.clamp(0, i64::from(MAX_MOUSE_SPEED)) as i32;
            log::warn!("Mouse speed {speed} out of range, using {clamped}");
            clamped
        }
        None => {
            log::warn!("Invalid mouse speed '{value}'. Defaulting to {DEFAULT_MOUSE_SPEED}");
            DEFAULT_MOUSE_SPEED
        }
    }
}

fn flag(settings: &impl SettingsStore, name: &str) -> bool {
    match settings.find(name) {
        Some(value) => {
            log::info!("{name} setting: {value}");
            truthy(value)
        }
        None => {
            log::warn!("{name} not set. Defaulting to false");
            false
        }
    }
}

fn joystick_usb_port(settings: &impl SettingsStore) -> u8 {
    let Some(value) = settings.find(param::JOYSTICK_USB_PORT) else {
        log::warn!(
            "{} not set. Defaulting to {DEFAULT_JOYSTICK_USB_PORT}",
            param::JOYSTICK_USB_PORT
        );
        return DEFAULT_JOYSTICK_USB_PORT;
    };
    log::info!("Joystick USB port setting: {value}");
    match leading_int(value) {
        Some(0) => 0,
        Some(1) => 1,
        _ => {
            log::warn!(
                "Invalid joystick USB port '{value}', defaulting to {}",
                DEFAULT_JOYSTICK_USB_PORT
            );
            DEFAULT_JOYSTICK_USB_PORT
        }
    }
}

fn layout(settings: &impl SettingsStore, name: &str) -> Layout {
    let Some(value) = settings.find(name) else {
        log::warn!("{name} not set. Defaulting to {}", Layout::Us);
        return Layout::Us;
    };
    Layout::from_name(value).unwrap_or_else(|| {
        log::warn!("Unknown keyboard layout '{value}' in {name}, using {}", Layout::Us);
        Layout::Us
    })
}

/// A settings value as written in JSON. Numbers and booleans are kept in
/// their textual form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl From<JsonValue> for String {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Text(text) => text,
            JsonValue::Number(number) => number.to_string(),
            JsonValue::Flag(flag) => flag.to_string(),
        }
    }
}

/// In-memory settings, loadable from a JSON object.
///
/// ```json
/// { "MODE": "1", "MOUSE_SPEED": 7, "KB_LAYOUT": "de" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, JsonValue>", into = "HashMap<String, String>")]
pub struct MapSettings {
    entries: HashMap<String, String>,
}

impl From<HashMap<String, JsonValue>> for MapSettings {
    fn from(raw: HashMap<String, JsonValue>) -> Self {
        Self {
            entries: raw.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

impl From<MapSettings> for HashMap<String, String> {
    fn from(settings: MapSettings) -> Self {
        settings.entries
    }
}

impl MapSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SettingsStore for MapSettings {
    fn find(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: &serde_json::Value) -> MapSettings {
        MapSettings::from_json(&value.to_string()).unwrap()
    }

    #[test]
    fn mode_numbers() {
        let mode = |v: &str| KeyboardMode::from_settings(&MapSettings::from_iter([("MODE", v)]));
        assert_eq!(mode("0"), KeyboardMode::Native);
        assert_eq!(mode("1"), KeyboardMode::Usb);
        assert_eq!(mode("2"), KeyboardMode::Bluetooth);
        assert_eq!(mode("255"), KeyboardMode::Configuration);
        assert_eq!(mode("7"), KeyboardMode::Configuration);
        assert_eq!(mode("usb"), KeyboardMode::Configuration);
        assert_eq!(mode(""), KeyboardMode::Configuration);
        assert_eq!(mode(" 2x"), KeyboardMode::Bluetooth);
        assert_eq!(
            KeyboardMode::from_settings(&MapSettings::new()),
            KeyboardMode::Configuration
        );
    }

    #[test]
    fn mode_names() {
        assert_eq!(KeyboardMode::from_name("BT"), Some(KeyboardMode::Bluetooth));
        assert_eq!(KeyboardMode::from_name("native"), Some(KeyboardMode::Native));
        assert_eq!(KeyboardMode::from_name("serial"), None);
    }

    #[test]
    fn empty_settings_give_defaults() {
        let config = IkbdConfig::load(&MapSettings::new());
        assert_eq!(config, IkbdConfig::default());
    }

    #[test]
    fn full_document() {
        let config = IkbdConfig::load(&settings(&json!({
            "MODE": 1,
            "MOUSE_SPEED": "7",
            "MOUSE_ORIGINAL": "yes",
            "JOYSTICK_USB": true,
            "JOYSTICK_USB_PORT": "0",
            "KB_LAYOUT": "DE",
            "BT_KB_LAYOUT": "fr",
        })));
        assert_eq!(config.mode, KeyboardMode::Usb);
        assert_eq!(config.mouse_speed, 7);
        assert!(config.mouse_original);
        assert!(config.joystick_usb);
        assert_eq!(config.joystick_usb_port, 0);
        assert_eq!(config.kb_layout, Layout::De);
        assert_eq!(config.bt_kb_layout, Layout::Fr);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = IkbdConfig::load(&settings(&json!({
            "MOUSE_SPEED": "fast",
            "MOUSE_ORIGINAL": "no",
            "JOYSTICK_USB_PORT": "3",
            "KB_LAYOUT": "klingon",
        })));
        assert_eq!(config.mouse_speed, DEFAULT_MOUSE_SPEED);
        assert!(!config.mouse_original);
        assert_eq!(config.joystick_usb_port, 1);
        assert_eq!(config.kb_layout, Layout::Us);
    }

    #[test]
    fn mouse_speed_is_clamped() {
        let config = IkbdConfig::load(&settings(&json!({ "MOUSE_SPEED": "42" })));
        assert_eq!(config.mouse_speed, 9);
        let config = IkbdConfig::load(&settings(&json!({ "MOUSE_SPEED": "-3" })));
        assert_eq!(config.mouse_speed, 0);
    }

    #[test]
    fn json_round_trip_keeps_strings() {
        let original = settings(&json!({ "MODE": 2, "BT_KEYBOARD": "60:C5:47:1E:01:74" }));
        let reloaded = MapSettings::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, original);
        assert_eq!(reloaded.find("MODE"), Some("2"));
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(matches!(
            MapSettings::from_json("[1, 2]"),
            Err(SettingsError::Parse(_))
        ));
    }
}
