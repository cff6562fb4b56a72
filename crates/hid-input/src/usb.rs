//! USB host HID: mount bookkeeping, report dispatch and descriptors.
//!
//! The host stack itself sits behind [`UsbHost`]. Its callbacks land on
//! [`UsbHidHandler`], which decodes boot-protocol keyboard and mouse
//! reports and falls back to a positional joystick decode for anything
//! else.

use std::fmt;

use peripheral_st_joystick::{axis, fire};
use thiserror::Error;

use crate::keyboard::{KeyboardPipeline, KeyboardReport};
use crate::ring::{HidInterface, HidInterfaceRing};
use crate::InputSink;

/// English (US) language id for string descriptor requests.
pub const LANGUAGE_ID_EN_US: u16 = 0x0409;

/// Shortest report accepted by the joystick fallback.
pub const JOYSTICK_REPORT_MIN_LEN: usize = 7;

/// High-byte value meaning "this axis is not present".
const AXIS_ABSENT: u8 = 0x7F;

/// HID interface protocol from the interface descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidProtocol {
    None,
    Keyboard,
    Mouse,
}

impl From<u8> for HidProtocol {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Keyboard,
            2 => Self::Mouse,
            _ => Self::None,
        }
    }
}

impl fmt::Display for HidProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "None",
            Self::Keyboard => "Keyboard",
            Self::Mouse => "Mouse",
        })
    }
}

/// Outcome of a failed control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("transfer failed")]
    Failed,
    #[error("endpoint stalled")]
    Stalled,
    #[error("transfer timed out")]
    Timeout,
    #[error("transfer invalid")]
    Invalid,
}

/// The parts of the USB host stack the HID handler drives.
pub trait UsbHost {
    /// Interface protocol of a mounted HID interface.
    fn interface_protocol(&self, dev_addr: u8, instance: u8) -> HidProtocol;

    /// Arm reception of the next report. False if it could not be queued.
    fn receive_report(&mut self, dev_addr: u8, instance: u8) -> bool;

    /// Queue a string descriptor fetch. False if it could not be queued.
    fn request_string(&mut self, dev_addr: u8, index: u8, language_id: u16) -> bool;

    /// Service the host stack. Called from the cooperative loop.
    fn task(&mut self) {}

    /// Next callback the stack has queued, if any.
    fn next_event(&mut self) -> Option<UsbEvent>;
}

/// A host stack callback, queued by [`UsbHost::task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbEvent {
    Mounted {
        dev_addr: u8,
        instance: u8,
    },
    Unmounted {
        dev_addr: u8,
        instance: u8,
    },
    Report {
        dev_addr: u8,
        instance: u8,
        report: Vec<u8>,
    },
    DeviceDescriptor {
        dev_addr: u8,
        result: Result<Vec<u8>, TransferError>,
    },
    StringDescriptor {
        dev_addr: u8,
        language_id: u16,
        result: Result<Vec<u8>, TransferError>,
    },
}

/// The fields of a standard device descriptor worth logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_index: u8,
}

impl DeviceDescriptor {
    pub const LEN: usize = 18;

    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::LEN {
            return None;
        }
        Some(Self {
            vendor_id: u16::from_le_bytes([raw[8], raw[9]]),
            product_id: u16::from_le_bytes([raw[10], raw[11]]),
            manufacturer_index: raw[14],
            product_index: raw[15],
            serial_index: raw[16],
        })
    }
}

/// Decode a UTF-16LE string descriptor for logging.
///
/// Stops at the descriptor length, the end of the buffer or a NUL.
/// Printable ASCII is kept, anything above ASCII becomes `?` and control
/// characters are skipped.
#[must_use]
pub fn decode_string_descriptor(raw: &[u8]) -> String {
    let Some(&desc_len) = raw.first() else {
        return String::new();
    };
    let end = usize::from(desc_len).min(raw.len());
    let mut out = String::new();
    let mut i = 2;
    while i + 1 < end {
        let unit = u16::from_le_bytes([raw[i], raw[i + 1]]);
        if unit == 0 {
            break;
        }
        if (32..128).contains(&unit) {
            out.push(char::from(unit as u8));
        } else if unit >= 128 {
            out.push('?');
        }
        i += 2;
    }
    out
}

/// Joystick state from a report that is neither keyboard nor mouse.
///
/// Layout: buttons, X low, Y low, X high, Y high, hat, extra buttons. A
/// high byte of `0x7F` means the axis is absent. Returns `(fire, axis)`
/// in port 0 encoding, or `None` for reports too short to decode.
#[must_use]
pub fn parse_joystick_report(report: &[u8]) -> Option<(u8, u8)> {
    if report.len() < JOYSTICK_REPORT_MIN_LEN {
        return None;
    }
    let x = if report[3] == AXIS_ABSENT {
        0
    } else {
        i16::from_be_bytes([report[3], report[1]])
    };
    let y = if report[4] == AXIS_ABSENT {
        0
    } else {
        i16::from_be_bytes([report[4], report[2]])
    };

    // The hat switch occupies the low nibble of byte 5.
    let buttons = (report[5] & 0xF0) | (report[0] & 0xFE) | report[6];
    let fire_bits = if buttons != 0 { fire::PORT0 } else { 0 };

    let mut axis_bits = 0;
    if y > 0 {
        axis_bits |= axis::UP;
    } else if y < 0 {
        axis_bits |= axis::DOWN;
    }
    if x > 0 {
        axis_bits |= axis::LEFT;
    } else if x < 0 {
        axis_bits |= axis::RIGHT;
    }
    log::trace!("Joystick report: x={x} y={y} buttons={buttons:#04X}");
    Some((fire_bits, axis_bits))
}

/// Boot-protocol mouse report: buttons, X, Y as signed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseReport {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
}

impl MouseReport {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;

    #[must_use]
    pub fn parse(report: &[u8]) -> Option<Self> {
        match *report {
            [buttons, x, y, ..] => Some(Self {
                buttons,
                dx: x as i8,
                dy: y as i8,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn left(&self) -> bool {
        self.buttons & Self::LEFT != 0
    }

    #[must_use]
    pub fn right(&self) -> bool {
        self.buttons & Self::RIGHT != 0
    }
}

/// Handles the host stack's HID callbacks.
pub struct UsbHidHandler {
    keyboard: KeyboardPipeline,
    interfaces: HidInterfaceRing,
}

impl UsbHidHandler {
    #[must_use]
    pub fn new(keyboard: KeyboardPipeline) -> Self {
        Self {
            keyboard,
            interfaces: HidInterfaceRing::new(),
        }
    }

    #[must_use]
    pub fn interfaces(&self) -> &HidInterfaceRing {
        &self.interfaces
    }

    pub fn interfaces_mut(&mut self) -> &mut HidInterfaceRing {
        &mut self.interfaces
    }

    #[must_use]
    pub fn keyboard(&self) -> &KeyboardPipeline {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardPipeline {
        &mut self.keyboard
    }

    /// Run the host task and handle everything it queued.
    pub fn service(&mut self, host: &mut impl UsbHost, sink: &mut impl InputSink) {
        host.task();
        while let Some(event) = host.next_event() {
            self.handle_event(host, sink, event);
        }
    }

    pub fn handle_event(
        &mut self,
        host: &mut impl UsbHost,
        sink: &mut impl InputSink,
        event: UsbEvent,
    ) {
        match event {
            UsbEvent::Mounted { dev_addr, instance } => self.mount(host, dev_addr, instance),
            UsbEvent::Unmounted { dev_addr, instance } => self.unmount(dev_addr, instance),
            UsbEvent::Report {
                dev_addr,
                instance,
                report,
            } => self.report_received(host, sink, dev_addr, instance, &report),
            UsbEvent::DeviceDescriptor { dev_addr, result } => {
                let result = result.as_deref().map_err(|e| *e);
                self.device_descriptor_complete(host, dev_addr, result);
            }
            UsbEvent::StringDescriptor {
                dev_addr,
                language_id,
                result,
            } => {
                self.string_descriptor_complete(
                    dev_addr,
                    language_id,
                    result.as_deref().map_err(|e| *e),
                );
            }
        }
    }

    /// A HID interface was mounted: remember it and start its reports.
    pub fn mount(&mut self, host: &mut impl UsbHost, dev_addr: u8, instance: u8) {
        log::info!("HID device mounted: addr={dev_addr} (instance={instance})");
        let protocol = host.interface_protocol(dev_addr, instance);
        log::info!("HID Interface Protocol = {protocol}");

        self.interfaces.push(HidInterface { dev_addr, instance });
        if !host.receive_report(dev_addr, instance) {
            log::warn!("Failed to start receiving reports from addr={dev_addr}");
        }
    }

    pub fn unmount(&mut self, dev_addr: u8, instance: u8) {
        log::info!("A device (address {dev_addr}) is unmounted. Index: {instance}");
    }

    /// Decode one report by interface protocol and re-arm reception.
    pub fn report_received(
        &mut self,
        host: &mut impl UsbHost,
        sink: &mut impl InputSink,
        dev_addr: u8,
        instance: u8,
        report: &[u8],
    ) {
        match host.interface_protocol(dev_addr, instance) {
            HidProtocol::Keyboard => match KeyboardReport::from_boot_report(report) {
                Some(kbd) => self.keyboard.handle_report(&kbd),
                None => log::trace!("Dropping short keyboard report ({} bytes)", report.len()),
            },
            HidProtocol::Mouse => {
                if let Some(mouse) = MouseReport::parse(report) {
                    sink.update_mouse(
                        i16::from(mouse.dx),
                        i16::from(mouse.dy),
                        mouse.left(),
                        mouse.right(),
                    );
                }
            }
            HidProtocol::None => {
                if let Some((fire_bits, axis_bits)) = parse_joystick_report(report) {
                    sink.set_joystick_state(fire_bits, axis_bits);
                }
            }
        }

        if !host.receive_report(dev_addr, instance) {
            log::warn!("Error: cannot request to receive report");
        }
    }

    /// Device descriptor fetch finished: log it and ask for the strings.
    pub fn device_descriptor_complete(
        &mut self,
        host: &mut impl UsbHost,
        dev_addr: u8,
        result: Result<&[u8], TransferError>,
    ) {
        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("Device descriptor request failed for device {dev_addr}: {err}");
                return;
            }
        };
        let Some(desc) = DeviceDescriptor::parse(raw) else {
            log::warn!("Device descriptor for device {dev_addr} is {} bytes", raw.len());
            return;
        };

        log::info!(
            "Device {dev_addr}: ID {:04x}:{:04x}",
            desc.vendor_id,
            desc.product_id
        );
        log::debug!("  iManufacturer = {}", desc.manufacturer_index);
        log::debug!("  iProduct      = {}", desc.product_index);
        log::debug!("  iSerialNumber = {}", desc.serial_index);

        for index in [desc.manufacturer_index, desc.product_index] {
            if index > 0 && !host.request_string(dev_addr, index, LANGUAGE_ID_EN_US) {
                log::warn!("Failed to request string {index} from device {dev_addr}");
            }
        }
    }

    /// String descriptor fetch finished. English strings are decoded,
    /// logged and returned.
    pub fn string_descriptor_complete(
        &mut self,
        dev_addr: u8,
        language_id: u16,
        result: Result<&[u8], TransferError>,
    ) -> Option<String> {
        match result {
            Ok(raw) if language_id == LANGUAGE_ID_EN_US => {
                let text = decode_string_descriptor(raw);
                log::info!("Device {dev_addr}: {text}");
                Some(text)
            }
            Ok(_) => None,
            Err(err) => {
                log::warn!("String descriptor request failed for device {dev_addr}: {err}");
                None
            }
        }
    }
}
