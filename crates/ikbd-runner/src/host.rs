//! Window and gamepad input, presented as the host stacks the mode loops
//! expect.
//!
//! The window thread sends [`HostInput`] over a channel. In USB mode,
//! [`WindowUsbHost`] turns it into a boot keyboard, a boot mouse and a
//! joystick on three device addresses. In Bluetooth mode,
//! [`WindowBluetooth`] announces the same devices as Bluetooth peripherals
//! and delivers controller data.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;

use machine_ikbd::hid_input::bluetooth::{
    self, BdAddr, BluetoothPlatform, BluetoothStack, BtDevice, ControllerData, ScanControl,
    Verdict, mouse_button,
};
use machine_ikbd::hid_input::usb::{DeviceDescriptor, HidProtocol, UsbEvent, UsbHost};

use crate::gamepad::{Gamepads, PadSnapshot};

/// Input events from the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostInput {
    /// A boot keyboard report.
    Keyboard([u8; 8]),
    /// Relative motion and the button state (bit 0 left, bit 1 right).
    Mouse { buttons: u8, dx: i32, dy: i32 },
}

pub const KEYBOARD_ADDR: u8 = 1;
pub const MOUSE_ADDR: u8 = 2;
pub const JOYSTICK_ADDR: u8 = 3;

const VENDOR_ID: u16 = 0x1209;
const STRINGS: [&str; 2] = ["ikbd-runner", "Host input"];

/// Boot mouse reports, with large moves split into i8 steps.
#[must_use]
pub fn mouse_reports(buttons: u8, dx: i32, dy: i32) -> Vec<[u8; 3]> {
    let mut reports = Vec::new();
    let (mut dx, mut dy) = (dx, dy);
    loop {
        let sx = dx.clamp(-127, 127);
        let sy = dy.clamp(-127, 127);
        reports.push([buttons, sx as i8 as u8, sy as i8 as u8]);
        dx -= sx;
        dy -= sy;
        if dx == 0 && dy == 0 {
            return reports;
        }
    }
}

fn device_descriptor(product_id: u16) -> Vec<u8> {
    let mut raw = vec![0u8; DeviceDescriptor::LEN];
    raw[0] = DeviceDescriptor::LEN as u8;
    raw[1] = 0x01;
    raw[8..10].copy_from_slice(&VENDOR_ID.to_le_bytes());
    raw[10..12].copy_from_slice(&product_id.to_le_bytes());
    raw[14] = 1;
    raw[15] = 2;
    raw
}

fn string_descriptor(text: &str) -> Vec<u8> {
    let mut raw = vec![0u8, 0x03];
    for unit in text.encode_utf16() {
        raw.extend_from_slice(&unit.to_le_bytes());
    }
    raw[0] = raw.len() as u8;
    raw
}

/// The USB host stack, fed by the window and gilrs.
pub struct WindowUsbHost {
    input: Receiver<HostInput>,
    gamepads: Gamepads,
    events: VecDeque<UsbEvent>,
    joystick_mounted: bool,
}

impl WindowUsbHost {
    /// Keyboard and mouse are mounted straight away; the joystick when a
    /// gamepad first moves.
    #[must_use]
    pub fn new(input: Receiver<HostInput>, gamepads: Gamepads) -> Self {
        let mut host = Self {
            input,
            gamepads,
            events: VecDeque::new(),
            joystick_mounted: false,
        };
        host.mount(KEYBOARD_ADDR);
        host.mount(MOUSE_ADDR);
        host
    }

    fn mount(&mut self, dev_addr: u8) {
        self.events.push_back(UsbEvent::Mounted {
            dev_addr,
            instance: 0,
        });
        self.events.push_back(UsbEvent::DeviceDescriptor {
            dev_addr,
            result: Ok(device_descriptor(u16::from(dev_addr))),
        });
    }

    fn report(&mut self, dev_addr: u8, report: Vec<u8>) {
        self.events.push_back(UsbEvent::Report {
            dev_addr,
            instance: 0,
            report,
        });
    }
}

impl UsbHost for WindowUsbHost {
    fn interface_protocol(&self, dev_addr: u8, _instance: u8) -> HidProtocol {
        match dev_addr {
            KEYBOARD_ADDR => HidProtocol::Keyboard,
            MOUSE_ADDR => HidProtocol::Mouse,
            _ => HidProtocol::None,
        }
    }

    fn receive_report(&mut self, dev_addr: u8, _instance: u8) -> bool {
        (KEYBOARD_ADDR..=JOYSTICK_ADDR).contains(&dev_addr)
    }

    fn request_string(&mut self, dev_addr: u8, index: u8, language_id: u16) -> bool {
        let Some(text) = STRINGS.get(usize::from(index).wrapping_sub(1)) else {
            return false;
        };
        self.events.push_back(UsbEvent::StringDescriptor {
            dev_addr,
            language_id,
            result: Ok(string_descriptor(text)),
        });
        true
    }

    fn task(&mut self) {
        while let Ok(input) = self.input.try_recv() {
            match input {
                HostInput::Keyboard(report) => self.report(KEYBOARD_ADDR, report.to_vec()),
                HostInput::Mouse { buttons, dx, dy } => {
                    for report in mouse_reports(buttons, dx, dy) {
                        self.report(MOUSE_ADDR, report.to_vec());
                    }
                }
            }
        }

        for (_, pad) in self.gamepads.poll() {
            if !self.joystick_mounted {
                self.mount(JOYSTICK_ADDR);
                self.joystick_mounted = true;
            }
            self.report(JOYSTICK_ADDR, pad.to_usb_report().to_vec());
        }
    }

    fn next_event(&mut self) -> Option<UsbEvent> {
        self.events.pop_front()
    }
}

const KEYBOARD_COD: u32 = 0x0540;
const MOUSE_COD: u32 = 0x0580;
const GAMEPAD_COD: u32 = 0x0508;

fn addr(last: u8) -> BdAddr {
    BdAddr([0x02, 0x00, 0x5E, 0x10, 0x00, last])
}

/// A peripheral the stack has offered to the platform.
struct Peer {
    device: BtDevice,
    accepted: bool,
}

/// The Bluetooth stack, fed by the window and gilrs.
pub struct WindowBluetooth {
    input: Receiver<HostInput>,
    gamepads: Gamepads,
    scanning: bool,
    keyboard: Option<Peer>,
    mouse: Option<Peer>,
    pads: Vec<(gilrs::GamepadId, Peer)>,
}

impl WindowBluetooth {
    #[must_use]
    pub fn new(input: Receiver<HostInput>, gamepads: Gamepads) -> Self {
        Self {
            input,
            gamepads,
            scanning: false,
            keyboard: None,
            mouse: None,
            pads: Vec::new(),
        }
    }

    /// Offer a device; it connects if the platform accepts it.
    fn discover(platform: &mut dyn BluetoothPlatform, device: BtDevice) -> Peer {
        let verdict =
            platform.on_device_discovered(device.addr, Some(&device.name), device.cod, -40);
        let mut accepted = verdict == Verdict::Accept;
        if accepted {
            platform.on_device_connected(&device);
            accepted = platform.on_device_ready(&device) == Verdict::Accept;
        }
        if !accepted {
            log::info!("{} ({}) not accepted", device.name, device.addr);
        }
        Peer { device, accepted }
    }

    fn deliver(platform: &mut dyn BluetoothPlatform, peer: Option<&Peer>, data: &ControllerData) {
        if let Some(peer) = peer.filter(|p| p.accepted) {
            platform.on_controller_data(&peer.device, data);
        }
    }

    fn gamepad(
        &mut self,
        platform: &mut dyn BluetoothPlatform,
        id: gilrs::GamepadId,
        pad: &PadSnapshot,
    ) {
        let index = match self.pads.iter().position(|(pad_id, _)| *pad_id == id) {
            Some(index) => index,
            None => {
                let last = 0x10u8.wrapping_add(usize::from(id) as u8);
                let device = BtDevice {
                    addr: addr(last),
                    cod: GAMEPAD_COD,
                    name: format!("Gamepad {id}"),
                };
                self.pads.push((id, Self::discover(platform, device)));
                self.pads.len() - 1
            }
        };
        let data = ControllerData::Gamepad(pad.to_bluetooth());
        Self::deliver(platform, Some(&self.pads[index].1), &data);
    }
}

impl ScanControl for WindowBluetooth {
    fn start_scanning_and_autoconnect(&mut self) {
        self.scanning = true;
    }
}

impl BluetoothStack for WindowBluetooth {
    fn init(&mut self, platform: &mut dyn BluetoothPlatform) {
        platform.init();
        platform.on_init_complete(self);
    }

    fn poll(&mut self, platform: &mut dyn BluetoothPlatform) {
        if !self.scanning {
            return;
        }
        if self.keyboard.is_none() {
            let device = BtDevice {
                addr: addr(0x01),
                cod: KEYBOARD_COD,
                name: "Host keyboard".to_string(),
            };
            self.keyboard = Some(Self::discover(platform, device));
        }
        if self.mouse.is_none() {
            let device = BtDevice {
                addr: addr(0x02),
                cod: MOUSE_COD,
                name: "Host mouse".to_string(),
            };
            self.mouse = Some(Self::discover(platform, device));
        }

        while let Ok(input) = self.input.try_recv() {
            match input {
                HostInput::Keyboard(report) => {
                    let mut keyboard = bluetooth::Keyboard {
                        modifiers: report[0],
                        ..bluetooth::Keyboard::default()
                    };
                    keyboard.pressed_keys[..6].copy_from_slice(&report[2..]);
                    let data = ControllerData::Keyboard(keyboard);
                    Self::deliver(platform, self.keyboard.as_ref(), &data);
                }
                HostInput::Mouse { buttons, dx, dy } => {
                    let mut mouse = bluetooth::Mouse {
                        delta_x: dx,
                        delta_y: dy,
                        ..bluetooth::Mouse::default()
                    };
                    if buttons & 0x01 != 0 {
                        mouse.buttons |= mouse_button::LEFT;
                    }
                    if buttons & 0x02 != 0 {
                        mouse.buttons |= mouse_button::RIGHT;
                    }
                    let data = ControllerData::Mouse(mouse);
                    Self::deliver(platform, self.mouse.as_ref(), &data);
                }
            }
        }

        for (id, pad) in self.gamepads.poll() {
            self.gamepad(platform, id, &pad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn large_mouse_moves_are_split() {
        let reports = mouse_reports(0x01, 300, -10);
        assert_eq!(
            reports,
            vec![[0x01, 127, 0xF6], [0x01, 127, 0], [0x01, 46, 0]]
        );
        assert_eq!(mouse_reports(0, 0, 0), vec![[0, 0, 0]]);
    }

    #[test]
    fn usb_host_mounts_keyboard_and_mouse() {
        let (_tx, rx) = mpsc::channel();
        let mut host = WindowUsbHost::new(rx, Gamepads::disabled());
        let mut mounted = Vec::new();
        while let Some(event) = host.next_event() {
            if let UsbEvent::Mounted { dev_addr, .. } = event {
                mounted.push(dev_addr);
            }
        }
        assert_eq!(mounted, vec![KEYBOARD_ADDR, MOUSE_ADDR]);
        assert_eq!(host.interface_protocol(KEYBOARD_ADDR, 0), HidProtocol::Keyboard);
        assert_eq!(host.interface_protocol(MOUSE_ADDR, 0), HidProtocol::Mouse);
        assert_eq!(host.interface_protocol(JOYSTICK_ADDR, 0), HidProtocol::None);
    }

    #[test]
    fn window_input_becomes_reports() {
        let (tx, rx) = mpsc::channel();
        let mut host = WindowUsbHost::new(rx, Gamepads::disabled());
        while host.next_event().is_some() {}
        tx.send(HostInput::Keyboard([0, 0, 0x04, 0, 0, 0, 0, 0])).unwrap();
        tx.send(HostInput::Mouse {
            buttons: 2,
            dx: 5,
            dy: -3,
        })
        .unwrap();
        host.task();
        assert_eq!(
            host.next_event(),
            Some(UsbEvent::Report {
                dev_addr: KEYBOARD_ADDR,
                instance: 0,
                report: vec![0, 0, 0x04, 0, 0, 0, 0, 0],
            })
        );
        assert_eq!(
            host.next_event(),
            Some(UsbEvent::Report {
                dev_addr: MOUSE_ADDR,
                instance: 0,
                report: vec![2, 5, 0xFD],
            })
        );
        assert_eq!(host.next_event(), None);
    }

    #[test]
    fn string_requests_are_answered_in_utf16() {
        let (_tx, rx) = mpsc::channel();
        let mut host = WindowUsbHost::new(rx, Gamepads::disabled());
        while host.next_event().is_some() {}
        assert!(host.request_string(KEYBOARD_ADDR, 1, 0x0409));
        assert!(!host.request_string(KEYBOARD_ADDR, 0, 0x0409));
        let Some(UsbEvent::StringDescriptor { result, .. }) = host.next_event() else {
            panic!("expected a string descriptor");
        };
        let raw = result.unwrap();
        assert_eq!(
            machine_ikbd::hid_input::usb::decode_string_descriptor(&raw),
            "ikbd-runner"
        );
    }
}
