use std::sync::Arc;

use atari_st_keyboard::KeyStateTable;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use hid_input::KeyboardPipeline;
use hid_input::usb::{UsbHidHandler, UsbHost};
use ikbd_core::Clock;
use peripheral_st_joystick::JoystickPort;

use super::{Interval, Link, LoopControl, ModeLoop, halt_on};
use crate::board::{Board, KeyboardSource};
use crate::config::IkbdConfig;
use crate::peripherals::Peripherals;

/// RESET/CONFIG sampling and USB host servicing.
pub const SERIAL_POLL_INTERVAL_US: u64 = 20_000;
/// Joystick sampling and mouse quadrature updates.
pub const MOUSE_LINE_POLL_INTERVAL_US: u64 = 750;
/// Original-mouse decoding.
pub const ORIGINAL_MOUSE_LINE_POLL_INTERVAL_US: u64 = 2_000;

/// USB keyboards, mice and joysticks drive the emulated IKBD.
pub struct UsbLoop<B, C: Clock, D, P, H> {
    link: Link<B, C, D>,
    peripherals: Peripherals<C, P>,
    usb: UsbHidHandler,
    host: H,
    mouse_original: bool,
    joystick_usb: bool,
    joystick_usb_port: u8,
    original_mouse_timer: Interval,
    mouse_timer: Interval,
    serial_timer: Interval,
}

impl<B, C, D, P, H> UsbLoop<B, C, D, P, H>
where
    B: Board,
    C: Clock + Clone,
    D: DelayNs,
    P: InputPin,
    H: UsbHost,
{
    pub fn new(
        mut link: Link<B, C, D>,
        mut peripherals: Peripherals<C, P>,
        keys: Arc<KeyStateTable>,
        host: H,
        config: &IkbdConfig,
    ) -> Self {
        log::info!("Entering USB keyboard mode");
        link.select_source(KeyboardSource::Emulated);

        peripherals.mouse.set_sensitivity(config.mouse_speed);
        peripherals.joystick.init();

        // USB joysticks are always on in this mode.
        let mut joystick_usb = true;
        if config.joystick_usb_port == 0 && config.mouse_original {
            log::warn!("USB joystick on port 0 clashes with original mouse emulation; disabled");
            joystick_usb = false;
        }
        log::info!("Joystick type: {}", if joystick_usb { "USB" } else { "Original" });
        peripherals
            .joystick
            .init_usb(joystick_usb, config.joystick_usb_port);

        let now = link.clock().now_us();
        Self {
            link,
            peripherals,
            usb: UsbHidHandler::new(KeyboardPipeline::new(keys, config.kb_layout)),
            host,
            mouse_original: config.mouse_original,
            joystick_usb,
            joystick_usb_port: config.joystick_usb_port,
            original_mouse_timer: Interval::new(ORIGINAL_MOUSE_LINE_POLL_INTERVAL_US, now),
            mouse_timer: Interval::new(MOUSE_LINE_POLL_INTERVAL_US, now),
            serial_timer: Interval::new(SERIAL_POLL_INTERVAL_US, now),
        }
    }

    #[must_use]
    pub fn link(&self) -> &Link<B, C, D> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<B, C, D> {
        &mut self.link
    }

    #[must_use]
    pub fn peripherals(&self) -> &Peripherals<C, P> {
        &self.peripherals
    }

    #[must_use]
    pub fn usb(&self) -> &UsbHidHandler {
        &self.usb
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn joystick_usb(&self) -> bool {
        self.joystick_usb
    }

    fn sample_joysticks(&mut self) {
        if self.joystick_usb {
            let port = if self.joystick_usb_port == 1 {
                JoystickPort::UsbPrimary
            } else {
                JoystickPort::UsbSecondary
            };
            self.peripherals.update_joystick(port);
        } else {
            self.peripherals.update_joystick(JoystickPort::Joy0);
            self.peripherals.update_joystick(JoystickPort::Joy1);
        }
    }
}

impl<B, C, D, P, H> ModeLoop for UsbLoop<B, C, D, P, H>
where
    B: Board,
    C: Clock + Clone,
    D: DelayNs,
    P: InputPin,
    H: UsbHost,
{
    fn poll(&mut self) -> LoopControl {
        halt_on!(self.link.config_requested_at_start());

        let now = self.link.clock().now_us();
        self.link.handle_rx();

        if self.original_mouse_timer.due(now) && self.mouse_original {
            self.peripherals.update_joystick(JoystickPort::OriginalMouse);
            self.peripherals.advance_mouse();
        }

        if self.mouse_timer.due(now) {
            self.sample_joysticks();
            if !self.mouse_original {
                self.peripherals.advance_mouse();
            }
        }

        if self.serial_timer.due(now) {
            self.link.watch_reset_line();
            halt_on!(self.link.watch_config_line());
            self.usb.service(&mut self.host, &mut self.peripherals);
        }

        self.link.handle_reset_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{VirtualBoard, unconnected_joystick};
    use crate::modes::Halt;
    use crate::modes::testing::rig_with_clock;
    use hid_input::usb::{HidProtocol, UsbEvent};
    use ikbd_core::ManualClock;
    use peripheral_st_mouse::MouseEmulator;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Host {
        protocol: Option<HidProtocol>,
        events: VecDeque<UsbEvent>,
        tasks: u32,
    }

    impl UsbHost for Host {
        fn interface_protocol(&self, _dev_addr: u8, _instance: u8) -> HidProtocol {
            self.protocol.unwrap_or(HidProtocol::None)
        }

        fn receive_report(&mut self, _dev_addr: u8, _instance: u8) -> bool {
            true
        }

        fn request_string(&mut self, _dev_addr: u8, _index: u8, _language_id: u16) -> bool {
            true
        }

        fn task(&mut self) {
            self.tasks += 1;
        }

        fn next_event(&mut self) -> Option<UsbEvent> {
            self.events.pop_front()
        }
    }

    type Loop = UsbLoop<
        VirtualBoard,
        ManualClock,
        crate::delay::NoDelay,
        crate::board::FloatingPin,
        Host,
    >;

    fn usb_loop(config: &IkbdConfig, host: Host) -> (Loop, ManualClock, Arc<KeyStateTable>) {
        let keys = Arc::new(KeyStateTable::new());
        let clock = ManualClock::new();
        let mouse = MouseEmulator::new(clock.clone(), &mut SmallRng::seed_from_u64(7));
        let peripherals = Peripherals::new(mouse, unconnected_joystick());
        let state = peripherals.state(Arc::clone(&keys));
        let rig = rig_with_clock(VirtualBoard::new(), state, clock.clone());
        let mode = UsbLoop::new(rig.link, peripherals, Arc::clone(&keys), host, config);
        (mode, clock, keys)
    }

    #[test]
    fn selects_emulated_source_and_forces_usb_joystick() {
        let (mode, _clock, _keys) = usb_loop(&IkbdConfig::default(), Host::default());
        assert_eq!(mode.link().board().source(), KeyboardSource::Emulated);
        assert!(mode.joystick_usb());
        assert_eq!(mode.peripherals().mouse.sensitivity(), 5);
    }

    #[test]
    fn port0_with_original_mouse_disables_usb_joystick() {
        let config = IkbdConfig {
            mouse_original: true,
            joystick_usb_port: 0,
            ..IkbdConfig::default()
        };
        let (mode, _clock, _keys) = usb_loop(&config, Host::default());
        assert!(!mode.joystick_usb());
    }

    #[test]
    fn keyboard_reports_reach_key_table_on_serial_tick() {
        let host = Host {
            protocol: Some(HidProtocol::Keyboard),
            events: VecDeque::from([
                UsbEvent::Mounted {
                    dev_addr: 1,
                    instance: 0,
                },
                UsbEvent::Report {
                    dev_addr: 1,
                    instance: 0,
                    report: vec![0, 0, 0x04, 0, 0, 0, 0, 0],
                },
            ]),
            tasks: 0,
        };
        let (mut mode, clock, keys) = usb_loop(&IkbdConfig::default(), host);
        assert_eq!(mode.poll(), LoopControl::Continue);
        assert!(keys.pressed().next().is_none());
        clock.advance(SERIAL_POLL_INTERVAL_US);
        assert_eq!(mode.poll(), LoopControl::Continue);
        assert_eq!(mode.host().tasks, 1);
        assert!(keys.is_down(atari_st_keyboard::scancode::A));
        assert_eq!(mode.usb().interfaces().len(), 1);
    }

    #[test]
    fn config_edge_is_sampled_every_20ms() {
        let (mut mode, clock, _keys) = usb_loop(&IkbdConfig::default(), Host::default());
        mode.link_mut().board_mut().config = true;
        assert_eq!(mode.poll(), LoopControl::Continue);
        clock.advance(SERIAL_POLL_INTERVAL_US);
        assert_eq!(mode.poll(), LoopControl::Halt(Halt::Configuration));
    }
}
