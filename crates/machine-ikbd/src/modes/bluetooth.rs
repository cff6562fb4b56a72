use std::sync::Arc;

use atari_st_keyboard::KeyStateTable;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use hid_input::KeyboardPipeline;
use hid_input::bluetooth::{AllowList, BluetoothStack, IkbdBluetooth};
use ikbd_core::{Clock, SettingsStore};

use super::{Interval, Link, LoopControl, ModeLoop, halt_on};
use crate::board::{Board, KeyboardSource};
use crate::config::IkbdConfig;
use crate::peripherals::Peripherals;

/// Mouse quadrature updates while Bluetooth drives the pointer.
pub const BT_MOUSE_UPDATE_INTERVAL_US: u64 = 1_000;

/// Bluetooth keyboards, mice and gamepads drive the emulated IKBD.
/// Gamepads always land on joystick port 1.
pub struct BluetoothLoop<B, C: Clock, D, P, S> {
    link: Link<B, C, D>,
    platform: IkbdBluetooth<Peripherals<C, P>>,
    stack: S,
    mouse_timer: Interval,
}

impl<B, C, D, P, S> BluetoothLoop<B, C, D, P, S>
where
    B: Board,
    C: Clock + Clone,
    D: DelayNs,
    P: InputPin,
    S: BluetoothStack,
{
    pub fn new(
        mut link: Link<B, C, D>,
        mut peripherals: Peripherals<C, P>,
        keys: Arc<KeyStateTable>,
        mut stack: S,
        config: &IkbdConfig,
        settings: &impl SettingsStore,
    ) -> Self {
        log::info!("Entering Bluetooth keyboard mode");

        let mut allow_list = AllowList::new();
        allow_list.load(settings);

        peripherals.joystick.init();
        peripherals.joystick.init_usb(true, 1);
        peripherals.mouse.set_sensitivity(config.mouse_speed);
        log::info!("Mouse speed: {}", peripherals.mouse.sensitivity());

        let keyboard = KeyboardPipeline::new(keys, config.bt_kb_layout);
        let mut platform = IkbdBluetooth::new(allow_list, keyboard, peripherals);

        link.select_source(KeyboardSource::Emulated);
        stack.init(&mut platform);

        let now = link.clock().now_us();
        Self {
            link,
            platform,
            stack,
            mouse_timer: Interval::new(BT_MOUSE_UPDATE_INTERVAL_US, now),
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
    pub fn platform(&self) -> &IkbdBluetooth<Peripherals<C, P>> {
        &self.platform
    }

    #[must_use]
    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }
}

impl<B, C, D, P, S> ModeLoop for BluetoothLoop<B, C, D, P, S>
where
    B: Board,
    C: Clock + Clone,
    D: DelayNs,
    P: InputPin,
    S: BluetoothStack,
{
    fn poll(&mut self) -> LoopControl {
        halt_on!(self.link.config_requested_at_start());

        let now = self.link.clock().now_us();
        if self.mouse_timer.due(now) {
            self.platform.sink_mut().advance_mouse();
        }

        self.link.handle_rx();
        halt_on!(self.link.handle_reset_sequence());
        halt_on!(self.link.watch_config_line());

        self.stack.poll(&mut self.platform);
        LoopControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{FloatingPin, VirtualBoard, unconnected_joystick};
    use crate::config::MapSettings;
    use crate::delay::NoDelay;
    use crate::modes::Halt;
    use crate::modes::testing::rig_with_clock;
    use hid_input::bluetooth::{
        AllowSlot, BdAddr, BluetoothPlatform, BtDevice, ControllerData, Gamepad, Keyboard,
        ScanControl, dpad,
    };
    use ikbd_core::ManualClock;
    use peripheral_st_mouse::MouseEmulator;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    const GAMEPAD_COD: u32 = 0x0508;
    const KEYBOARD_COD: u32 = 0x0540;

    #[derive(Default)]
    struct Stack {
        scanning: bool,
        polls: u32,
        pending: Vec<(BtDevice, ControllerData)>,
    }

    impl ScanControl for Stack {
        fn start_scanning_and_autoconnect(&mut self) {
            self.scanning = true;
        }
    }

    impl BluetoothStack for Stack {
        fn init(&mut self, platform: &mut dyn BluetoothPlatform) {
            platform.init();
            platform.on_init_complete(self);
        }

        fn poll(&mut self, platform: &mut dyn BluetoothPlatform) {
            self.polls += 1;
            for (device, data) in self.pending.drain(..) {
                platform.on_controller_data(&device, &data);
            }
        }
    }

    fn device(cod: u32) -> BtDevice {
        BtDevice {
            addr: BdAddr([0x60, 0xC5, 0x47, 0x1E, 0x01, 0x02]),
            cod,
            name: "pad".to_string(),
        }
    }

    type Loop = BluetoothLoop<VirtualBoard, ManualClock, NoDelay, FloatingPin, Stack>;

    fn bt_loop(board: VirtualBoard, settings: &MapSettings) -> (Loop, Arc<KeyStateTable>) {
        let keys = Arc::new(KeyStateTable::new());
        let clock = ManualClock::new();
        let mouse = MouseEmulator::new(clock.clone(), &mut SmallRng::seed_from_u64(3));
        let peripherals = Peripherals::new(mouse, unconnected_joystick());
        let state = peripherals.state(Arc::clone(&keys));
        let rig = rig_with_clock(board, state, clock);
        let mode = BluetoothLoop::new(
            rig.link,
            peripherals,
            Arc::clone(&keys),
            Stack::default(),
            &IkbdConfig::default(),
            settings,
        );
        (mode, keys)
    }

    #[test]
    fn init_starts_scanning_with_loaded_allow_list() {
        let settings: MapSettings = [("BT_KEYBOARD", "AA:BB:CC:DD:EE:FF")].into_iter().collect();
        let (mode, _keys) = bt_loop(VirtualBoard::new(), &settings);
        assert!(mode.stack().scanning);
        assert_eq!(mode.link().board().source(), KeyboardSource::Emulated);
        assert_eq!(
            mode.platform().allow_list().get(AllowSlot::Keyboard),
            Some(BdAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
        );
        assert_eq!(mode.platform().sink().mouse.sensitivity(), 5);
        assert_eq!(mode.platform().sink().joystick.usb_port(), 1);
    }

    #[test]
    fn gamepad_drives_joystick_port_1() {
        let (mut mode, _keys) = bt_loop(VirtualBoard::new(), &MapSettings::new());
        let pad = Gamepad {
            dpad: dpad::UP,
            ..Gamepad::default()
        };
        mode.stack_mut()
            .pending
            .push((device(GAMEPAD_COD), ControllerData::Gamepad(pad)));
        assert_eq!(mode.poll(), LoopControl::Continue);
        assert_eq!(mode.stack().polls, 1);
        let (_fire, axis) = mode.platform().sink().joystick.get_state();
        assert_ne!(axis & 0xF0, 0);
    }

    #[test]
    fn keyboard_data_reaches_key_table() {
        let (mut mode, keys) = bt_loop(VirtualBoard::new(), &MapSettings::new());
        let mut kb = Keyboard::default();
        kb.pressed_keys[0] = 0x04;
        mode.stack_mut()
            .pending
            .push((device(KEYBOARD_COD), ControllerData::Keyboard(kb)));
        mode.poll();
        assert!(keys.is_down(atari_st_keyboard::scancode::A));
    }

    #[test]
    fn config_at_start_skips_the_stack() {
        let mut board = VirtualBoard::new();
        board.config = true;
        let (mut mode, _keys) = bt_loop(board, &MapSettings::new());
        assert_eq!(mode.poll(), LoopControl::Halt(Halt::Configuration));
        assert_eq!(mode.stack().polls, 0);
    }
}
