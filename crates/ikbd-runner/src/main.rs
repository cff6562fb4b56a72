//! Desktop runner for the IKBD machine.
//!
//! Loads an HD6301 keyboard ROM and a settings file, then runs the two
//! execution contexts on threads: the CPU context paced to real time, and
//! the mode loop chosen by `MODE`. A window supplies the keyboard and
//! mouse; gilrs supplies gamepads. Bytes the IKBD sends to the ST are
//! printed as hex on stdout.

mod board;
mod gamepad;
mod host;
mod keymap;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use machine_ikbd::atari_st_keyboard::KeyStateTable;
use machine_ikbd::board::{FloatingPin, unconnected_joystick};
use machine_ikbd::delay::StdDelay;
use machine_ikbd::ikbd_core::SystemClock;
use machine_ikbd::peripheral_st_mouse::MouseEmulator;
use machine_ikbd::serial::ChannelUart;
use machine_ikbd::{
    BluetoothLoop, ConfigurationLoop, Halt, IkbdConfig, IkbdCore, IkbdPorts, KeyMatrix,
    KeyboardMode, Link, LoopControl, MapSettings, ModeLoop, NativeLoop, Peripherals, SerialPort,
    UartConfig, UsbLoop,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::board::{Lines, RunnerBoard};
use crate::gamepad::Gamepads;
use crate::host::{HostInput, WindowBluetooth, WindowUsbHost};
use crate::keymap::BootKeyboard;

const DEFAULT_HEADLESS_SECONDS: u64 = 5;
/// Sleep between mode loop iterations.
const POLL_SLEEP: Duration = Duration::from_micros(100);
/// Bytes closer together than this share a line of output.
const PRINT_GAP: Duration = Duration::from_millis(20);
/// How often the window checks its deadline.
const WINDOW_TICK: Duration = Duration::from_millis(50);

struct CliArgs {
    rom_path: PathBuf,
    settings_path: Option<PathBuf>,
    mode: Option<KeyboardMode>,
    headless: bool,
    seconds: Option<u64>,
    send: Vec<u8>,
    seed: Option<u64>,
}

fn print_usage_and_exit(code: i32) -> ! {
    eprintln!("Usage: ikbd-runner [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --rom <file>        HD6301 keyboard ROM (or use IKBD_ROM env var)");
    eprintln!("  --settings <file>   JSON settings document");
    eprintln!("  --mode <mode>       native, usb, bt or config [default: from settings]");
    eprintln!("  --headless          Run without a window");
    eprintln!(
        "  --seconds <n>       Stop after n seconds [default: {DEFAULT_HEADLESS_SECONDS} headless]"
    );
    eprintln!("  --send <bytes>      Hex bytes from the ST, e.g. \"80 01\"");
    eprintln!("  --seed <n>          Seed for the mouse's starting phase");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Window keys: F11 holds CONFIG, Pause toggles RESET, F12 quits.");
    process::exit(code);
}

/// Whitespace- or comma-separated hex bytes, with or without `0x`.
fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, String> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(digits, 16).map_err(|_| format!("Invalid hex byte: {token}"))
        })
        .collect()
}

fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut rom_path: Option<PathBuf> = None;
    let mut settings_path: Option<PathBuf> = None;
    let mut mode = None;
    let mut headless = false;
    let mut seconds = None;
    let mut send = Vec::new();
    let mut seed = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom" => {
                i += 1;
                rom_path = args.get(i).map(PathBuf::from);
            }
            "--settings" => {
                i += 1;
                settings_path = args.get(i).map(PathBuf::from);
            }
            "--mode" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Missing value for --mode");
                    print_usage_and_exit(1);
                };
                mode = Some(KeyboardMode::from_name(value).unwrap_or_else(|| {
                    eprintln!("Unknown mode: {value}");
                    print_usage_and_exit(1);
                }));
            }
            "--headless" => {
                headless = true;
            }
            "--seconds" => {
                i += 1;
                seconds = args.get(i).and_then(|v| v.parse().ok());
            }
            "--send" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Missing value for --send");
                    print_usage_and_exit(1);
                };
                send = parse_hex_bytes(value).unwrap_or_else(|e| {
                    eprintln!("{e}");
                    print_usage_and_exit(1);
                });
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|v| v.parse().ok());
            }
            "-h" | "--help" => print_usage_and_exit(0),
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage_and_exit(1);
            }
        }
        i += 1;
    }

    let rom_path = rom_path
        .or_else(|| std::env::var_os("IKBD_ROM").map(PathBuf::from))
        .unwrap_or_else(|| {
            eprintln!("No IKBD ROM specified.");
            print_usage_and_exit(1);
        });

    CliArgs {
        rom_path,
        settings_path,
        mode,
        headless,
        seconds,
        send,
        seed,
    }
}

/// Settings from `path`, or none. A bad file is reported and ignored.
fn load_settings(path: Option<&Path>) -> MapSettings {
    let Some(path) = path else {
        log::info!("No settings file, using defaults");
        return MapSettings::new();
    };
    match MapSettings::from_file(path) {
        Ok(settings) => {
            log::info!("Loaded {} settings from {}", settings.len(), path.display());
            settings
        }
        Err(e) => {
            log::warn!("{e}; using defaults");
            MapSettings::new()
        }
    }
}

/// Print everything the IKBD sends, one line per burst.
fn spawn_printer(bytes: Receiver<u8>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut pending = Vec::new();
        loop {
            match bytes.recv_timeout(PRINT_GAP) {
                Ok(byte) => pending.push(byte),
                Err(RecvTimeoutError::Timeout) => {
                    if !pending.is_empty() {
                        println!("{}", format_hex(&pending));
                        pending.clear();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if !pending.is_empty() {
                        println!("{}", format_hex(&pending));
                    }
                    return;
                }
            }
        }
    })
}

type RunnerLink = Link<RunnerBoard, SystemClock, StdDelay>;
type RunnerPeripherals = Peripherals<SystemClock, FloatingPin>;

/// What the mode loop thread takes ownership of.
struct ModeContext {
    config: IkbdConfig,
    settings: MapSettings,
    link: RunnerLink,
    peripherals: RunnerPeripherals,
    keys: Arc<KeyStateTable>,
    serial: SerialPort<ChannelUart>,
    input: Receiver<HostInput>,
    quit: Arc<AtomicBool>,
}

/// Poll until the loop halts or the runner quits. The serial interrupt is
/// serviced before each iteration.
fn drive(
    mode: &mut impl ModeLoop,
    serial: &mut SerialPort<ChannelUart>,
    quit: &AtomicBool,
) -> Option<Halt> {
    while !quit.load(Ordering::Acquire) {
        serial.on_rx_interrupt();
        if let LoopControl::Halt(halt) = mode.poll() {
            return Some(halt);
        }
        thread::sleep(POLL_SLEEP);
    }
    None
}

fn run_mode_loop(ctx: ModeContext) -> Option<Halt> {
    let ModeContext {
        config,
        settings,
        link,
        peripherals,
        keys,
        mut serial,
        input,
        quit,
    } = ctx;

    match config.mode {
        KeyboardMode::Native => drive(&mut NativeLoop::new(link), &mut serial, &quit),
        KeyboardMode::Usb => {
            let host = WindowUsbHost::new(input, Gamepads::new());
            let mut mode = UsbLoop::new(link, peripherals, keys, host, &config);
            drive(&mut mode, &mut serial, &quit)
        }
        KeyboardMode::Bluetooth => {
            let stack = WindowBluetooth::new(input, Gamepads::new());
            let mut mode = BluetoothLoop::new(link, peripherals, keys, stack, &config, &settings);
            drive(&mut mode, &mut serial, &quit)
        }
        KeyboardMode::Configuration => {
            drive(&mut ConfigurationLoop::new(link), &mut serial, &quit)
        }
    }
}

struct App {
    window: Option<Window>,
    input: Sender<HostInput>,
    lines: Lines,
    keyboard: BootKeyboard,
    buttons: u8,
    focused: bool,
    deadline: Option<Instant>,
    done: Arc<AtomicBool>,
}

impl App {
    fn send(&self, input: HostInput) {
        if self.input.send(input).is_err() {
            log::debug!("Mode loop gone, dropping {input:?}");
        }
    }

    fn handle_keyboard_input(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;

        match code {
            KeyCode::F12 if pressed => {
                event_loop.exit();
                return;
            }
            KeyCode::F11 => {
                self.lines.config.store(pressed, Ordering::Release);
                return;
            }
            KeyCode::Pause => {
                if pressed && !event.repeat {
                    let level = Lines::toggle(&self.lines.reset);
                    log::info!("RESET line {}", if level { "high" } else { "low" });
                }
                return;
            }
            _ => {}
        }

        if event.repeat {
            return;
        }
        let Some(usage) = keymap::usage(code) else {
            log::debug!("No HID usage for {code:?}");
            return;
        };
        if self.keyboard.key(usage, pressed) {
            self.send(HostInput::Keyboard(self.keyboard.report()));
        }
    }

    fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        let bit = match button {
            MouseButton::Left => 0x01,
            MouseButton::Right => 0x02,
            _ => return,
        };
        if state == ElementState::Pressed {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
        self.send(HostInput::Mouse {
            buttons: self.buttons,
            dx: 0,
            dy: 0,
        });
    }

    fn release_everything(&mut self) {
        self.keyboard.release_all();
        self.buttons = 0;
        self.send(HostInput::Keyboard(self.keyboard.report()));
        self.send(HostInput::Mouse {
            buttons: 0,
            dx: 0,
            dy: 0,
        });
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("IKBD Runner (F11 CONFIG, F12 quit)")
            .with_inner_size(winit::dpi::LogicalSize::new(640, 400))
            .with_resizable(false);

        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                eprintln!("Failed to create window: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Focused(focused) => {
                self.focused = focused;
                if !focused {
                    self.release_everything();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_keyboard_input(event_loop, event);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(button, state);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        match event {
            DeviceEvent::MouseMotion { delta: (dx, dy) } if self.focused => {
                self.send(HostInput::Mouse {
                    buttons: self.buttons,
                    dx: dx.round() as i32,
                    dy: dy.round() as i32,
                });
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let expired = self.deadline.is_some_and(|deadline| now >= deadline);
        if expired || self.done.load(Ordering::Acquire) {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(now + WINDOW_TICK));
    }
}

fn run_window(app: &mut App) {
    let event_loop = match EventLoop::new() {
        Ok(loop_) => loop_,
        Err(e) => {
            eprintln!("Failed to create event loop: {e}");
            return;
        }
    };
    if let Err(e) = event_loop.run_app(app) {
        eprintln!("Event loop error: {e}");
    }
}

/// The matrix the ROM scans. A ROM that reports no keys gets the
/// column-major layout.
fn learn_matrix(rom: &[u8]) -> KeyMatrix {
    match KeyMatrix::learn(rom) {
        Ok(matrix) if matrix.assigned() > 0 => {
            log::info!("Keyboard matrix: {} keys", matrix.assigned());
            matrix
        }
        Ok(_) => {
            log::warn!("ROM reported no keys; using column-major matrix");
            KeyMatrix::column_major()
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = parse_args();

    let rom = match fs::read(&cli.rom_path) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("Failed to read ROM {}: {e}", cli.rom_path.display());
            process::exit(1);
        }
    };
    let settings = load_settings(cli.settings_path.as_deref());
    let mut config = IkbdConfig::load(&settings);
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    log::info!("Mode: {}", config.mode);

    let clock = SystemClock::new();
    let mut rng = match cli.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let peripherals = Peripherals::new(MouseEmulator::new(clock, &mut rng), unconnected_joystick());
    let keys = Arc::new(KeyStateTable::new());
    let state = peripherals
        .state(Arc::clone(&keys))
        .with_matrix(learn_matrix(&rom));

    let (tx, from_ikbd) = mpsc::channel();
    let (mut core, handle) = match IkbdCore::new(IkbdPorts::new(state, tx), &rom) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let stop = handle.stop_flag();

    let (uart, wire) = ChannelUart::new();
    let (mut serial, rx) = SerialPort::new(uart, UartConfig::default());
    serial.open();
    for &byte in &cli.send {
        if wire.send(byte).is_err() {
            break;
        }
    }

    let lines = Lines::default();
    let link = Link::new(RunnerBoard::new(lines.clone()), rx, handle, clock, StdDelay);
    let (input_tx, input_rx) = mpsc::channel();
    let quit = Arc::new(AtomicBool::new(false));
    let done = Arc::new(AtomicBool::new(false));

    let printer = spawn_printer(from_ikbd);
    let core_thread = thread::spawn(move || core.run_paced(&SystemClock::new(), &mut StdDelay));
    let ctx = ModeContext {
        config,
        settings,
        link,
        peripherals,
        keys,
        serial,
        input: input_rx,
        quit: Arc::clone(&quit),
    };
    let mode_done = Arc::clone(&done);
    let mode_thread = thread::spawn(move || {
        let halt = run_mode_loop(ctx);
        mode_done.store(true, Ordering::Release);
        halt
    });

    let deadline = cli
        .seconds
        .or(cli.headless.then_some(DEFAULT_HEADLESS_SECONDS))
        .map(|s| Instant::now() + Duration::from_secs(s));

    if cli.headless {
        while !done.load(Ordering::Acquire) && deadline.is_none_or(|d| Instant::now() < d) {
            thread::sleep(WINDOW_TICK);
        }
        drop(input_tx);
    } else {
        let mut app = App {
            window: None,
            input: input_tx,
            lines,
            keyboard: BootKeyboard::new(),
            buttons: 0,
            focused: false,
            deadline,
            done: Arc::clone(&done),
        };
        run_window(&mut app);
    }

    quit.store(true, Ordering::Release);
    stop.store(true, Ordering::Release);
    match mode_thread.join() {
        Ok(Some(halt)) => log::info!("Mode loop halted: {halt:?}"),
        Ok(None) => {}
        Err(_) => log::warn!("Mode loop thread panicked"),
    }
    if core_thread.join().is_err() {
        log::warn!("HD6301 thread panicked");
    }
    if printer.join().is_err() {
        log::warn!("Output thread panicked");
    }
    drop(wire);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_bytes_parse_in_several_spellings() {
        assert_eq!(parse_hex_bytes("80 01"), Ok(vec![0x80, 0x01]));
        assert_eq!(parse_hex_bytes("0x80,0x01, 1c"), Ok(vec![0x80, 0x01, 0x1C]));
        assert_eq!(parse_hex_bytes("  "), Ok(vec![]));
        assert!(parse_hex_bytes("80 zz").is_err());
        assert!(parse_hex_bytes("100").is_err());
    }

    #[test]
    fn hex_output_is_spaced_upper_case() {
        assert_eq!(format_hex(&[0xF1, 0x0A]), "F1 0A");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn missing_settings_file_falls_back() {
        let settings = load_settings(Some(Path::new("/nonexistent/ikbd.json")));
        assert!(settings.is_empty());
        assert_eq!(load_settings(None).len(), 0);
    }
}
