//! HID report pipeline.
//!
//! USB host reports and Bluetooth controller data arrive here and leave as
//! three kinds of update: keys in the shared [`KeyStateTable`], mouse
//! deltas and buttons, and joystick fire/axis bits. The mouse and joystick
//! halves go through an [`InputSink`] so the pipeline does not own the
//! emulators it drives.
//!
//! [`KeyStateTable`]: atari_st_keyboard::KeyStateTable

pub mod bluetooth;
mod keyboard;
mod mouse;
mod ring;
pub mod usb;

pub use keyboard::{KeyboardPipeline, KeyboardReport};
pub use mouse::MouseButtons;
pub use ring::{HID_INTERFACE_RING_CAPACITY, HidInterface, HidInterfaceRing};

/// Where decoded pointer and joystick input goes.
pub trait InputSink {
    /// A relative mouse movement with the current button state.
    fn update_mouse(&mut self, dx: i16, dy: i16, left: bool, right: bool);

    /// Joystick state in port 0 encoding: fire bit 1, axis in the low
    /// nibble.
    fn set_joystick_state(&mut self, fire: u8, axis: u8);
}

impl<S: InputSink + ?Sized> InputSink for &mut S {
    fn update_mouse(&mut self, dx: i16, dy: i16, left: bool, right: bool) {
        (**self).update_mouse(dx, dy, left, right);
    }

    fn set_joystick_state(&mut self, fire: u8, axis: u8) {
        (**self).set_joystick_state(fire, axis);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::InputSink;

    /// Records everything the pipeline emits.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub mouse: Vec<(i16, i16, bool, bool)>,
        pub joystick: Vec<(u8, u8)>,
    }

    impl InputSink for RecordingSink {
        fn update_mouse(&mut self, dx: i16, dy: i16, left: bool, right: bool) {
            self.mouse.push((dx, dy, left, right));
        }

        fn set_joystick_state(&mut self, fire: u8, axis: u8) {
            self.joystick.push((fire, axis));
        }
    }
}
