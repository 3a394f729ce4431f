//! # Event Mapper Module
//!
//! Translates raw evdev events into dense [`RawEvent`]s.
//!
//! evdev reports buttons and axes by event code (`BTN_SOUTH` = 0x130,
//! `ABS_RZ` = 0x05, ...). The mirror addresses channels by index, so each
//! device gets a [`ChannelLayout`] built from its capabilities:
//!
//! | Channel | Source codes | Index order |
//! |---------|--------------|-------------|
//! | Buttons | `EV_KEY` codes >= `BTN_MISC` (0x100) | ascending code |
//! | Axes | `EV_ABS` codes except `ABS_HAT0X..ABS_HAT3Y` | ascending code |
//! | Hats | `ABS_HATnX` / `ABS_HATnY` pairs | ascending hat number |
//!
//! ## Hat Values
//!
//! A hat's X and Y axes (-1/0/1 each) are combined into one bitmask:
//!
//! | Direction | Bit |
//! |-----------|-----|
//! | Centered | 0 |
//! | Up | 1 |
//! | Right | 2 |
//! | Down | 4 |
//! | Left | 8 |
//!
//! Diagonals set two bits (up-right = 3).
//!
//! ## Usage
//!
//! ```
//! use evdev::{EventType, InputEvent};
//! use joystick_mirror::input::mapper::{ChannelLayout, EventTranslator};
//! use joystick_mirror::mirror::RawEvent;
//!
//! // BTN_SOUTH, BTN_EAST; ABS_X, ABS_Y
//! let layout = ChannelLayout::new([0x130, 0x131], [0x00, 0x01]);
//! let mut translator = EventTranslator::new(layout);
//!
//! let event = InputEvent::new(EventType::KEY, 0x131, 1);
//! assert_eq!(translator.translate(&event), RawEvent::ButtonDown { button: 1 });
//! ```

use evdev::{InputEvent, InputEventKind};

use crate::mirror::RawEvent;

/// First key code treated as a button (`BTN_MISC`).
pub const BTN_MISC: u16 = 0x100;

/// Joystick and gamepad button block (`BTN_JOYSTICK` up to `BTN_DIGI`).
const JOYSTICK_BUTTONS: std::ops::Range<u16> = 0x120..0x140;

/// `BTN_TOOL_FINGER`, reported by touchpads.
const BTN_TOOL_FINGER: u16 = 0x145;
/// `BTN_TOUCH`, reported by touchpads and touchscreens.
const BTN_TOUCH: u16 = 0x14a;

const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;
/// `ABS_HAT0X`; hats occupy `ABS_HAT0X..=ABS_HAT3Y` as X/Y pairs.
const ABS_HAT0X: u16 = 0x10;
const ABS_HAT3Y: u16 = 0x17;

/// Number of hats evdev can report.
pub const MAX_HATS: usize = 4;

/// Hat centered.
pub const HAT_CENTERED: i32 = 0;
/// Hat pushed up.
pub const HAT_UP: i32 = 1;
/// Hat pushed right.
pub const HAT_RIGHT: i32 = 2;
/// Hat pushed down.
pub const HAT_DOWN: i32 = 4;
/// Hat pushed left.
pub const HAT_LEFT: i32 = 8;

/// Returns `true` if the capabilities look like a joystick or gamepad.
///
/// A device qualifies with any joystick/gamepad button, or with X and Y
/// absolute axes as long as it is not a touch device.
#[must_use]
pub fn looks_like_joystick(key_codes: &[u16], abs_codes: &[u16]) -> bool {
    let has_buttons = key_codes.iter().any(|code| JOYSTICK_BUTTONS.contains(code));
    let has_stick = abs_codes.contains(&ABS_X) && abs_codes.contains(&ABS_Y);
    let is_touch = key_codes.contains(&BTN_TOUCH) || key_codes.contains(&BTN_TOOL_FINGER);

    has_buttons || (has_stick && !is_touch)
}

/// Splits a hat axis code into (hat number, is Y axis).
fn hat_axis(code: u16) -> Option<(usize, bool)> {
    if (ABS_HAT0X..=ABS_HAT3Y).contains(&code) {
        let offset = usize::from(code - ABS_HAT0X);
        Some((offset / 2, offset % 2 == 1))
    } else {
        None
    }
}

/// Combines hat X/Y positions into the hat bitmask.
#[must_use]
pub fn hat_bits(x: i32, y: i32) -> i32 {
    let mut bits = HAT_CENTERED;
    if y < 0 {
        bits |= HAT_UP;
    } else if y > 0 {
        bits |= HAT_DOWN;
    }
    if x > 0 {
        bits |= HAT_RIGHT;
    } else if x < 0 {
        bits |= HAT_LEFT;
    }
    bits
}

/// Mapping from evdev codes to dense channel indices for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelLayout {
    buttons: Vec<u16>,
    axes: Vec<u16>,
    hats: Vec<usize>,
}

impl ChannelLayout {
    /// Builds a layout from supported key and absolute axis codes.
    ///
    /// Codes may come in any order; duplicates are ignored.
    #[must_use]
    pub fn new(
        key_codes: impl IntoIterator<Item = u16>,
        abs_codes: impl IntoIterator<Item = u16>,
    ) -> Self {
        let mut buttons: Vec<u16> = key_codes
            .into_iter()
            .filter(|&code| code >= BTN_MISC)
            .collect();
        buttons.sort_unstable();
        buttons.dedup();

        let mut axes = Vec::new();
        let mut hats = Vec::new();
        for code in abs_codes {
            match hat_axis(code) {
                Some((hat, _)) => hats.push(hat),
                None => axes.push(code),
            }
        }
        axes.sort_unstable();
        axes.dedup();
        hats.sort_unstable();
        hats.dedup();

        Self { buttons, axes, hats }
    }

    /// Builds the layout of an opened evdev device.
    #[must_use]
    pub fn from_device(device: &evdev::Device) -> Self {
        let keys = device
            .supported_keys()
            .map(|keys| keys.iter().map(|key| key.code()).collect::<Vec<_>>())
            .unwrap_or_default();
        let axes = device
            .supported_absolute_axes()
            .map(|axes| axes.iter().map(|axis| axis.0).collect::<Vec<_>>())
            .unwrap_or_default();

        Self::new(keys, axes)
    }

    /// Number of buttons.
    #[must_use]
    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    /// Number of non-hat axes.
    #[must_use]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Number of hats.
    #[must_use]
    pub fn hat_count(&self) -> usize {
        self.hats.len()
    }

    /// Dense index of a button code.
    #[must_use]
    pub fn button_index(&self, code: u16) -> Option<usize> {
        self.buttons.binary_search(&code).ok()
    }

    /// Dense index of a non-hat axis code.
    #[must_use]
    pub fn axis_index(&self, code: u16) -> Option<usize> {
        self.axes.binary_search(&code).ok()
    }

    /// Dense index of a hat number (0-3).
    #[must_use]
    pub fn hat_index(&self, hat: usize) -> Option<usize> {
        self.hats.binary_search(&hat).ok()
    }
}

/// Converts evdev events of one device into [`RawEvent`]s.
///
/// Tracks the X/Y position of every hat, since evdev reports the two
/// directions as separate axes.
///
/// # Thread Safety
///
/// `EventTranslator` is not thread-safe. It lives inside the device handle
/// owned by the poll worker.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    layout: ChannelLayout,
    hat_positions: [(i32, i32); MAX_HATS],
}

impl EventTranslator {
    /// Creates a translator with all hats centered.
    #[must_use]
    pub fn new(layout: ChannelLayout) -> Self {
        Self {
            layout,
            hat_positions: [(0, 0); MAX_HATS],
        }
    }

    /// Layout used for index lookups.
    #[must_use]
    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Translates one evdev event.
    ///
    /// Unknown codes, sync reports and other event types map to
    /// [`RawEvent::Other`].
    pub fn translate(&mut self, event: &InputEvent) -> RawEvent {
        match event.kind() {
            InputEventKind::Key(key) => match self.layout.button_index(key.code()) {
                // Value 2 is autorepeat, still held
                Some(button) if event.value() != 0 => RawEvent::ButtonDown { button },
                Some(button) => RawEvent::ButtonUp { button },
                None => RawEvent::Other,
            },
            InputEventKind::AbsAxis(axis) => match hat_axis(axis.0) {
                Some((hat, is_y)) => self.translate_hat(hat, is_y, event.value()),
                None => match self.layout.axis_index(axis.0) {
                    Some(axis) => RawEvent::AxisMotion {
                        axis,
                        value: event.value(),
                    },
                    None => RawEvent::Other,
                },
            },
            _ => RawEvent::Other,
        }
    }

    fn translate_hat(&mut self, hat: usize, is_y: bool, value: i32) -> RawEvent {
        let Some(index) = self.layout.hat_index(hat) else {
            return RawEvent::Other;
        };

        let position = &mut self.hat_positions[hat];
        if is_y {
            position.1 = value;
        } else {
            position.0 = value;
        }

        RawEvent::HatMotion {
            hat: index,
            value: hat_bits(position.0, position.1),
        }
    }
}
