//! Trait abstraction over the input-device subsystem to enable testing
//!
//! The mirror never talks to the OS directly. It asks an [`InputBackend`]
//! for device handles and drains [`RawEvent`]s from the returned
//! [`InputDevice`]. Dropping the handle releases the device.

use crate::error::Result;

/// Input event kinds the mirror understands.
///
/// Indices are dense channel IDs (0 = first button/axis/hat of the device),
/// not OS event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    /// Absolute axis moved to `value`.
    AxisMotion { axis: usize, value: i32 },
    /// Button pressed.
    ButtonDown { button: usize },
    /// Button released.
    ButtonUp { button: usize },
    /// Directional hat changed to `value` (bitmask, 0 = centered).
    HatMotion { hat: usize, value: i32 },
    /// Anything else (sync reports, relative motion, LEDs...).
    Other,
}

/// Display name and capability counts of an open device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub buttons: usize,
    pub axes: usize,
    pub hats: usize,
}

/// Device subsystem: enumeration and opening of devices
#[cfg_attr(test, mockall::automock)]
pub trait InputBackend: Send + Sync {
    /// Number of devices currently available. Rescans the subsystem.
    fn device_count(&self) -> usize;

    /// Open the device with the given ID (0 to count - 1).
    fn open_device(&self, id: i32) -> Result<Box<dyn InputDevice>>;
}

/// Handle to one open device
pub trait InputDevice: Send {
    /// Name and capability counts.
    fn info(&self) -> DeviceInfo;

    /// Next pending event, or `None` when nothing is pending. Never blocks.
    fn poll_event(&mut self) -> Result<Option<RawEvent>>;
}
