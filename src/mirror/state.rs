//! # Shared State Table
//!
//! Fixed-size table of atomic slots written by the poll worker and read by
//! any number of callers.
//!
//! Every slot is an independent atomic. A read never observes a torn value,
//! but two reads of different slots may come from different event batches;
//! there is no snapshot guarantee across slots, so all slot accesses use
//! `Relaxed` ordering.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use super::source::RawEvent;

/// Number of button slots.
pub const MAX_BUTTONS: usize = 256;

/// Number of axis slots.
pub const MAX_AXES: usize = 256;

/// Axis slot value before any motion was reported.
pub const AXIS_DEFAULT: i32 = 0;

/// Hat slot value before any hat event was reported.
pub const HAT_NONE: i32 = -1;

/// Atomic button/axis/hat slots.
///
/// # Examples
///
/// ```
/// use joystick_mirror::mirror::state::StateTable;
/// use joystick_mirror::mirror::RawEvent;
///
/// let table = StateTable::new();
/// table.apply(RawEvent::ButtonDown { button: 3 });
/// assert_eq!(table.button(3), Some(true));
/// assert_eq!(table.button(300), None);
/// ```
#[derive(Debug)]
pub struct StateTable {
    buttons: [AtomicBool; MAX_BUTTONS],
    axes: [AtomicI32; MAX_AXES],
    hat: AtomicI32,
}

impl Default for StateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTable {
    /// Creates a table with all buttons released, axes at 0 and no hat value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buttons: std::array::from_fn(|_| AtomicBool::new(false)),
            axes: std::array::from_fn(|_| AtomicI32::new(AXIS_DEFAULT)),
            hat: AtomicI32::new(HAT_NONE),
        }
    }

    /// Applies one event. Out-of-range indices and `Other` are dropped.
    ///
    /// Returns `true` if a slot was written.
    pub fn apply(&self, event: RawEvent) -> bool {
        match event {
            RawEvent::AxisMotion { axis, value } => match self.axes.get(axis) {
                Some(slot) => {
                    slot.store(value, Ordering::Relaxed);
                    true
                }
                None => false,
            },
            RawEvent::ButtonDown { button } => self.store_button(button, true),
            RawEvent::ButtonUp { button } => self.store_button(button, false),
            RawEvent::HatMotion { value, .. } => {
                self.hat.store(value, Ordering::Relaxed);
                true
            }
            RawEvent::Other => false,
        }
    }

    fn store_button(&self, button: usize, pressed: bool) -> bool {
        match self.buttons.get(button) {
            Some(slot) => {
                slot.store(pressed, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Current state of a button, `None` if `index` is out of range.
    #[must_use]
    pub fn button(&self, index: usize) -> Option<bool> {
        self.buttons
            .get(index)
            .map(|slot| slot.load(Ordering::Relaxed))
    }

    /// Reads a button and clears it.
    ///
    /// Load and clear are two separate operations: a press stored by the
    /// worker between them is lost.
    #[must_use]
    pub fn take_button(&self, index: usize) -> Option<bool> {
        let slot = self.buttons.get(index)?;
        let pressed = slot.load(Ordering::Relaxed);
        slot.store(false, Ordering::Relaxed);
        Some(pressed)
    }

    /// Current value of an axis, `None` if `index` is out of range.
    #[must_use]
    pub fn axis(&self, index: usize) -> Option<i32> {
        self.axes.get(index).map(|slot| slot.load(Ordering::Relaxed))
    }

    /// Last reported hat value, [`HAT_NONE`] if none yet.
    #[must_use]
    pub fn hat(&self) -> i32 {
        self.hat.load(Ordering::Relaxed)
    }

    /// Restores every slot to its default.
    pub fn reset(&self) {
        for slot in &self.buttons {
            slot.store(false, Ordering::Relaxed);
        }
        for slot in &self.axes {
            slot.store(AXIS_DEFAULT, Ordering::Relaxed);
        }
        self.hat.store(HAT_NONE, Ordering::Relaxed);
    }
}
