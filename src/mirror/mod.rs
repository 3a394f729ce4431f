//! # Device State Mirror
//!
//! Mirrors the live state of one input device into a table of atomic slots.
//!
//! A single background worker drains events from the open device and stores
//! the latest value per channel. Readers never block and never take a lock:
//! every accessor is a plain atomic load.
//!
//! ## Lifecycle
//!
//! - **Closed**: no handle, no worker. All info accessors return sentinels.
//! - **Open**: handle held by the worker, worker running.
//!
//! [`JoystickMirror::open`] moves from either state to **Open** (replacing any
//! current session) or leaves the mirror **Closed** on failure.
//! [`JoystickMirror::close`] and `Drop` stop and join the worker, then
//! release the handle.
//!
//! ## Usage
//!
//! ```no_run
//! use joystick_mirror::input::EvdevBackend;
//! use joystick_mirror::mirror::JoystickMirror;
//!
//! let mut mirror = JoystickMirror::new(Box::new(EvdevBackend::new()));
//! if mirror.enumerate() > 0 {
//!     mirror.open(0)?;
//!     println!("{}: button 0 = {}", mirror.name(), mirror.button_state(0, false));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod source;
pub mod state;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{MirrorError, Result};

pub use source::{DeviceInfo, InputBackend, InputDevice, RawEvent};
pub use state::{StateTable, HAT_NONE, MAX_AXES, MAX_BUTTONS};

/// Default sleep between two worker polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound of events applied per poll, keeps the stop flag responsive
/// while the device floods events.
pub const MAX_EVENTS_PER_POLL: usize = 256;

/// Returned by count and axis accessors when no value is available.
pub const NOT_AVAILABLE: i32 = -1;

const WORKER_THREAD_NAME: &str = "joystick-poll";

/// Point-in-time copy of the mirrored state, limited to the device's
/// reported capabilities.
///
/// Slots are read one by one, so values may come from different event
/// batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub name: String,
    pub axes: Vec<i32>,
    pub hat: i32,
    pub buttons: Vec<bool>,
}

/// Live, lock-free mirror of one input device.
///
/// Readers take `&self` and may run on any number of threads. `open` and
/// `close` take `&mut self`, so control operations never overlap.
pub struct JoystickMirror {
    backend: Box<dyn InputBackend>,
    table: Arc<StateTable>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Box<dyn InputDevice>>>,
    info: Option<DeviceInfo>,
    poll_interval: Duration,
}

impl std::fmt::Debug for JoystickMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoystickMirror")
            .field("info", &self.info)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl JoystickMirror {
    /// Library version string.
    #[must_use]
    pub fn version() -> &'static str {
        crate::VERSION
    }

    /// Creates a closed mirror using the default poll interval.
    #[must_use]
    pub fn new(backend: Box<dyn InputBackend>) -> Self {
        Self::with_poll_interval(backend, DEFAULT_POLL_INTERVAL)
    }

    /// Creates a closed mirror whose worker sleeps `poll_interval` between polls.
    #[must_use]
    pub fn with_poll_interval(backend: Box<dyn InputBackend>, poll_interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(true));
        Self {
            backend,
            table: Arc::new(StateTable::new()),
            stop,
            worker: None,
            info: None,
            poll_interval,
        }
    }

    /// Number of devices available from the backend (may be 0).
    pub fn enumerate(&self) -> usize {
        let count = self.backend.device_count();
        debug!("Enumerated {} input device(s)", count);
        count
    }

    /// Opens `device_id` and starts mirroring it.
    ///
    /// Any current session is stopped and released first. On error the
    /// mirror is left closed.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound` / `Device`: the backend could not open the device
    /// - `Worker`: the poll thread could not be spawned
    pub fn open(&mut self, device_id: i32) -> Result<()> {
        self.close();

        let device = self.backend.open_device(device_id)?;
        let info = device.info();

        self.table.reset();
        self.stop.store(false, Ordering::Release);

        let worker = spawn_worker(
            device,
            Arc::clone(&self.table),
            Arc::clone(&self.stop),
            self.poll_interval,
        );

        match worker {
            Ok(handle) => {
                info!(
                    "Opened input device {}: {} (buttons: {}, axes: {}, hats: {})",
                    device_id, info.name, info.buttons, info.axes, info.hats
                );
                self.worker = Some(handle);
                self.info = Some(info);
                Ok(())
            }
            Err(e) => {
                // The device went down with the rejected closure.
                self.stop.store(true, Ordering::Release);
                Err(MirrorError::Worker(e))
            }
        }
    }

    /// Stops the worker and releases the device. No-op when closed.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(device) => drop(device),
                Err(_) => warn!("Poll worker panicked, device handle lost"),
            }
        }

        if let Some(info) = self.info.take() {
            info!("Closed input device: {}", info.name);
        }
    }

    /// Returns `true` while a session is active.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.info.is_some()
    }

    /// Device display name, empty when closed.
    #[must_use]
    pub fn name(&self) -> String {
        self.info
            .as_ref()
            .map(|info| info.name.clone())
            .unwrap_or_default()
    }

    /// Number of buttons of the open device, `-1` when closed.
    #[must_use]
    pub fn num_buttons(&self) -> i32 {
        self.count(|info| info.buttons)
    }

    /// Number of axes of the open device, `-1` when closed.
    #[must_use]
    pub fn num_axes(&self) -> i32 {
        self.count(|info| info.axes)
    }

    /// Number of hats of the open device, `-1` when closed.
    #[must_use]
    pub fn num_hats(&self) -> i32 {
        self.count(|info| info.hats)
    }

    fn count(&self, field: impl Fn(&DeviceInfo) -> usize) -> i32 {
        self.info
            .as_ref()
            .map_or(NOT_AVAILABLE, |info| {
                i32::try_from(field(info)).unwrap_or(i32::MAX)
            })
    }

    /// Whether button `id` is held.
    ///
    /// With `reset_on_read` the slot is cleared after the read, so a press
    /// is reported once even if it was released before the caller polled.
    /// Returns `false` for `id` outside `0..=255`.
    #[must_use]
    pub fn button_state(&self, id: i32, reset_on_read: bool) -> bool {
        let Some(index) = slot_index(id, MAX_BUTTONS) else {
            return false;
        };

        let state = if reset_on_read {
            self.table.take_button(index)
        } else {
            self.table.button(index)
        };
        state.unwrap_or(false)
    }

    /// Latest value of axis `id`, `-1` for `id` outside `0..=255`.
    #[must_use]
    pub fn axis_value(&self, id: i32) -> i32 {
        slot_index(id, MAX_AXES)
            .and_then(|index| self.table.axis(index))
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Latest hat value, `-1` if no hat event was seen.
    #[must_use]
    pub fn hat_value(&self) -> i32 {
        self.table.hat()
    }

    /// Copies the slots covered by the open device's capabilities.
    ///
    /// Buttons are read without reset.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let (buttons, axes) = self
            .info
            .as_ref()
            .map_or((0, 0), |info| {
                (info.buttons.min(MAX_BUTTONS), info.axes.min(MAX_AXES))
            });

        StateSnapshot {
            name: self.name(),
            axes: (0..axes)
                .map(|i| self.table.axis(i).unwrap_or(NOT_AVAILABLE))
                .collect(),
            hat: self.table.hat(),
            buttons: (0..buttons)
                .map(|i| self.table.button(i).unwrap_or(false))
                .collect(),
        }
    }
}

impl Drop for JoystickMirror {
    fn drop(&mut self) {
        self.close();
    }
}

fn slot_index(id: i32, len: usize) -> Option<usize> {
    usize::try_from(id).ok().filter(|&index| index < len)
}

/// Starts the poll loop on a named thread.
///
/// The worker owns the device while it runs and hands it back through the
/// join handle, so the device is always released after the worker exited.
fn spawn_worker(
    mut device: Box<dyn InputDevice>,
    table: Arc<StateTable>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
) -> std::io::Result<JoinHandle<Box<dyn InputDevice>>> {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            debug!("Poll worker started ({:?} interval)", poll_interval);
            let mut failing = false;

            while !stop.load(Ordering::Acquire) {
                for _ in 0..MAX_EVENTS_PER_POLL {
                    match device.poll_event() {
                        Ok(Some(event)) => {
                            failing = false;
                            table.apply(event);
                        }
                        Ok(None) => {
                            failing = false;
                            break;
                        }
                        Err(e) => {
                            // Log once per streak, a vanished device fails every poll
                            if !failing {
                                warn!("Failed to poll input device: {}", e);
                                failing = true;
                            }
                            break;
                        }
                    }
                }

                thread::sleep(poll_interval);
            }

            debug!("Poll worker stopped");
            device
        })
}

#[cfg(test)]
mod tests {
    use super::source::mocks::ScriptedDevice;
    use super::source::MockInputBackend;
    use super::*;
    use std::time::Instant;

    const TEST_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Polls `condition` until it holds or two seconds pass.
    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    /// Backend whose device 0 is `device`; any other ID is not found.
    fn backend_with(device: &ScriptedDevice) -> MockInputBackend {
        let mut backend = MockInputBackend::new();
        let device = device.clone();
        backend.expect_open_device().returning(move |id| {
            if id == 0 {
                Ok(Box::new(device.clone()) as Box<dyn InputDevice>)
            } else {
                Err(MirrorError::DeviceNotFound(id))
            }
        });
        backend
    }

    fn open_mirror(device: &ScriptedDevice) -> JoystickMirror {
        let mut mirror =
            JoystickMirror::with_poll_interval(Box::new(backend_with(device)), TEST_POLL_INTERVAL);
        mirror.open(0).expect("scripted device should open");
        mirror
    }

    /// Asserts the worker no longer touches `device`.
    fn assert_worker_stopped(device: &ScriptedDevice) {
        let polls = device.poll_count();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(device.poll_count(), polls, "worker still polling");
    }

    // ==================== Closed State Tests ====================

    #[test]
    fn test_version_matches_package() {
        assert_eq!(JoystickMirror::version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_closed_mirror_sentinels() {
        let mirror = JoystickMirror::new(Box::new(MockInputBackend::new()));

        assert!(!mirror.is_open());
        assert_eq!(mirror.name(), "");
        assert_eq!(mirror.num_buttons(), -1);
        assert_eq!(mirror.num_axes(), -1);
        assert_eq!(mirror.num_hats(), -1);
        assert_eq!(mirror.hat_value(), -1);
        assert!(!mirror.button_state(0, false));
        assert_eq!(mirror.axis_value(0), 0);
    }

    #[test]
    fn test_enumerate_delegates_to_backend() {
        let mut backend = MockInputBackend::new();
        backend.expect_device_count().times(1).returning(|| 3);
        let mirror = JoystickMirror::new(Box::new(backend));

        assert_eq!(mirror.enumerate(), 3);
        assert!(!mirror.is_open());
    }

    #[test]
    fn test_enumerate_zero_devices() {
        let mut backend = MockInputBackend::new();
        backend.expect_device_count().returning(|| 0);
        let mirror = JoystickMirror::new(Box::new(backend));

        assert_eq!(mirror.enumerate(), 0);
    }

    #[test]
    fn test_open_invalid_id_fails_and_stays_closed() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mut mirror = JoystickMirror::new(Box::new(backend_with(&device)));

        let result = mirror.open(-1);

        assert!(matches!(result, Err(MirrorError::DeviceNotFound(-1))));
        assert!(!mirror.is_open());
        assert_eq!(mirror.num_buttons(), -1);
        assert_eq!(mirror.name(), "");
        assert_eq!(device.poll_count(), 0);
    }

    #[test]
    fn test_close_when_never_opened() {
        let mut mirror = JoystickMirror::new(Box::new(MockInputBackend::new()));
        mirror.close();
        mirror.close();
        assert!(!mirror.is_open());
    }

    // ==================== Session Tests ====================

    #[test]
    fn test_open_reports_device_info() {
        let device = ScriptedDevice::new("Test Stick", 12, 4, 1);
        let mirror = open_mirror(&device);

        assert!(mirror.is_open());
        assert_eq!(mirror.name(), "Test Stick");
        assert_eq!(mirror.num_buttons(), 12);
        assert_eq!(mirror.num_axes(), 4);
        assert_eq!(mirror.num_hats(), 1);
    }

    #[test]
    fn test_two_button_one_axis_one_hat_scenario() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mirror = open_mirror(&device);

        device.push(RawEvent::ButtonDown { button: 0 });
        assert!(wait_until(|| mirror.button_state(0, false)));

        device.push(RawEvent::AxisMotion { axis: 0, value: 1500 });
        assert!(wait_until(|| mirror.axis_value(0) == 1500));

        device.push(RawEvent::HatMotion { hat: 0, value: 3 });
        assert!(wait_until(|| mirror.hat_value() == 3));

        device.push(RawEvent::ButtonUp { button: 0 });
        assert!(wait_until(|| !mirror.button_state(0, false)));
    }

    #[test]
    fn test_button_held_until_release_for_all_ids() {
        let device = ScriptedDevice::new("Pad", MAX_BUTTONS, 0, 0);
        let mirror = open_mirror(&device);

        for button in 0..MAX_BUTTONS {
            device.push(RawEvent::ButtonDown { button });
        }
        assert!(wait_until(|| device.pending() == 0));
        assert!(wait_until(|| (0..256).all(|id| mirror.button_state(id, false))));

        // Plain reads do not consume the press
        assert!((0..256).all(|id| mirror.button_state(id, false)));

        device.push(RawEvent::ButtonUp { button: 17 });
        assert!(wait_until(|| !mirror.button_state(17, false)));
        assert!(mirror.button_state(16, false));
        assert!(mirror.button_state(18, false));
    }

    #[test]
    fn test_reset_on_read_consumes_press_once() {
        let device = ScriptedDevice::new("Pad", 4, 0, 0);
        let mirror = open_mirror(&device);

        device.push(RawEvent::ButtonDown { button: 2 });
        assert!(wait_until(|| mirror.button_state(2, false)));

        assert!(mirror.button_state(2, true));
        assert!(!mirror.button_state(2, true));
        assert!(!mirror.button_state(2, false));
    }

    #[test]
    fn test_reset_on_read_catches_short_press() {
        let device = ScriptedDevice::new("Pad", 4, 0, 0);
        let mirror = open_mirror(&device);

        // Press while the reader is not looking; no release yet
        device.push(RawEvent::ButtonDown { button: 1 });
        assert!(wait_until(|| device.pending() == 0));

        assert!(mirror.button_state(1, true));
        assert!(!mirror.button_state(1, true));
    }

    #[test]
    fn test_out_of_range_ids_return_sentinels() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mut mirror = open_mirror(&device);

        for id in [-1000, -1, 256, 257, i32::MAX, i32::MIN] {
            assert!(!mirror.button_state(id, false));
            assert!(!mirror.button_state(id, true));
            assert_eq!(mirror.axis_value(id), -1);
        }

        mirror.close();

        for id in [-1, 256] {
            assert!(!mirror.button_state(id, false));
            assert_eq!(mirror.axis_value(id), -1);
        }
    }

    #[test]
    fn test_slots_beyond_capabilities_are_readable() {
        let device = ScriptedDevice::new("Pad", 2, 1, 0);
        let mirror = open_mirror(&device);

        assert!(!mirror.button_state(200, false));
        assert_eq!(mirror.axis_value(200), 0);
    }

    #[test]
    fn test_out_of_range_event_index_is_ignored() {
        let device = ScriptedDevice::new("Pad", 2, 1, 0);
        let mirror = open_mirror(&device);

        device.push(RawEvent::ButtonDown { button: 300 });
        device.push(RawEvent::AxisMotion { axis: 999, value: 7 });
        device.push(RawEvent::Other);
        device.push(RawEvent::ButtonDown { button: 1 });

        assert!(wait_until(|| mirror.button_state(1, false)));
        assert!(!mirror.button_state(255, false));
        assert_eq!(mirror.axis_value(255), 0);
    }

    #[test]
    fn test_poll_errors_do_not_stop_worker() {
        let device = ScriptedDevice::new("Pad", 2, 1, 0);
        let mirror = open_mirror(&device);

        device.set_fail_polls(true);
        let polls = device.poll_count();
        assert!(wait_until(|| device.poll_count() > polls + 3));

        device.set_fail_polls(false);
        device.push(RawEvent::AxisMotion { axis: 0, value: -200 });
        assert!(wait_until(|| mirror.axis_value(0) == -200));
    }

    #[test]
    fn test_snapshot_limited_to_capabilities() {
        let device = ScriptedDevice::new("Pad", 3, 2, 1);
        let mirror = open_mirror(&device);

        device.push(RawEvent::ButtonDown { button: 1 });
        device.push(RawEvent::AxisMotion { axis: 1, value: 99 });
        device.push(RawEvent::HatMotion { hat: 0, value: 4 });
        assert!(wait_until(|| mirror.hat_value() == 4));

        let snapshot = mirror.snapshot();
        assert_eq!(snapshot.name, "Pad");
        assert_eq!(snapshot.buttons, vec![false, true, false]);
        assert_eq!(snapshot.axes, vec![0, 99]);
        assert_eq!(snapshot.hat, 4);
    }

    #[test]
    fn test_snapshot_when_closed_is_empty() {
        let mirror = JoystickMirror::new(Box::new(MockInputBackend::new()));
        let snapshot = mirror.snapshot();

        assert!(snapshot.name.is_empty());
        assert!(snapshot.buttons.is_empty());
        assert!(snapshot.axes.is_empty());
        assert_eq!(snapshot.hat, HAT_NONE);
    }

    // ==================== Lifecycle Tests ====================

    #[test]
    fn test_close_joins_worker_before_returning() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mut mirror = open_mirror(&device);
        assert!(wait_until(|| device.poll_count() > 0));

        mirror.close();

        assert!(!mirror.is_open());
        assert_worker_stopped(&device);

        // Events injected after close are never applied
        device.push(RawEvent::ButtonDown { button: 0 });
        thread::sleep(Duration::from_millis(20));
        assert!(!mirror.button_state(0, false));
        assert_eq!(device.pending(), 1);
    }

    #[test]
    fn test_open_then_immediate_close() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mut mirror = open_mirror(&device);
        mirror.close();
        assert_worker_stopped(&device);
    }

    #[test]
    fn test_close_is_idempotent() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mut mirror = open_mirror(&device);

        mirror.close();
        mirror.close();
        mirror.close();

        assert!(!mirror.is_open());
        assert_eq!(mirror.name(), "");
        assert_eq!(mirror.num_buttons(), -1);
        assert_eq!(mirror.num_axes(), -1);
        assert_eq!(mirror.num_hats(), -1);
    }

    #[test]
    fn test_drop_joins_worker() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mirror = open_mirror(&device);
        assert!(wait_until(|| device.poll_count() > 0));

        drop(mirror);

        assert_worker_stopped(&device);
    }

    #[test]
    fn test_reopen_replaces_session() {
        let first = ScriptedDevice::new("First", 2, 1, 0);
        let second = ScriptedDevice::new("Second", 8, 6, 2);

        let mut backend = MockInputBackend::new();
        let (a, b) = (first.clone(), second.clone());
        backend.expect_open_device().times(2).returning(move |id| match id {
            0 => Ok(Box::new(a.clone()) as Box<dyn InputDevice>),
            1 => Ok(Box::new(b.clone()) as Box<dyn InputDevice>),
            _ => Err(MirrorError::DeviceNotFound(id)),
        });

        let mut mirror = JoystickMirror::with_poll_interval(Box::new(backend), TEST_POLL_INTERVAL);
        mirror.open(0).unwrap();
        first.push(RawEvent::ButtonDown { button: 0 });
        assert!(wait_until(|| mirror.button_state(0, false)));

        mirror.open(1).unwrap();

        assert_eq!(mirror.name(), "Second");
        assert_eq!(mirror.num_buttons(), 8);
        // Fresh session starts from defaults
        assert!(!mirror.button_state(0, false));
        assert_eq!(mirror.hat_value(), -1);
        assert_worker_stopped(&first);

        second.push(RawEvent::AxisMotion { axis: 5, value: 12 });
        assert!(wait_until(|| mirror.axis_value(5) == 12));
    }

    #[test]
    fn test_failed_open_closes_previous_session() {
        let device = ScriptedDevice::new("Pad", 2, 1, 1);
        let mut mirror = open_mirror(&device);
        assert!(mirror.is_open());

        assert!(mirror.open(5).is_err());

        assert!(!mirror.is_open());
        assert_eq!(mirror.num_buttons(), -1);
        assert_worker_stopped(&device);
    }

    // ==================== Concurrency Tests ====================

    #[test]
    fn test_concurrent_readers_see_only_written_values() {
        const VALUES: [i32; 3] = [100, -200, 32767];

        let device = ScriptedDevice::new("Pad", 2, 1, 0);
        let mut mirror = open_mirror(&device);

        for i in 0..3000 {
            device.push(RawEvent::AxisMotion { axis: 0, value: VALUES[i % VALUES.len()] });
            device.push(if i % 2 == 0 {
                RawEvent::ButtonDown { button: 1 }
            } else {
                RawEvent::ButtonUp { button: 1 }
            });
        }

        thread::scope(|scope| {
            for _ in 0..100 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        let value = mirror.axis_value(0);
                        assert!(
                            value == 0 || VALUES.contains(&value),
                            "read a value never written: {}",
                            value
                        );
                        let _ = mirror.button_state(1, false);
                        assert_eq!(mirror.axis_value(256), -1);
                    }
                });
            }
        });

        assert!(wait_until(|| device.pending() == 0));
        mirror.close();
        assert_eq!(mirror.axis_value(0), VALUES[2999 % VALUES.len()]);
        assert!(!mirror.button_state(1, false));
    }
}
