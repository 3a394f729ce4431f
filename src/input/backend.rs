//! # Evdev Backend
//!
//! Linux input subsystem backend for the mirror, using `/dev/input/event*`.
//!
//! ## Device IDs
//!
//! Devices are scanned in path order and filtered to joysticks and gamepads
//! (see [`looks_like_joystick`]). Device ID `n` is the `n`-th match of the
//! last scan. [`EvdevBackend::device_count`] rescans; opening before any
//! scan triggers one.
//!
//! ## Permissions
//!
//! Event nodes are usually `root:input 0660`. Nodes that cannot be opened
//! are skipped during the scan.

use evdev::Device;
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::mapper::{looks_like_joystick, ChannelLayout, EventTranslator};
use crate::error::{MirrorError, Result};
use crate::mirror::{DeviceInfo, InputBackend, InputDevice, RawEvent};

/// Default directory holding evdev nodes
pub const DEFAULT_INPUT_DIR: &str = "/dev/input";

/// Name reported when the kernel provides none
const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/// Joystick enumeration and opening over evdev.
#[derive(Debug)]
pub struct EvdevBackend {
    input_dir: PathBuf,
    devices: Mutex<Option<Vec<PathBuf>>>,
}

impl Default for EvdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevBackend {
    /// Backend scanning [`DEFAULT_INPUT_DIR`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_input_dir(DEFAULT_INPUT_DIR)
    }

    /// Backend scanning a custom directory.
    #[must_use]
    pub fn with_input_dir<P: AsRef<Path>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            devices: Mutex::new(None),
        }
    }

    /// Scans the input directory for joystick event nodes.
    fn scan(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.input_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read {}: {}", self.input_dir.display(), e);
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .map_or(false, |name| name.to_string_lossy().starts_with("event"))
            })
            .collect();

        // Sort for stable device IDs across scans
        paths.sort();

        paths
            .into_iter()
            .filter(|path| match Device::open(path) {
                Ok(device) => {
                    let joystick = is_joystick(&device);
                    debug!(
                        "Found input device: {} ({}, joystick: {})",
                        path.display(),
                        device.name().unwrap_or(UNKNOWN_DEVICE_NAME),
                        joystick
                    );
                    joystick
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                    false
                }
            })
            .collect()
    }
}

impl InputBackend for EvdevBackend {
    fn device_count(&self) -> usize {
        let devices = self.scan();
        let count = devices.len();
        *self.devices.lock().unwrap_or_else(|e| e.into_inner()) = Some(devices);
        count
    }

    fn open_device(&self, id: i32) -> Result<Box<dyn InputDevice>> {
        let index = usize::try_from(id).map_err(|_| MirrorError::DeviceNotFound(id))?;

        let path = {
            let mut devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
            devices
                .get_or_insert_with(|| self.scan())
                .get(index)
                .cloned()
                .ok_or(MirrorError::DeviceNotFound(id))?
        };

        Ok(Box::new(EvdevDevice::open(&path)?))
    }
}

fn is_joystick(device: &Device) -> bool {
    let keys: Vec<u16> = device
        .supported_keys()
        .map(|keys| keys.iter().map(|key| key.code()).collect())
        .unwrap_or_default();
    let axes: Vec<u16> = device
        .supported_absolute_axes()
        .map(|axes| axes.iter().map(|axis| axis.0).collect())
        .unwrap_or_default();

    looks_like_joystick(&keys, &axes)
}

/// Switches the device descriptor to non-blocking reads.
fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();

    // SAFETY: `fd` belongs to `device`, which outlives both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Open evdev joystick
///
/// Closing happens on drop.
pub struct EvdevDevice {
    device: Device,
    path: PathBuf,
    info: DeviceInfo,
    translator: EventTranslator,
    pending: VecDeque<RawEvent>,
}

impl std::fmt::Debug for EvdevDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevDevice")
            .field("path", &self.path)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl EvdevDevice {
    /// Opens an event node in non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns `Device` error if the node cannot be opened (missing,
    /// permission denied) or switched to non-blocking mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let device = Device::open(path)
            .map_err(|e| MirrorError::Device(format!("Failed to open {}: {}", path.display(), e)))?;

        set_nonblocking(&device).map_err(|e| {
            MirrorError::Device(format!(
                "Failed to set {} non-blocking: {}",
                path.display(),
                e
            ))
        })?;

        let layout = ChannelLayout::from_device(&device);
        let info = DeviceInfo {
            name: device.name().unwrap_or(UNKNOWN_DEVICE_NAME).to_string(),
            buttons: layout.button_count(),
            axes: layout.axis_count(),
            hats: layout.hat_count(),
        };

        info!("Opened {} at {}", info.name, path.display());

        Ok(Self {
            device,
            path: path.to_path_buf(),
            info,
            translator: EventTranslator::new(layout),
            pending: VecDeque::new(),
        })
    }

    /// Event node path, e.g. `/dev/input/event5`.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputDevice for EvdevDevice {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn poll_event(&mut self) -> Result<Option<RawEvent>> {
        if self.pending.is_empty() {
            match self.device.fetch_events() {
                Ok(events) => {
                    for event in events {
                        let raw = self.translator.translate(&event);
                        if raw != RawEvent::Other {
                            self.pending.push_back(raw);
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => {
                    return Err(MirrorError::Device(format!(
                        "Failed to fetch events from {}: {}",
                        self.path.display(),
                        e
                    )))
                }
            }
        }

        Ok(self.pending.pop_front())
    }
}

impl Drop for EvdevDevice {
    fn drop(&mut self) {
        debug!("Released input device at {}", self.path.display());
    }
}
