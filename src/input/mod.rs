//! # Input Module
//!
//! Linux evdev implementation of the device subsystem used by the mirror.
//!
//! This module handles:
//! - Joystick detection under `/dev/input` via evdev
//! - Opening devices in non-blocking mode
//! - Translating evdev key/axis codes to dense button/axis/hat indices

pub mod backend;
pub mod mapper;

pub use backend::{EvdevBackend, EvdevDevice, DEFAULT_INPUT_DIR};
