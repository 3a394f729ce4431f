//! # Joystick Mirror Library
//!
//! Live, lock-free view of a joystick's buttons, axes and hat.
//!
//! A background worker drains input events from the device and stores the
//! latest value of every channel in a table of atomic slots. Any number of
//! threads can query that table without blocking.

pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod mirror;

/// Library version, e.g. `"0.1.0"`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
