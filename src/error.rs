//! # Error Types
//!
//! Custom error types for Joystick Mirror using `thiserror`.

use thiserror::Error;

/// Main error type for Joystick Mirror
#[derive(Debug, Error)]
pub enum MirrorError {
    /// No device exists for the requested ID
    #[error("Input device {0} not found")]
    DeviceNotFound(i32),

    /// Device open, read or setup failure
    #[error("Input device error: {0}")]
    Device(String),

    /// The background poll worker could not be started
    #[error("Failed to start poll worker: {0}")]
    Worker(#[source] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Joystick Mirror
pub type Result<T> = std::result::Result<T, MirrorError>;
