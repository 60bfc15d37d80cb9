//! Error types for the player core
//!
//! Only recoverable conditions live here. GPU errors and broken internal
//! invariants are fatal and panic at the point of detection.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The distortion service has no saved viewer profile yet
    #[error("no saved viewer calibration available")]
    MissingCalibration,

    /// The saved calibration blob could not be decoded
    #[error("invalid viewer calibration: {0}")]
    InvalidCalibration(String),

    /// An integer option code from the host bridge did not map to an enum value
    #[error("invalid {kind} code {value}")]
    InvalidOption { kind: &'static str, value: i32 },

    #[error("failed to create rendering surface: {0}")]
    Surface(String),

    #[error("no suitable GPU adapter found")]
    AdapterNotFound,

    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
}
