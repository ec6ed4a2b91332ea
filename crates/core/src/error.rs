//! Error types for virpil-led-core.

use crate::led::BoardType;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// Device not found during enumeration.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Raw value that does not map to any known variant.
    #[error("invalid argument: {field} = {value}")]
    InvalidArgument { field: &'static str, value: u32 },

    /// Value out of safe range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Malformed 6-digit color string.
    #[error("color must be 6 hex digits with channels 00, 40, 80 or FF (got {0:?})")]
    InvalidColor(String),

    /// Board type with no known command-id formula.
    #[error("unsupported board type: {0}")]
    UnsupportedBoard(BoardType),

    /// Configuration could not be read or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of errors for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programmer error: bad enum value, LED index, color string or config.
    InvalidArgument,
    /// No physical device backs the request.
    DeviceAbsent,
    /// The underlying write or enumeration failed.
    TransportFailure,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Hid(_) => ErrorKind::TransportFailure,
            Error::DeviceNotFound(_) => ErrorKind::DeviceAbsent,
            Error::InvalidArgument { .. }
            | Error::OutOfRange { .. }
            | Error::InvalidColor(_)
            | Error::UnsupportedBoard(_)
            | Error::Config(_) => ErrorKind::InvalidArgument,
        }
    }
}

impl From<hidapi::HidError> for Error {
    fn from(e: hidapi::HidError) -> Self {
        Error::Hid(e.to_string())
    }
}
