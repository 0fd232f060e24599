//! Validation errors raised before any request is sent.

use thiserror::Error;

/// Result type for configuration validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A submission is missing something it needs, or carries a value the
/// backend would reject.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("No video file selected")]
    MissingVideo,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("A counting line is required for {0} jobs")]
    MissingCountingLine(&'static str),

    #[error("Counting line endpoints must be distinct")]
    ZeroLengthLine,

    #[error("Counting line point ({x}, {y}) is outside the {width}x{height} reference frame")]
    LineOutOfBounds {
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },
}

impl ValidationError {
    pub fn missing_field(name: &'static str) -> Self {
        Self::MissingField(name)
    }

    pub fn out_of_range(name: &'static str, value: u8, min: u8, max: u8) -> Self {
        Self::OutOfRange {
            name,
            value,
            min,
            max,
        }
    }
}
