//! Calibration error types.

use thiserror::Error;

use vcount_models::ValidationError;

pub type CalibrationResult<T> = Result<T, CalibrationError>;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("No reference frame loaded")]
    NoImage,

    #[error("Point ({x}, {y}) is outside the {width}x{height} display area")]
    OutOfBounds {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    #[error("Invalid display size {width}x{height}")]
    InvalidDisplaySize { width: f64, height: f64 },

    #[error("No counting line defined")]
    NotDefined,

    #[error("Invalid counting line: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
