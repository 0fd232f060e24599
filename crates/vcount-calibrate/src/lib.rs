//! Counting-line calibration.
//!
//! The operator clicks twice on the displayed reference frame; the
//! calibrator maps both clicks from display space into native image pixels
//! and produces a [`CountingLine`](vcount_models::CountingLine) the backend
//! can use unchanged.

pub mod calibrator;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod surface;

pub use calibrator::{CalibrationState, LineCalibrator};
pub use error::{CalibrationError, CalibrationResult};
pub use frame::ReferenceFrame;
pub use geometry::{DisplayPoint, DisplaySize, ScaleMapping};
pub use surface::{RasterSurface, Stroke, Surface};
