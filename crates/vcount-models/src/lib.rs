//! Shared data models for the vcount job client.
//!
//! This crate provides Serde-serializable types for:
//! - Job configuration and validation
//! - Counting lines in reference-frame pixel space
//! - Server-reported job status snapshots and progress
//! - Plate readings and vehicle detections
//! - Backend response payloads

pub mod detection;
pub mod error;
pub mod job;
pub mod line;
pub mod results;
pub mod status;
pub mod timestamp;

// Re-export common types
pub use detection::{
    parse_rows, CategoryCounts, ConfidenceBand, DetectionRecord, PlateReading, RawPlateReading,
    VehicleDetection,
};
pub use error::{ValidationError, ValidationResult};
pub use job::{Direction, JobConfig, JobId, JobKind, Orientation, Thresholds, VideoSource};
pub use line::{CountingLine, PixelPoint};
pub use results::{HealthInfo, LiveFeed, ResultsPayload, SubmitAck};
pub use status::{JobPhase, JobStatus, Progress, ProgressSource};
