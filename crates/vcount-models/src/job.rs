//! Job submission configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::line::CountingLine;

/// Client-side identifier correlating logs for one submission.
///
/// The backend runs a single job at a time and never returns an ID, so this
/// one is generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the backend is asked to extract from the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Licence plate recognition
    PlateReading,
    /// Vehicle counting across a calibrated line
    #[default]
    VehicleCounting,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::PlateReading => "plate_reading",
            JobKind::VehicleCounting => "vehicle_counting",
        }
    }

    /// Whether submission requires a calibrated counting line.
    pub fn requires_line(&self) -> bool {
        matches!(self, JobKind::VehicleCounting)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Traffic direction relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Direction {
    #[default]
    #[serde(rename = "entrada")]
    Entry,
    #[serde(rename = "sortida")]
    Exit,
}

impl Direction {
    /// Wire value understood by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entrada",
            Direction::Exit => "sortida",
        }
    }

    /// Parse from string, accepting wire and English names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "entrada" | "entry" | "in" => Some(Self::Entry),
            "sortida" | "exit" | "out" => Some(Self::Exit),
            _ => None,
        }
    }
}

/// Compass orientation of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Orientation {
    #[default]
    #[serde(rename = "nord")]
    North,
    #[serde(rename = "sud")]
    South,
    #[serde(rename = "est")]
    East,
    #[serde(rename = "oest")]
    West,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::North => "nord",
            Orientation::South => "sud",
            Orientation::East => "est",
            Orientation::West => "oest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "nord" | "north" | "n" => Some(Self::North),
            "sud" | "south" | "s" => Some(Self::South),
            "est" | "east" | "e" => Some(Self::East),
            "oest" | "west" | "w" => Some(Self::West),
            _ => None,
        }
    }
}

/// Numeric detection thresholds, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Thresholds {
    /// Frame-difference sensitivity for motion gating
    pub motion: u8,
    /// Minimum detection/OCR confidence
    pub confidence: u8,
}

impl Thresholds {
    pub const MOTION_RANGE: (u8, u8) = (5, 30);
    pub const CONFIDENCE_RANGE: (u8, u8) = (70, 100);
    pub const DEFAULT_MOTION: u8 = 15;
    pub const DEFAULT_CONFIDENCE: u8 = 90;

    pub fn new(motion: u8, confidence: u8) -> Self {
        Self { motion, confidence }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let (min, max) = Self::MOTION_RANGE;
        if !(min..=max).contains(&self.motion) {
            return Err(ValidationError::out_of_range("motion threshold", self.motion, min, max));
        }
        let (min, max) = Self::CONFIDENCE_RANGE;
        if !(min..=max).contains(&self.confidence) {
            return Err(ValidationError::out_of_range(
                "confidence threshold",
                self.confidence,
                min,
                max,
            ));
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            motion: Self::DEFAULT_MOTION,
            confidence: Self::DEFAULT_CONFIDENCE,
        }
    }
}

/// Local video file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoSource {
    pub path: PathBuf,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for the multipart upload.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    }

    /// File name without its extension.
    pub fn file_stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
    }
}

/// Everything one submission sends to the backend.
///
/// Built once per submission and moved into the orchestrator on submit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobConfig {
    pub kind: JobKind,
    pub video: Option<VideoSource>,
    /// Name of the results file the backend writes
    pub output_name: String,
    /// Wall-clock time the recording started
    pub start_time: String,
    pub direction: Direction,
    pub orientation: Orientation,
    pub thresholds: Thresholds,
    pub counting_line: Option<CountingLine>,
}

impl JobConfig {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            video: None,
            output_name: String::new(),
            start_time: String::new(),
            direction: Direction::default(),
            orientation: Orientation::default(),
            thresholds: Thresholds::default(),
            counting_line: None,
        }
    }

    pub fn with_video(mut self, video: VideoSource) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = start_time.into();
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_counting_line(mut self, line: CountingLine) -> Self {
        self.counting_line = Some(line);
        self
    }

    /// Output name to propose when the operator has not typed one.
    pub fn suggested_output_name(&self) -> Option<String> {
        if !self.output_name.trim().is_empty() {
            return Some(self.output_name.trim().to_string());
        }
        self.video.as_ref().and_then(VideoSource::file_stem)
    }

    /// Check the configuration is complete enough to submit.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.video.is_none() {
            return Err(ValidationError::MissingVideo);
        }
        if self.output_name.trim().is_empty() {
            return Err(ValidationError::missing_field("output name"));
        }
        if self.start_time.trim().is_empty() {
            return Err(ValidationError::missing_field("start time"));
        }
        self.thresholds.validate()?;

        match &self.counting_line {
            Some(line) => line.validate()?,
            None if self.kind.requires_line() => {
                return Err(ValidationError::MissingCountingLine(self.kind.as_str()));
            }
            None => {}
        }

        Ok(())
    }
}
