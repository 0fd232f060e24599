//! Detection records reported by the backend.
//!
//! Two record shapes exist, one per job kind:
//! - [`PlateReading`] for licence plate recognition
//! - [`VehicleDetection`] for vehicle counting
//!
//! Both implement [`DetectionRecord`] so reconciliation and views are
//! written once.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Common view of one observed event.
pub trait DetectionRecord {
    /// Key used for deduplication.
    fn primary_key(&self) -> Cow<'_, str>;

    /// Category label (vehicle type or plate).
    fn category(&self) -> &str;

    /// Case-insensitive text match used by view filters.
    fn matches(&self, needle: &str) -> bool;
}

/// Running tally keyed by detected category (car, truck, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CategoryCounts(pub BTreeMap<String, u64>);

impl CategoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str) -> u64 {
        self.0.get(category).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, category: impl Into<String>) {
        *self.0.entry(category.into()).or_insert(0) += 1;
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for CategoryCounts {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Plate reading as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawPlateReading {
    #[serde(rename = "license_plate_text")]
    pub plate: String,
    #[serde(rename = "license_plate_text_score", default)]
    pub confidence: f64,
    #[serde(default)]
    pub video_timestamp: String,
    #[serde(default)]
    pub camera_timestamp: Option<String>,
    #[serde(default)]
    pub real_timestamp: Option<String>,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub orientation: String,
}

/// Confidence band used for display colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 95.0 {
            Self::High
        } else if confidence >= 90.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A plate reading held by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlateReading {
    /// Client-assigned, stable for the record's lifetime
    pub id: u64,
    pub plate: String,
    pub confidence: f64,
    /// Video-relative time, `MM:SS` or `HH:MM:SS`
    pub video_timestamp: String,
    pub camera_timestamp: Option<String>,
    pub real_timestamp: Option<String>,
    pub direction: String,
    pub orientation: String,
}

impl PlateReading {
    pub fn from_raw(id: u64, raw: RawPlateReading) -> Self {
        Self {
            id,
            plate: raw.plate,
            confidence: raw.confidence,
            video_timestamp: raw.video_timestamp,
            camera_timestamp: raw.camera_timestamp,
            real_timestamp: raw.real_timestamp,
            direction: raw.direction,
            orientation: raw.orientation,
        }
    }

    /// Normalized plate text (trimmed, upper-case).
    pub fn plate_key(plate: &str) -> String {
        plate.trim().to_uppercase()
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::from_confidence(self.confidence)
    }

    /// Camera time when present, video time otherwise.
    pub fn display_timestamp(&self, prefer_camera: bool) -> &str {
        match (&self.camera_timestamp, prefer_camera) {
            (Some(camera), true) => camera,
            _ => &self.video_timestamp,
        }
    }
}

impl DetectionRecord for PlateReading {
    fn primary_key(&self) -> Cow<'_, str> {
        Cow::Owned(Self::plate_key(&self.plate))
    }

    fn category(&self) -> &str {
        &self.plate
    }

    fn matches(&self, needle: &str) -> bool {
        self.plate.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// A single vehicle observation from the counting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VehicleDetection {
    #[serde(default)]
    pub id: Option<u64>,
    /// Wall-clock time of the observation
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub precise_timestamp: Option<String>,
    pub track_id: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub vehicle_subtype: Option<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub color_rgb: Option<String>,
    #[serde(default)]
    pub frame_number: u64,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_y: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub size_category: Option<String>,
    #[serde(default)]
    pub crossed_line: bool,
    #[serde(default)]
    pub image_saved: Option<String>,
}

impl DetectionRecord for VehicleDetection {
    fn primary_key(&self) -> Cow<'_, str> {
        match self.id {
            Some(id) => Cow::Owned(format!("{}#{}", self.track_id, id)),
            None => Cow::Borrowed(&self.track_id),
        }
    }

    fn category(&self) -> &str {
        &self.vehicle_type
    }

    fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.vehicle_type, &self.color, &self.track_id]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Parse a loosely typed row array, skipping rows that do not fit `T`.
///
/// Returns the parsed rows and the number of rows skipped.
pub fn parse_rows<T: DeserializeOwned>(rows: &[serde_json::Value]) -> (Vec<T>, usize) {
    let mut parsed = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        match serde_json::from_value::<T>(row.clone()) {
            Ok(value) => parsed.push(value),
            Err(_) => skipped += 1,
        }
    }
    (parsed, skipped)
}
