//! Read-time projections of reconciled results.
//!
//! Views are computed from a borrowed result set and never modify it.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use vcount_models::timestamp::sort_seconds;
use vcount_models::{CategoryCounts, DetectionRecord, PlateReading, VehicleDetection};

use crate::reconciler::{PlateResults, VehicleResults};

// ============================================================================
// Sort Configuration
// ============================================================================

/// Sort direction for views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    /// Parse from string, returning default if invalid.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Self::Ascending,
            _ => Self::Descending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Sort fields for plate readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlateSortField {
    /// Video-relative time, parsed to seconds (default)
    #[default]
    VideoTimestamp,
    Plate,
    Confidence,
}

impl PlateSortField {
    /// Parse from string, returning default if invalid.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "plate" | "license_plate_text" => Self::Plate,
            "confidence" | "score" => Self::Confidence,
            _ => Self::VideoTimestamp,
        }
    }

    fn compare(self, a: &PlateReading, b: &PlateReading) -> Ordering {
        match self {
            Self::VideoTimestamp => sort_seconds(&a.video_timestamp)
                .total_cmp(&sort_seconds(&b.video_timestamp)),
            Self::Plate => a.plate.cmp(&b.plate),
            Self::Confidence => a.confidence.total_cmp(&b.confidence),
        }
    }
}

/// Sort fields for vehicle detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VehicleSortField {
    #[default]
    Timestamp,
    VehicleType,
    Color,
    Frame,
    Confidence,
}

impl VehicleSortField {
    /// Parse from string, returning default if invalid.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "type" | "vehicle_type" => Self::VehicleType,
            "color" | "colour" => Self::Color,
            "frame" | "frame_number" => Self::Frame,
            "confidence" => Self::Confidence,
            _ => Self::Timestamp,
        }
    }

    fn compare(self, a: &VehicleDetection, b: &VehicleDetection) -> Ordering {
        match self {
            // Precise timestamps are ISO-like and sort lexicographically
            Self::Timestamp => a
                .precise_timestamp
                .as_deref()
                .unwrap_or(&a.timestamp)
                .cmp(b.precise_timestamp.as_deref().unwrap_or(&b.timestamp)),
            Self::VehicleType => a.vehicle_type.cmp(&b.vehicle_type),
            Self::Color => a.color.cmp(&b.color),
            Self::Frame => a.frame_number.cmp(&b.frame_number),
            Self::Confidence => a.confidence.total_cmp(&b.confidence),
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PlateQuery {
    /// Case-insensitive plate substring
    pub search: Option<String>,
    pub sort: PlateSortField,
    pub direction: SortDirection,
}

impl PlateQuery {
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn sort_by(mut self, field: PlateSortField, direction: SortDirection) -> Self {
        self.sort = field;
        self.direction = direction;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct VehicleQuery {
    /// Case-insensitive match on type, colour or track id
    pub search: Option<String>,
    pub sort: VehicleSortField,
    pub direction: SortDirection,
}

impl VehicleQuery {
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn sort_by(mut self, field: VehicleSortField, direction: SortDirection) -> Self {
        self.sort = field;
        self.direction = direction;
        self
    }
}

fn active_search(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PlateView {
    pub rows: Vec<PlateReading>,
    /// Rows stored, before filtering
    pub total: usize,
    pub unique_plates: usize,
}

impl PlateView {
    pub fn build(results: &PlateResults, query: &PlateQuery) -> Self {
        let mut rows: Vec<PlateReading> = match active_search(&query.search) {
            Some(needle) => results
                .rows()
                .iter()
                .filter(|r| r.matches(needle))
                .cloned()
                .collect(),
            None => results.rows().to_vec(),
        };
        rows.sort_by(|a, b| query.direction.apply(query.sort.compare(a, b)));

        let unique_plates = results
            .rows()
            .iter()
            .map(|r| r.primary_key())
            .collect::<HashSet<_>>()
            .len();

        Self {
            rows,
            total: results.len(),
            unique_plates,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleView {
    pub rows: Vec<VehicleDetection>,
    pub counts: CategoryCounts,
    pub total_vehicles: u64,
    pub unique_tracks: usize,
}

impl VehicleView {
    pub fn build(results: &VehicleResults, query: &VehicleQuery) -> Self {
        let mut rows: Vec<VehicleDetection> = match active_search(&query.search) {
            Some(needle) => results
                .rows()
                .iter()
                .filter(|r| r.matches(needle))
                .cloned()
                .collect(),
            None => results.rows().to_vec(),
        };
        rows.sort_by(|a, b| query.direction.apply(query.sort.compare(a, b)));

        let unique_tracks = results
            .rows()
            .iter()
            .map(|r| r.track_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        Self {
            rows,
            counts: results.counts().clone(),
            total_vehicles: results.total_vehicles(),
            unique_tracks,
        }
    }
}

/// Detections per processed frame, in percent.
pub fn detection_rate(detections: u64, frames_processed: u64) -> Option<f64> {
    (frames_processed > 0).then(|| detections as f64 / frames_processed as f64 * 100.0)
}
