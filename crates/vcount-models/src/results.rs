//! Backend response payloads other than status.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::CategoryCounts;

/// Response to `POST /api/process-video`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmitAck {
    /// The backend explicitly acknowledged the job.
    pub fn is_started(&self) -> bool {
        self.status.as_deref() == Some("started")
    }

    pub fn failure(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// Response to `GET /api/results`, fetched once on completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPayload {
    /// Full result rows, shaped per job kind
    #[serde(default)]
    pub detections: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub total_detections: Option<u64>,
    #[serde(default)]
    pub vehicle_counts: Option<CategoryCounts>,
    #[serde(default)]
    pub total_vehicles: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultsPayload {
    pub fn failure(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn total_vehicles(&self) -> Option<u64> {
        self.total_vehicles
            .or_else(|| self.vehicle_counts.as_ref().map(CategoryCounts::total))
    }
}

/// Supplementary event feed (`/api/live-detections`, `/api/vehicle-detections`).
///
/// A missing `detections` field is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LiveFeed {
    #[serde(default)]
    pub detections: Option<Vec<serde_json::Value>>,
}

/// Response to `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HealthInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
