//! Job status snapshots and client-side lifecycle phases.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::CategoryCounts;

/// Lifecycle of one job as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Upload request in flight
    Submitting,
    /// Backend acknowledged the job; status is being polled
    Polling,
    /// Final results fetched
    Completed,
    /// Submission or polling failed
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Submitting => "submitting",
            JobPhase::Polling => "polling",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more polling).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Server-reported snapshot from `GET /api/status`.
///
/// Each poll response replaces the previous snapshot outright; fields are
/// never merged with history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub current_frame: u64,
    /// Authoritative total once the backend knows it, 0 before that
    #[serde(default)]
    pub total_frames: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_counts: Option<CategoryCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_vehicles: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_plates: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Partial results, shaped per job kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl JobStatus {
    /// Error reported by the backend, if any.
    pub fn failure(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Processing finished on the backend.
    ///
    /// An explicit `completed` flag wins; without it a cleared processing
    /// flag means done.
    pub fn is_complete(&self) -> bool {
        match self.completed {
            Some(completed) => completed,
            None => !self.is_processing,
        }
    }

    /// Total vehicles, reported or summed from the category tally.
    pub fn total_vehicles(&self) -> Option<u64> {
        self.total_vehicles
            .or_else(|| self.vehicle_counts.as_ref().map(CategoryCounts::total))
    }

    /// Frame denominator: the server total when known, else `fallback`.
    pub fn frames_total(&self, fallback: Option<u64>) -> Option<u64> {
        if self.total_frames > 0 {
            Some(self.total_frames)
        } else {
            fallback.filter(|t| *t > 0)
        }
    }
}

/// Where a progress value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressSource {
    /// Percentage reported by the backend
    Reported,
    /// current / total frames, total reported by the backend
    Derived,
    /// current / estimated total from the local probe
    Estimated,
    /// Nothing to compute from yet
    Unknown,
}

/// Single progress value with explicit precedence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Progress {
    /// 0.0 to 100.0
    pub percent: f64,
    pub source: ProgressSource,
    pub computed_at: DateTime<Utc>,
}

impl Progress {
    pub fn unknown() -> Self {
        Self {
            percent: 0.0,
            source: ProgressSource::Unknown,
            computed_at: Utc::now(),
        }
    }

    /// Resolve progress from a snapshot.
    ///
    /// Precedence: reported percentage, then frames over the server total,
    /// then frames over `estimated_total`.
    pub fn resolve(status: Option<&JobStatus>, estimated_total: Option<u64>) -> Self {
        let Some(status) = status else {
            return Self::unknown();
        };

        let (percent, source) = match status.percentage.filter(|p| p.is_finite()) {
            Some(p) => (p, ProgressSource::Reported),
            None => match status.frames_total(estimated_total) {
                Some(total) => {
                    let source = if status.total_frames > 0 {
                        ProgressSource::Derived
                    } else {
                        ProgressSource::Estimated
                    };
                    (status.current_frame as f64 / total as f64 * 100.0, source)
                }
                None => (0.0, ProgressSource::Unknown),
            },
        };

        Self {
            percent: percent.clamp(0.0, 100.0),
            source,
            computed_at: Utc::now(),
        }
    }
}
