//! Result reconciliation.
//!
//! Plate readings accumulate during polling and are deduplicated by
//! normalized plate text; vehicle detections are an authoritative running
//! state and each update replaces the previous array. A final results
//! fetch replaces either set wholesale.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use vcount_models::{
    parse_rows, CategoryCounts, DetectionRecord, JobKind, JobStatus, LiveFeed, PlateReading,
    RawPlateReading, ResultsPayload, VehicleDetection,
};

/// Accumulated plate readings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlateResults {
    rows: Vec<PlateReading>,
    #[serde(skip)]
    keys: HashSet<String>,
    #[serde(skip)]
    next_id: u64,
}

impl PlateResults {
    pub fn rows(&self) -> &[PlateReading] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.keys.contains(&PlateReading::plate_key(plate))
    }

    /// Append readings whose plate has not been seen; returns how many were new.
    fn append(&mut self, raws: Vec<RawPlateReading>) -> usize {
        let mut inserted = 0;
        for raw in raws {
            if PlateReading::plate_key(&raw.plate).is_empty() {
                continue;
            }
            let reading = PlateReading::from_raw(self.next_id + 1, raw);
            if self.keys.insert(reading.primary_key().into_owned()) {
                self.next_id += 1;
                self.rows.push(reading);
                inserted += 1;
            }
        }
        inserted
    }

    fn replace(&mut self, raws: Vec<RawPlateReading>) {
        *self = Self::default();
        for raw in raws {
            self.next_id += 1;
            let reading = PlateReading::from_raw(self.next_id, raw);
            self.keys.insert(reading.primary_key().into_owned());
            self.rows.push(reading);
        }
    }
}

/// Latest vehicle detections and category tally.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VehicleResults {
    rows: Vec<VehicleDetection>,
    counts: CategoryCounts,
    total_vehicles: Option<u64>,
}

impl VehicleResults {
    pub fn rows(&self) -> &[VehicleDetection] {
        &self.rows
    }

    pub fn counts(&self) -> &CategoryCounts {
        &self.counts
    }

    /// Reported total, falling back to the tally.
    pub fn total_vehicles(&self) -> u64 {
        self.total_vehicles.unwrap_or_else(|| self.counts.total())
    }

    fn apply_counts(&mut self, counts: Option<&CategoryCounts>, total: Option<u64>) {
        if let Some(counts) = counts {
            self.counts = counts.clone();
        }
        if total.is_some() {
            self.total_vehicles = total;
        }
    }
}

/// Result state, shaped per job kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultSet {
    Plates(PlateResults),
    Vehicles(VehicleResults),
}

impl ResultSet {
    pub fn empty(kind: JobKind) -> Self {
        match kind {
            JobKind::PlateReading => Self::Plates(PlateResults::default()),
            JobKind::VehicleCounting => Self::Vehicles(VehicleResults::default()),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::Plates(_) => JobKind::PlateReading,
            Self::Vehicles(_) => JobKind::VehicleCounting,
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Plates(plates) => plates.len(),
            Self::Vehicles(vehicles) => vehicles.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_plates(&self) -> Option<&PlateResults> {
        match self {
            Self::Plates(plates) => Some(plates),
            Self::Vehicles(_) => None,
        }
    }

    pub fn as_vehicles(&self) -> Option<&VehicleResults> {
        match self {
            Self::Vehicles(vehicles) => Some(vehicles),
            Self::Plates(_) => None,
        }
    }
}

/// Applies status, feed and final payloads to a [`ResultSet`].
#[derive(Debug, Clone)]
pub struct ResultReconciler {
    results: ResultSet,
    skipped_rows: usize,
}

impl ResultReconciler {
    pub fn new(kind: JobKind) -> Self {
        Self {
            results: ResultSet::empty(kind),
            skipped_rows: 0,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.results.kind()
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Rows that did not match the expected shape and were dropped.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Partial results carried by a status poll.
    pub fn apply_status(&mut self, status: &JobStatus) {
        match &mut self.results {
            ResultSet::Plates(plates) => {
                if status.results.is_empty() {
                    return;
                }
                let (raws, skipped) = parse_rows::<RawPlateReading>(&status.results);
                self.skipped_rows += skipped;
                let inserted = plates.append(raws);
                debug!(inserted, total = plates.len(), "Merged partial plate results");
            }
            ResultSet::Vehicles(vehicles) => {
                vehicles.apply_counts(status.vehicle_counts.as_ref(), status.total_vehicles());
                if !status.results.is_empty() {
                    let (rows, skipped) = parse_rows::<VehicleDetection>(&status.results);
                    self.skipped_rows += skipped;
                    vehicles.rows = rows;
                }
            }
        }
    }

    /// Supplementary live feed. A feed without `detections` changes nothing.
    pub fn apply_feed(&mut self, feed: &LiveFeed) {
        let Some(rows) = feed.detections.as_deref() else {
            return;
        };

        match &mut self.results {
            ResultSet::Plates(plates) => {
                let (raws, skipped) = parse_rows::<RawPlateReading>(rows);
                self.skipped_rows += skipped;
                plates.append(raws);
            }
            ResultSet::Vehicles(vehicles) => {
                let (parsed, skipped) = parse_rows::<VehicleDetection>(rows);
                self.skipped_rows += skipped;
                vehicles.rows = parsed;
            }
        }
    }

    /// The full results payload fetched once on completion.
    pub fn apply_final(&mut self, payload: &ResultsPayload) {
        match &mut self.results {
            ResultSet::Plates(plates) => {
                if let Some(rows) = payload.detections.as_deref() {
                    let (raws, skipped) = parse_rows::<RawPlateReading>(rows);
                    self.skipped_rows += skipped;
                    plates.replace(raws);
                }
            }
            ResultSet::Vehicles(vehicles) => {
                if let Some(rows) = payload.detections.as_deref() {
                    let (parsed, skipped) = parse_rows::<VehicleDetection>(rows);
                    self.skipped_rows += skipped;
                    vehicles.rows = parsed;
                }
                vehicles.apply_counts(payload.vehicle_counts.as_ref(), payload.total_vehicles());
            }
        }
    }
}
