//! Job lifecycle: `Idle -> Submitting -> Polling -> Completed | Failed`.
//!
//! State lives behind a mutex shared with the polling tasks and is
//! published to subscribers through a `watch` channel after every change.
//! Every submission and reset bumps a generation counter; a task only
//! applies a response while its generation is current and the phase is
//! still `Polling`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use vcount_client::{ClientError, JobBackend};
use vcount_media::{ensure_readable, FrameEstimate, VideoProbe};
use vcount_models::{
    JobConfig, JobId, JobKind, JobPhase, JobStatus, Progress, ResultsPayload,
};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::logging::JobLogger;
use crate::poller::PollingSession;
use crate::reconciler::{ResultReconciler, ResultSet};
use crate::view::{detection_rate, PlateQuery, PlateView, VehicleQuery, VehicleView};

/// What presentation observes after each state change.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    pub job_id: Option<JobId>,
    pub status: Option<JobStatus>,
    pub progress: Progress,
    pub estimate: Option<FrameEstimate>,
    pub failure: Option<String>,
    /// Rows currently held by the reconciler
    pub result_count: usize,
}

/// Produced once when a job completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub output_name: String,
    pub frames_processed: u64,
    pub detections: u64,
    pub total_vehicles: Option<u64>,
    pub detection_rate: Option<f64>,
}

impl JobSummary {
    fn build(
        config: Option<&JobConfig>,
        status: Option<&JobStatus>,
        payload: &ResultsPayload,
        results: &ResultSet,
    ) -> Self {
        let frames_processed = payload
            .total_frames
            .filter(|f| *f > 0)
            .or_else(|| status.map(|s| s.current_frame.max(s.total_frames)))
            .unwrap_or(0);
        let detections = payload.total_detections.unwrap_or(results.len() as u64);
        let total_vehicles = match results {
            ResultSet::Vehicles(vehicles) => Some(vehicles.total_vehicles()),
            ResultSet::Plates(_) => None,
        };

        Self {
            output_name: config
                .map(|c| c.output_name.trim().to_string())
                .unwrap_or_default(),
            frames_processed,
            detections,
            total_vehicles,
            detection_rate: detection_rate(detections, frames_processed),
        }
    }

    pub fn describe(&self) -> String {
        let mut text = format!(
            "{}: {} detections over {} frames",
            self.output_name, self.detections, self.frames_processed
        );
        if let Some(total) = self.total_vehicles {
            text.push_str(&format!(", {} vehicles", total));
        }
        if let Some(rate) = self.detection_rate {
            text.push_str(&format!(" ({:.2}% detection rate)", rate));
        }
        text
    }
}

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct JobState {
    pub(crate) phase: JobPhase,
    pub(crate) generation: u64,
    pub(crate) job_id: Option<JobId>,
    pub(crate) config: Option<JobConfig>,
    pub(crate) status: Option<JobStatus>,
    pub(crate) estimate: Option<FrameEstimate>,
    pub(crate) failure: Option<String>,
    pub(crate) reconciler: ResultReconciler,
    pub(crate) summary: Option<JobSummary>,
}

impl JobState {
    fn new() -> Self {
        Self {
            phase: JobPhase::Idle,
            generation: 0,
            job_id: None,
            config: None,
            status: None,
            estimate: None,
            failure: None,
            reconciler: ResultReconciler::new(JobKind::default()),
            summary: None,
        }
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.phase == JobPhase::Polling
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress::resolve(
            self.status.as_ref(),
            self.estimate.map(|e| e.estimated_total_frames),
        )
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            phase: self.phase,
            job_id: self.job_id.clone(),
            status: self.status.clone(),
            progress: self.progress(),
            estimate: self.estimate,
            failure: self.failure.clone(),
            result_count: self.reconciler.results().len(),
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.phase = JobPhase::Failed;
        self.failure = Some(message.into());
    }

    pub(crate) fn complete(&mut self, payload: &ResultsPayload) -> JobSummary {
        self.reconciler.apply_final(payload);
        let summary = JobSummary::build(
            self.config.as_ref(),
            self.status.as_ref(),
            payload,
            self.reconciler.results(),
        );
        self.phase = JobPhase::Completed;
        self.summary = Some(summary.clone());
        summary
    }
}

pub(crate) struct Shared {
    state: Mutex<JobState>,
    snapshots: watch::Sender<JobSnapshot>,
}

impl Shared {
    fn new() -> Self {
        let state = JobState::new();
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            state: Mutex::new(state),
            snapshots,
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the state, then publish a snapshot.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut JobState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.snapshots.send_replace(state.snapshot());
        result
    }

    /// Like [`update`](Self::update), but only while `generation` is polling.
    pub(crate) fn update_if_current<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut JobState) -> R,
    ) -> Option<R> {
        let mut state = self.lock();
        if !state.is_current(generation) {
            return None;
        }
        let result = f(&mut state);
        self.snapshots.send_replace(state.snapshot());
        Some(result)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&JobState) -> R) -> R {
        f(&self.lock())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns one job at a time from submission to a terminal phase.
pub struct JobOrchestrator {
    backend: Arc<dyn JobBackend>,
    probe: Option<VideoProbe>,
    config: OrchestratorConfig,
    shared: Arc<Shared>,
    session: Option<PollingSession>,
}

impl JobOrchestrator {
    pub fn new(backend: Arc<dyn JobBackend>, config: OrchestratorConfig) -> Self {
        Self {
            backend,
            probe: None,
            config,
            shared: Arc::new(Shared::new()),
            session: None,
        }
    }

    /// Probe the video before submitting to seed the progress denominator.
    pub fn with_probe(mut self, probe: VideoProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn phase(&self) -> JobPhase {
        self.shared.read(|s| s.phase)
    }

    pub fn failure(&self) -> Option<String> {
        self.shared.read(|s| s.failure.clone())
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.shared.read(|s| s.status.clone())
    }

    pub fn progress(&self) -> Progress {
        self.shared.read(JobState::progress)
    }

    pub fn summary(&self) -> Option<JobSummary> {
        self.shared.read(|s| s.summary.clone())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.read(JobState::snapshot)
    }

    /// Receiver updated after every state change.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Read the reconciled results without copying them.
    pub fn with_results<R>(&self, f: impl FnOnce(&ResultSet) -> R) -> R {
        self.shared.read(|s| f(s.reconciler.results()))
    }

    /// Plate view, when the current job reads plates.
    pub fn plate_view(&self, query: &PlateQuery) -> Option<PlateView> {
        self.with_results(|r| r.as_plates().map(|p| PlateView::build(p, query)))
    }

    /// Vehicle view, when the current job counts vehicles.
    pub fn vehicle_view(&self, query: &VehicleQuery) -> Option<VehicleView> {
        self.with_results(|r| r.as_vehicles().map(|v| VehicleView::build(v, query)))
    }

    /// Validate, probe and submit a job, then start polling.
    ///
    /// Validation failures, an unreadable file and probe failures return
    /// before any request is sent and leave the phase untouched. Backend failures move the job to `Failed`.
    pub async fn submit(&mut self, config: JobConfig) -> OrchestratorResult<JobId> {
        let phase = self.phase();
        if matches!(phase, JobPhase::Submitting | JobPhase::Polling) {
            return Err(OrchestratorError::invalid_state("submit", phase));
        }

        config.validate()?;
        if let Some(video) = &config.video {
            ensure_readable(video.path()).await?;
        }

        let estimate = match (&self.probe, &config.video) {
            (Some(probe), Some(video)) => Some(probe.probe(video.path()).await?),
            _ => None,
        };

        // The previous job is terminal or idle; its tasks have already stopped
        self.session = None;

        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, config.kind);
        let generation = self.shared.update(|state| {
            state.generation += 1;
            state.phase = JobPhase::Submitting;
            state.job_id = Some(job_id.clone());
            state.status = None;
            state.estimate = estimate;
            state.failure = None;
            state.summary = None;
            state.reconciler = ResultReconciler::new(config.kind);
            state.config = Some(config.clone());
            state.generation
        });

        logger.log_start(&format!(
            "submitting {} ({} estimated frames)",
            config
                .video
                .as_ref()
                .map(|v| v.file_name())
                .unwrap_or_default(),
            estimate.map(|e| e.estimated_total_frames).unwrap_or(0)
        ));

        let outcome = match self.backend.submit_job(&config).await {
            Ok(ack) if ack.is_started() => Ok(()),
            Ok(ack) => Err(ClientError::application(
                ack.message
                    .as_deref()
                    .unwrap_or("backend did not acknowledge the job"),
            )),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            logger.log_error(&e.to_string());
            self.shared.update(|state| {
                if state.generation == generation {
                    state.fail(e.to_string());
                }
            });
            return Err(e.into());
        }

        self.shared.update(|state| {
            if state.generation == generation {
                state.phase = JobPhase::Polling;
            }
        });
        logger.log_progress("backend acknowledged, polling status");

        self.session = Some(PollingSession::start(
            self.shared.clone(),
            self.backend.clone(),
            &self.config,
            config.kind,
            generation,
            logger,
        ));

        Ok(job_id)
    }

    /// Wait until the current job reaches `Completed` or `Failed`.
    ///
    /// Returns immediately with the current phase when nothing is running.
    pub async fn wait_for_terminal(&self) -> JobPhase {
        let mut receiver = self.subscribe();
        let result = receiver
            .wait_for(|s| !matches!(s.phase, JobPhase::Submitting | JobPhase::Polling))
            .await
            .map(|s| s.phase);
        match result {
            Ok(phase) => phase,
            Err(_) => self.phase(),
        }
    }

    /// Stop polling and return to `Idle`, discarding any late responses.
    pub fn reset(&mut self) {
        self.stop_session();
        self.shared.update(|state| {
            let generation = state.generation + 1;
            *state = JobState::new();
            state.generation = generation;
        });
        info!("Job state reset");
    }

    /// Stop every task this orchestrator started.
    pub fn dispose(mut self) {
        self.stop_session();
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
        self.shared.update(|state| {
            if state.phase == JobPhase::Polling {
                warn!(job_id = ?state.job_id.as_ref().map(JobId::as_str), "Polling cancelled");
            }
            state.generation += 1;
        });
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("phase", &self.phase())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
