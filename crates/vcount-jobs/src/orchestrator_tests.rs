//! Lifecycle tests for the orchestrator against a scripted backend.
//!
//! All tests run on a paused clock; sleeping in the test advances time
//! deterministically and lets the polling tasks run.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use vcount_client::{ClientError, ClientResult, JobBackend};
use vcount_media::{MediaError, MediaHandle, MediaResult, MetadataSource, ProbeConfig, VideoProbe};
use vcount_models::{
    CountingLine, JobConfig, JobKind, JobPhase, JobStatus, LiveFeed, ProgressSource,
    ResultsPayload, SubmitAck, ValidationError, VideoSource,
};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::orchestrator::JobOrchestrator;
use crate::view::PlateQuery;

// =============================================================================
// Scripted backend
// =============================================================================

enum Ack {
    Started,
    Error(&'static str),
}

#[derive(Clone)]
enum Step {
    Reply(JobStatus),
    Delayed(Duration, JobStatus),
    HttpError(u16),
}

struct ScriptedBackend {
    ack: Ack,
    /// Consumed front to back; the last step repeats
    steps: Mutex<VecDeque<Step>>,
    results: ResultsPayload,
    feed_fails: bool,
    submits: AtomicUsize,
    polls: AtomicUsize,
    result_fetches: AtomicUsize,
    feed_fetches: AtomicUsize,
}

impl ScriptedBackend {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            ack: Ack::Started,
            steps: Mutex::new(steps.into()),
            results: ResultsPayload::default(),
            feed_fails: false,
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            result_fetches: AtomicUsize::new(0),
            feed_fetches: AtomicUsize::new(0),
        }
    }

    fn with_ack(mut self, ack: Ack) -> Self {
        self.ack = ack;
        self
    }

    fn with_results(mut self, results: Value) -> Self {
        self.results = serde_json::from_value(results).unwrap();
        self
    }

    fn with_failing_feed(mut self) -> Self {
        self.feed_fails = true;
        self
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap()
        }
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn submit_job(&self, _config: &JobConfig) -> ClientResult<SubmitAck> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        match self.ack {
            Ack::Started => Ok(serde_json::from_value(json!({"status": "started"})).unwrap()),
            Ack::Error(message) => Err(ClientError::application(message)),
        }
    }

    async fn fetch_status(&self) -> ClientResult<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Reply(status) => Ok(status),
            Step::Delayed(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(status)
            }
            Step::HttpError(code) => Err(ClientError::from_http_status(code, "/api/status", "boom")),
        }
    }

    async fn fetch_results(&self) -> ClientResult<ResultsPayload> {
        self.result_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }

    async fn fetch_live_feed(&self, _kind: JobKind) -> ClientResult<LiveFeed> {
        self.feed_fetches.fetch_add(1, Ordering::SeqCst);
        if self.feed_fails {
            return Err(ClientError::from_http_status(502, "/api/vehicle-detections", "bad gateway"));
        }
        Ok(LiveFeed::default())
    }
}

fn status(value: Value) -> JobStatus {
    serde_json::from_value(value).unwrap()
}

fn processing(frame: u64) -> Step {
    Step::Reply(status(json!({"isProcessing": true, "currentFrame": frame, "totalFrames": 1000})))
}

/// One real file shared by every test; submission checks it exists.
fn video_path() -> &'static Path {
    static VIDEO: OnceLock<tempfile::NamedTempFile> = OnceLock::new();
    VIDEO
        .get_or_init(|| tempfile::Builder::new().suffix(".mp4").tempfile().unwrap())
        .path()
}

fn counting_config() -> JobConfig {
    JobConfig::new(JobKind::VehicleCounting)
        .with_video(VideoSource::new(video_path()))
        .with_output_name("morning")
        .with_start_time("2024-05-02T08:00")
        .with_counting_line(CountingLine::new(10.0, 10.0, 200.0, 150.0))
}

fn plate_config() -> JobConfig {
    JobConfig::new(JobKind::PlateReading)
        .with_video(VideoSource::new(video_path()))
        .with_output_name("morning")
        .with_start_time("08:00")
}

fn orchestrator(backend: &Arc<ScriptedBackend>) -> JobOrchestrator {
    JobOrchestrator::new(backend.clone(), OrchestratorConfig::default())
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_missing_start_time_rejected_without_request() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(0)]));
    let mut orchestrator = orchestrator(&backend);

    let config = plate_config().with_start_time("");
    let err = assert_err!(orchestrator.submit(config).await);

    assert!(matches!(
        err,
        OrchestratorError::Validation(ValidationError::MissingField("start time"))
    ));
    assert!(err.is_local());
    assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.phase(), JobPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_rejected_without_request() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(0)]));
    let mut orchestrator = orchestrator(&backend);

    let config = counting_config().with_video(VideoSource::new("/definitely/not/here.mp4"));
    let err = assert_err!(orchestrator.submit(config).await);

    assert!(matches!(err, OrchestratorError::Media(MediaError::FileNotFound(_))));
    assert!(err.is_local());
    assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.phase(), JobPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_counting_job_requires_line() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(0)]));
    let mut orchestrator = orchestrator(&backend);

    let mut config = counting_config();
    config.counting_line = None;

    assert!(matches!(
        orchestrator.submit(config).await,
        Err(OrchestratorError::Validation(ValidationError::MissingCountingLine(_)))
    ));
    assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_application_error_on_submit_fails_job() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![processing(0)]).with_ack(Ack::Error("already processing")),
    );
    let mut orchestrator = orchestrator(&backend);

    let err = assert_err!(orchestrator.submit(counting_config()).await);
    assert!(matches!(err, OrchestratorError::Client(ref e) if e.is_application()));
    assert_eq!(orchestrator.phase(), JobPhase::Failed);
    assert_eq!(
        orchestrator.failure().as_deref(),
        Some("Backend error: already processing")
    );

    sleep_ms(5_000).await;
    assert_eq!(backend.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submit_while_polling_rejected() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(10)]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    assert!(matches!(
        orchestrator.submit(counting_config()).await,
        Err(OrchestratorError::InvalidState {
            phase: JobPhase::Polling,
            ..
        })
    ));
    assert_eq!(backend.submits.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Polling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_no_polls_while_idle() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(0)]));
    let _orchestrator = orchestrator(&backend);

    sleep_ms(10_000).await;
    assert_eq!(backend.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_completion_fetches_results_once() {
    let backend = Arc::new(
        ScriptedBackend::new(vec![
            processing(100),
            Step::Reply(status(json!({
                "isProcessing": false,
                "completed": true,
                "currentFrame": 1000,
                "totalFrames": 1000,
                "vehicleCounts": {"car": 5, "truck": 1}
            }))),
        ])
        .with_results(json!({
            "totalFrames": 1000,
            "vehicleCounts": {"car": 5, "truck": 2},
            "totalVehicles": 7
        })),
    );
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    assert_eq!(orchestrator.wait_for_terminal().await, JobPhase::Completed);

    assert_eq!(backend.result_fetches.load(Ordering::SeqCst), 1);
    let summary = orchestrator.summary().unwrap();
    assert_eq!(summary.total_vehicles, Some(7));
    assert_eq!(summary.frames_processed, 1000);
    assert_eq!(summary.output_name, "morning");

    let polls = backend.polls();
    sleep_ms(10_000).await;
    assert_eq!(backend.polls(), polls);
    assert_eq!(backend.result_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_field_fails_while_processing() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        processing(10),
        Step::Reply(status(json!({"isProcessing": true, "error": "model crashed"}))),
    ]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    assert_eq!(orchestrator.wait_for_terminal().await, JobPhase::Failed);
    assert_eq!(orchestrator.failure().as_deref(), Some("model crashed"));
    assert_eq!(backend.result_fetches.load(Ordering::SeqCst), 0);

    let polls = backend.polls();
    sleep_ms(10_000).await;
    assert_eq!(backend.polls(), polls);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_fails_without_retry() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(10), Step::HttpError(503)]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    assert_eq!(orchestrator.wait_for_terminal().await, JobPhase::Failed);
    assert!(orchestrator.failure().unwrap().contains("503"));

    sleep_ms(10_000).await;
    assert_eq!(backend.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_stops_all_requests() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(10)]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    sleep_ms(3_500).await;
    assert!(backend.polls() >= 3);
    assert!(backend.feed_fetches.load(Ordering::SeqCst) >= 1);

    orchestrator.dispose();
    let polls = backend.polls();
    let feeds = backend.feed_fetches.load(Ordering::SeqCst);

    sleep_ms(10_000).await;
    assert_eq!(backend.polls(), polls);
    assert_eq!(backend.feed_fetches.load(Ordering::SeqCst), feeds);
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_to_idle_and_stops_polling() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(10)]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    sleep_ms(1_500).await;

    orchestrator.reset();
    assert_eq!(orchestrator.phase(), JobPhase::Idle);
    assert!(orchestrator.status().is_none());

    let polls = backend.polls();
    sleep_ms(5_000).await;
    assert_eq!(backend.polls(), polls);
}

#[tokio::test(start_paused = true)]
async fn test_stale_status_response_discarded() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Delayed(
            Duration::from_millis(1_500),
            status(json!({"isProcessing": true, "currentFrame": 10, "totalFrames": 1000})),
        ),
        processing(20),
    ]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);

    // seq 1 resolves at 1.5s, after seq 2 (issued at 1s) was applied
    sleep_ms(1_700).await;
    assert_eq!(orchestrator.status().map(|s| s.current_frame), Some(20));
}

#[tokio::test(start_paused = true)]
async fn test_backend_slower_than_interval_still_completes() {
    let backend = Arc::new(ScriptedBackend::new(vec![Step::Delayed(
        Duration::from_millis(1_500),
        status(json!({"completed": true, "currentFrame": 300, "totalFrames": 300})),
    )]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    assert_eq!(orchestrator.wait_for_terminal().await, JobPhase::Completed);
    assert_eq!(backend.result_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_responses_applied_in_issue_order() {
    let slow = |frame: u64| {
        Step::Delayed(
            Duration::from_millis(1_500),
            status(json!({"isProcessing": true, "currentFrame": frame, "totalFrames": 1000})),
        )
    };
    let backend = Arc::new(ScriptedBackend::new(vec![slow(10), slow(20), slow(30)]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);

    // Requests issued at 0s, 1s and 2s resolve at 1.5s, 2.5s and 3.5s
    sleep_ms(1_700).await;
    assert_eq!(orchestrator.status().map(|s| s.current_frame), Some(10));
    sleep_ms(1_000).await;
    assert_eq!(orchestrator.status().map(|s| s.current_frame), Some(20));
    assert_eq!(orchestrator.phase(), JobPhase::Polling);
}

#[tokio::test(start_paused = true)]
async fn test_feed_failure_does_not_fail_job() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(10)]).with_failing_feed());
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(counting_config()).await);
    sleep_ms(6_500).await;

    assert!(backend.feed_fetches.load(Ordering::SeqCst) >= 3);
    assert_eq!(orchestrator.phase(), JobPhase::Polling);
    assert!(orchestrator.failure().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_partial_plates_not_duplicated() {
    let plate = |text: &str| json!({"license_plate_text": text, "license_plate_text_score": 95.0});
    let backend = Arc::new(ScriptedBackend::new(vec![
        Step::Reply(status(json!({"isProcessing": true, "results": [plate("1234ABC"), plate("5678XYZ")]}))),
        Step::Reply(status(json!({"isProcessing": true, "results": [plate("1234ABC"), plate("9999KLM")]}))),
        Step::Reply(status(json!({"isProcessing": true, "results": [plate("5678xyz")]}))),
    ]));
    let mut orchestrator = orchestrator(&backend);

    assert_ok!(orchestrator.submit(plate_config()).await);
    sleep_ms(5_500).await;

    let view = orchestrator.plate_view(&PlateQuery::default()).unwrap();
    assert_eq!(view.total, 3);
    assert_eq!(view.unique_plates, 3);
    assert!(orchestrator.vehicle_view(&Default::default()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_snapshots_published_to_subscribers() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(250)]));
    let mut orchestrator = orchestrator(&backend);
    let mut snapshots = orchestrator.subscribe();

    assert_ok!(orchestrator.submit(counting_config()).await);
    let snapshot = snapshots
        .wait_for(|s| s.status.is_some())
        .await
        .unwrap()
        .clone();

    assert_eq!(snapshot.phase, JobPhase::Polling);
    assert_eq!(snapshot.progress.source, ProgressSource::Derived);
    assert!((snapshot.progress.percent - 25.0).abs() < 1e-9);
}

// =============================================================================
// Probe
// =============================================================================

struct FixedDuration(Option<f64>);

#[async_trait]
impl MetadataSource for FixedDuration {
    fn open(&self, path: &Path) -> MediaResult<MediaHandle> {
        Ok(MediaHandle {
            id: 1,
            path: path.to_path_buf(),
        })
    }

    async fn duration(&self, _handle: &MediaHandle) -> MediaResult<f64> {
        self.0.ok_or_else(|| MediaError::invalid_video("unreadable"))
    }

    fn release(&self, _handle: &MediaHandle) {}
}

#[tokio::test(start_paused = true)]
async fn test_probe_estimate_seeds_progress() {
    let backend = Arc::new(ScriptedBackend::new(vec![Step::Reply(status(
        json!({"isProcessing": true, "currentFrame": 50, "totalFrames": 0}),
    ))]));
    let probe = VideoProbe::new(Arc::new(FixedDuration(Some(10.0))), ProbeConfig::default());
    let mut orchestrator = orchestrator(&backend).with_probe(probe);

    assert_ok!(orchestrator.submit(counting_config()).await);
    sleep_ms(100).await;

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.estimate.map(|e| e.estimated_total_frames), Some(250));
    assert_eq!(snapshot.progress.source, ProgressSource::Estimated);
    assert!((snapshot.progress.percent - 20.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_aborts_before_request() {
    let backend = Arc::new(ScriptedBackend::new(vec![processing(0)]));
    let probe = VideoProbe::new(Arc::new(FixedDuration(None)), ProbeConfig::default());
    let mut orchestrator = orchestrator(&backend).with_probe(probe);

    assert!(matches!(
        orchestrator.submit(counting_config()).await,
        Err(OrchestratorError::Media(_))
    ));
    assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.phase(), JobPhase::Idle);
}
