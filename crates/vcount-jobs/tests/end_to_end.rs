//! Full submit-poll-complete cycle over HTTP against a mock backend.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vcount_client::{endpoints, BackendClient, ClientConfig};
use vcount_jobs::{JobOrchestrator, OrchestratorConfig, PlateQuery, PlateSortField, SortDirection};
use vcount_models::{JobConfig, JobKind, JobPhase, VideoSource};

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_poll_interval(Duration::from_millis(50))
        .with_feed_interval(Duration::from_millis(100))
}

fn video_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    file.write_all(b"frames").unwrap();
    file
}

#[tokio::test]
async fn test_plate_job_completes_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoints::PROCESS_VIDEO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::STATUS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isProcessing": false,
            "completed": true,
            "currentFrame": 500,
            "totalFrames": 500
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::RESULTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalFrames": 500,
            "detections": [
                {"license_plate_text": "1234ABC", "license_plate_text_score": 97.0, "video_timestamp": "00:05"},
                {"license_plate_text": "5678XYZ", "license_plate_text_score": 92.0, "video_timestamp": "00:12"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::LIVE_DETECTIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = BackendClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap();
    let mut orchestrator = JobOrchestrator::new(Arc::new(client), fast_config());

    let video = video_file();
    let config = JobConfig::new(JobKind::PlateReading)
        .with_video(VideoSource::new(video.path()))
        .with_output_name("gate-3")
        .with_start_time("08:00");
    orchestrator.submit(config).await.unwrap();

    let phase = tokio::time::timeout(Duration::from_secs(5), orchestrator.wait_for_terminal())
        .await
        .unwrap();
    assert_eq!(phase, JobPhase::Completed);

    let query = PlateQuery::default().sort_by(PlateSortField::Plate, SortDirection::Ascending);
    let view = orchestrator.plate_view(&query).unwrap();
    assert_eq!(view.rows.len(), 2);
    assert_eq!(view.rows[0].plate, "1234ABC");

    let summary = orchestrator.summary().unwrap();
    assert_eq!(summary.detections, 2);
    assert_eq!(summary.frames_processed, 500);
}

#[tokio::test]
async fn test_status_http_failure_ends_in_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoints::PROCESS_VIDEO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::STATUS))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "worker died"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::RESULTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = BackendClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap();
    let mut orchestrator =
        JobOrchestrator::new(Arc::new(client), fast_config().with_live_feed(false));

    let video = video_file();
    let config = JobConfig::new(JobKind::PlateReading)
        .with_video(VideoSource::new(video.path()))
        .with_output_name("gate-3")
        .with_start_time("08:00");
    orchestrator.submit(config).await.unwrap();

    let phase = tokio::time::timeout(Duration::from_secs(5), orchestrator.wait_for_terminal())
        .await
        .unwrap();
    assert_eq!(phase, JobPhase::Failed);
    assert!(orchestrator.failure().unwrap().contains("worker died"));
}
