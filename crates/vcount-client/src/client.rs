//! Backend REST client.
//!
//! One reqwest client shared by every call, with:
//! - Connect and request timeouts (longer for the upload)
//! - Status and error-field checks mapped to [`ClientError`]
//! - Tracing spans and request metrics per endpoint

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info_span, Instrument};
use url::Url;

use vcount_models::{
    HealthInfo, JobConfig, JobKind, JobStatus, LiveFeed, ResultsPayload, SubmitAck, VideoSource,
};

use crate::backend::JobBackend;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;

/// Backend endpoint paths.
pub mod endpoints {
    pub const PROCESS_VIDEO: &str = "/api/process-video";
    pub const STATUS: &str = "/api/status";
    pub const RESULTS: &str = "/api/results";
    pub const LIVE_DETECTIONS: &str = "/api/live-detections";
    pub const VEHICLE_DETECTIONS: &str = "/api/vehicle-detections";
    pub const EXTRACT_FIRST_FRAME: &str = "/api/extract-first-frame";
    pub const DOWNLOAD_CSV: &str = "/api/download-csv";
    pub const HEALTH: &str = "/health";
}

/// Scalar multipart fields for a submission, in send order.
///
/// The counting line, when present, goes as four separate fields.
pub fn form_fields(config: &JobConfig) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("fileName", config.output_name.trim().to_string()),
        ("startTime", config.start_time.trim().to_string()),
        ("direction", config.direction.as_str().to_string()),
        ("orientation", config.orientation.as_str().to_string()),
        ("motionThreshold", config.thresholds.motion.to_string()),
        ("confidenceThreshold", config.thresholds.confidence.to_string()),
    ];

    if let Some(line) = &config.counting_line {
        fields.push(("lineX1", line.x1.to_string()));
        fields.push(("lineY1", line.y1.to_string()));
        fields.push(("lineX2", line.x2.to_string()));
        fields.push(("lineY2", line.y2.to_string()));
    }

    fields
}

/// Backend REST client.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    config: ClientConfig,
    base_url: Url,
}

impl BackendClient {
    /// Create a new backend client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vcount-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// `GET /health`
    pub async fn health(&self) -> ClientResult<HealthInfo> {
        self.get_json("health", endpoints::HEALTH).await
    }

    /// `GET /api/download-csv`, returned as raw bytes.
    pub async fn download_csv(&self) -> ClientResult<Vec<u8>> {
        let url = self.url(endpoints::DOWNLOAD_CSV)?;
        let response = self
            .execute("download_csv", endpoints::DOWNLOAD_CSV, self.http.get(url))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// `POST /api/extract-first-frame`: upload the video, receive the first
    /// frame as an encoded image.
    pub async fn extract_first_frame(&self, video: &VideoSource) -> ClientResult<Vec<u8>> {
        let url = self.url(endpoints::EXTRACT_FIRST_FRAME)?;
        let form = Form::new().part("video", video_part(video).await?);
        let request = self
            .http
            .post(url)
            .timeout(self.config.upload_timeout)
            .multipart(form);

        let response = self
            .execute("extract_first_frame", endpoints::EXTRACT_FIRST_FRAME, request)
            .await?;

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            // An image endpoint answering JSON is reporting a failure
            let ack: SubmitAck = decode(endpoints::EXTRACT_FIRST_FRAME, response).await?;
            return Err(ClientError::application(
                ack.failure()
                    .or(ack.message.as_deref())
                    .unwrap_or("first frame extraction returned no image"),
            ));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> ClientResult<T> {
        let url = self.url(path)?;
        let response = self.execute(operation, path, self.http.get(url)).await?;
        decode(path, response).await
    }

    /// Send a request, recording metrics and rejecting non-success statuses.
    async fn execute(
        &self,
        operation: &str,
        endpoint: &str,
        request: RequestBuilder,
    ) -> ClientResult<Response> {
        let span = info_span!("backend_request", operation = %operation, endpoint = %endpoint);

        async {
            let start = Instant::now();
            let result = request.send().await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    record_request(operation, 0, latency_ms);
                    return Err(ClientError::Network(e));
                }
            };

            let status = response.status();
            record_request(operation, status.as_u16(), latency_ms);
            debug!(status = status.as_u16(), latency_ms, "Backend responded");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            Err(ClientError::from_http_status(
                status.as_u16(),
                endpoint,
                error_message(&body, status.canonical_reason().unwrap_or("request failed")),
            ))
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl JobBackend for BackendClient {
    async fn submit_job(&self, config: &JobConfig) -> ClientResult<SubmitAck> {
        let video = config
            .video
            .as_ref()
            .ok_or_else(|| ClientError::application("no video file in configuration"))?;

        let mut form = Form::new().part("video", video_part(video).await?);
        for (name, value) in form_fields(config) {
            form = form.text(name, value);
        }

        let url = self.url(endpoints::PROCESS_VIDEO)?;
        let request = self
            .http
            .post(url)
            .timeout(self.config.upload_timeout)
            .multipart(form);

        let response = self
            .execute("submit_job", endpoints::PROCESS_VIDEO, request)
            .await?;
        let ack: SubmitAck = decode(endpoints::PROCESS_VIDEO, response).await?;

        if let Some(error) = ack.failure() {
            return Err(ClientError::application(error));
        }
        Ok(ack)
    }

    async fn fetch_status(&self) -> ClientResult<JobStatus> {
        self.get_json("fetch_status", endpoints::STATUS).await
    }

    async fn fetch_results(&self) -> ClientResult<ResultsPayload> {
        self.get_json("fetch_results", endpoints::RESULTS).await
    }

    async fn fetch_live_feed(&self, kind: JobKind) -> ClientResult<LiveFeed> {
        let path = match kind {
            JobKind::PlateReading => endpoints::LIVE_DETECTIONS,
            JobKind::VehicleCounting => endpoints::VEHICLE_DETECTIONS,
        };
        self.get_json("fetch_live_feed", path).await
    }
}

/// Base URL with a trailing slash so joins keep any path prefix.
fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// Streamed file part for a video upload.
async fn video_part(video: &VideoSource) -> ClientResult<Part> {
    let file = tokio::fs::File::open(video.path()).await?;
    let length = file.metadata().await?.len();
    let mime = mime_guess::from_path(video.path()).first_or_octet_stream();

    Part::stream_with_length(Body::from(file), length)
        .file_name(video.file_name())
        .mime_str(mime.as_ref())
        .map_err(ClientError::Network)
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::invalid_response(endpoint, e.to_string()))
}

/// Prefer the backend's `error` field over the bare status reason.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                fallback.to_string()
            } else {
                body.trim().chars().take(200).collect()
            }
        })
}
