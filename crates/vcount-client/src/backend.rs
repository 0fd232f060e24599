//! Backend seam driven by the job orchestrator.

use async_trait::async_trait;

use vcount_models::{JobConfig, JobKind, JobStatus, LiveFeed, ResultsPayload, SubmitAck};

use crate::error::ClientResult;

/// The four calls the job lifecycle needs.
///
/// `submit_job` fails with an application error when the acknowledgement
/// carries an error field. The fetch calls return payloads as reported;
/// interpreting their error fields is left to the caller.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// `POST /api/process-video`
    async fn submit_job(&self, config: &JobConfig) -> ClientResult<SubmitAck>;

    /// `GET /api/status`
    async fn fetch_status(&self) -> ClientResult<JobStatus>;

    /// `GET /api/results`
    async fn fetch_results(&self) -> ClientResult<ResultsPayload>;

    /// Supplementary feed for the job kind.
    async fn fetch_live_feed(&self, kind: JobKind) -> ClientResult<LiveFeed>;
}
