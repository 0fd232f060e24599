//! Structured job logging.
//!
//! Every event carries the client-side job id, the job kind and a `stage`
//! field, so one submission can be followed across the submit call and
//! both polling tasks.

use tracing::{error, info, warn, Span};
use vcount_models::{JobId, JobKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Submitted,
    Progress,
    Degraded,
    Failed,
    Completed,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Submitted => "submitted",
            Stage::Progress => "progress",
            Stage::Degraded => "degraded",
            Stage::Failed => "failed",
            Stage::Completed => "completed",
        }
    }
}

/// Lifecycle logger for one submission.
///
/// Cheap to clone; the submit path and each polling task hold their own copy.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    kind: JobKind,
}

impl JobLogger {
    /// # Arguments
    /// * `job_id` - Id generated for the submission before it is sent
    /// * `kind` - Job kind, logged as its wire name
    pub fn new(job_id: &JobId, kind: JobKind) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
        }
    }

    /// The upload is about to be sent.
    pub fn log_start(&self, message: &str) {
        self.emit(Stage::Submitted, message);
    }

    /// A status snapshot moved the job forward.
    pub fn log_progress(&self, message: &str) {
        self.emit(Stage::Progress, message);
    }

    /// Something went wrong that does not end the job, e.g. a failed live-feed fetch.
    pub fn log_warning(&self, message: &str) {
        self.emit(Stage::Degraded, message);
    }

    /// The job moved to `Failed` with this message.
    pub fn log_error(&self, message: &str) {
        self.emit(Stage::Failed, message);
    }

    /// Final results were applied; `message` is the job summary.
    pub fn log_completion(&self, message: &str) {
        self.emit(Stage::Completed, message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Parent span for the polling tasks of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, kind = self.kind.as_str())
    }

    fn emit(&self, stage: Stage, message: &str) {
        let (job_id, kind, stage_name) = (&self.job_id, self.kind.as_str(), stage.as_str());
        match stage {
            Stage::Failed => error!(%job_id, kind, stage = stage_name, "{}", message),
            Stage::Degraded => warn!(%job_id, kind, stage = stage_name, "{}", message),
            _ => info!(%job_id, kind, stage = stage_name, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_carries_ids() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, JobKind::PlateReading);

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.kind(), JobKind::PlateReading);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Degraded.as_str(), "degraded");
        assert_eq!(Stage::Completed.as_str(), "completed");
    }
}
