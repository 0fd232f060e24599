//! Orchestrator error types.

use thiserror::Error;

use vcount_client::ClientError;
use vcount_media::MediaError;
use vcount_models::{JobPhase, ValidationError};

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Cannot {action} while {phase}")]
    InvalidState {
        action: &'static str,
        phase: JobPhase,
    },
}

impl OrchestratorError {
    pub fn invalid_state(action: &'static str, phase: JobPhase) -> Self {
        Self::InvalidState { action, phase }
    }

    /// Raised before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Media(_) | Self::InvalidState { .. })
    }
}
