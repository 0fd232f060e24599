//! Backend client error types.

use thiserror::Error;

/// Result type for backend operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors talking to the backend.
///
/// Transport errors mean the response could not be retrieved or was not a
/// success; application errors mean the backend answered successfully but
/// reported a failure in the payload.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {endpoint}: {message}")]
    HttpStatus {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("Backend error: {0}")]
    Application(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Cannot read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn application(msg: impl Into<String>) -> Self {
        Self::Application(msg.into())
    }

    pub fn invalid_response(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            message: msg.into(),
        }
    }

    /// Create an error from a non-success HTTP status.
    pub fn from_http_status(status: u16, endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Network failure or non-success status.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Network(_) | ClientError::HttpStatus { .. } | ClientError::InvalidResponse { .. }
        )
    }

    /// Success status carrying an error field.
    pub fn is_application(&self) -> bool {
        matches!(self, ClientError::Application(_))
    }

    /// HTTP status code, if the backend answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::HttpStatus { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
