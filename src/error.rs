use std::time::Duration;

use thiserror::Error;

/// Failure reported by the model service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Rate limited; eligible for retry with backoff.
    #[error("model service rate limited (status {status}): {message}")]
    Transient {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("model service request failed: {message}")]
    Permanent {
        status: Option<u16>,
        message: String,
    },
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Permanent { .. } => None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            message: message.into(),
        }
    }
}

/// Per-unit failure. Every variant skips the current unit; none aborts a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("malformed model output: {0}")]
    Format(String),
    #[error("schema violation: {0}")]
    Schema(String),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("incomplete record: {0}")]
    IncompleteRecord(String),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Service(ServiceError::Transient { .. }) => "transient_service",
            Self::Service(ServiceError::Permanent { .. }) => "permanent_service",
            Self::Format(_) => "format",
            Self::Schema(_) => "schema",
            Self::MissingInput(_) => "missing_input",
            Self::IncompleteRecord(_) => "incomplete_record",
        }
    }
}
