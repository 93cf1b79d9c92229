//! Error types for the calendar agent

use thiserror::Error;

use crate::pipeline::PipelineStage;
use crate::schema::ValidationError;

/// Errors that can occur while turning calendar data into features
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] ValidationError),

    #[error("Failed to parse calendar payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported calendar provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid analysis parameters: {0}")]
    InvalidParams(String),
}

/// Errors reported by an event fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to read calendar payload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid calendar payload: {0}")]
    Payload(#[from] AnalysisError),

    #[error("Calendar provider error: {0}")]
    Upstream(String),
}

/// Errors reported by a feature sender
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analytics endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Failure of a single pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported calendar provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid analysis request: {0}")]
    InvalidRequest(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl PipelineError {
    /// Stage the run was in when it failed
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::UnsupportedProvider(_) | PipelineError::InvalidRequest(_) => {
                PipelineStage::Idle
            }
            PipelineError::Fetch(_) => PipelineStage::Fetching,
            PipelineError::Analysis(_) | PipelineError::Delivery(_) => PipelineStage::Analyzing,
        }
    }

    /// Whether a scheduler may try the same request again
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Fetch(_) | PipelineError::Delivery(_))
    }
}

/// Invalid agent configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors from the periodic analysis scheduler
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
