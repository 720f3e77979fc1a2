//! Error types for the course-generation pipeline.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pipeline error taxonomy.
///
/// `Validation` and `Authorization` are surfaced synchronously to the caller before a
/// job opens. `ExternalService` and `Storage` only occur inside the detached sequence,
/// where they are converted into generation log rows.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies and log rows.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "VALIDATION_ERROR",
            PipelineError::Authorization(_) => "AUTHORIZATION_ERROR",
            PipelineError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            PipelineError::Storage(_) => "STORAGE_ERROR",
            PipelineError::NotFound(_) => "NOT_FOUND_ERROR",
            PipelineError::Unavailable(_) => "QUEUE_UNAVAILABLE",
            PipelineError::Config(_) => "CONFIGURATION_ERROR",
            PipelineError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP status matching the error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Validation(_) => 400,
            PipelineError::Authorization(_) => 401,
            PipelineError::NotFound(_) => 404,
            PipelineError::ExternalService { .. } => 502,
            PipelineError::Unavailable(_) => 503,
            PipelineError::Storage(_) | PipelineError::Config(_) | PipelineError::Internal(_) => {
                500
            }
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}
