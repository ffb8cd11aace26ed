//! Orchestrator-specific error types

use shared::{SharedError, WorkerTag};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Cache backend not available: {message}")]
    CacheUnavailable { message: String },

    #[error("Cache operation failed: {message}")]
    CacheError { message: String },

    #[error("Failed to spawn worker process: {message}")]
    ProcessError { message: String },

    #[error("Worker '{name}' ({tag}) failed with exit code {exit_code}")]
    WorkerFailed { name: String, tag: WorkerTag, exit_code: i32 },

    #[error("Could not determine process status of worker '{name}': {details}")]
    StatusContractViolation { name: String, details: String },

    #[error("Configuration error: {field}: {reason}")]
    ConfigurationError { field: String, reason: String },

    #[error("Shared component error")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn process(message: impl Into<String>) -> Self {
        Self::ProcessError { message: message.into() }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::CacheError { message: message.into() }
    }

    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for the error raised when a worker exits non-zero
    pub fn is_worker_failure(&self) -> bool {
        matches!(self, Self::WorkerFailed { .. })
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
