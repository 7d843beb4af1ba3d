//! Domain Errors
//!
//! Error types for tracker operations.

use thiserror::Error;

use super::value_objects::CallStatus;

/// Tracker errors
///
/// "No matching conversation yet" is deliberately absent: it is a valid
/// reconciliation result, not a failure.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Dispatch rejected: {0}")]
    Dispatch(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("A session for job {job_id} is already active")]
    DuplicateJob { job_id: String },

    #[error("Session not found: {job_id}")]
    SessionNotFound { job_id: String },

    #[error("Job {job_id} ended as {status} and cannot be reconciled")]
    NotReconcilable { job_id: String, status: CallStatus },
}

impl TrackerError {
    pub fn dispatch<T: AsRef<str>>(reason: T) -> Self {
        Self::Dispatch(reason.as_ref().to_string())
    }

    pub fn unavailable<T: std::fmt::Display>(cause: T) -> Self {
        Self::ProviderUnavailable(cause.to_string())
    }

    pub fn duplicate(job_id: &str) -> Self {
        Self::DuplicateJob {
            job_id: job_id.to_string(),
        }
    }

    pub fn session_not_found(job_id: &str) -> Self {
        Self::SessionNotFound {
            job_id: job_id.to_string(),
        }
    }

    /// Transient failures are worth retrying on the caller's own cadence.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}
