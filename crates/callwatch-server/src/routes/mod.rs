//! Callwatch API Routes
//!
//! - /api/calls - Start and list tracked calls
//! - /api/calls/:job_id - Session status, stop, reconcile, result, diagnostics
//! - /api/webhook - Provider push channel
//! - /api/events - Server-sent session updates

use axum::http::StatusCode;

use callwatch::TrackerError;

pub mod call;
pub mod events;
pub mod swagger;
pub mod webhook;

/// Map tracker errors onto HTTP responses
pub fn error_response(e: TrackerError) -> (StatusCode, String) {
    let status = match &e {
        TrackerError::Dispatch(_) => StatusCode::BAD_REQUEST,
        TrackerError::DuplicateJob { .. } => StatusCode::CONFLICT,
        TrackerError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        TrackerError::NotReconcilable { .. } => StatusCode::CONFLICT,
        TrackerError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}
