//! Tracker Services
//!
//! - SessionManager: authoritative session store and timer registry
//! - StatusPoller: per-job status polling
//! - EventIngestor: push-channel events
//! - ResultReconciler: conversation lookup and normalization
//! - DiagnosticsCollector: raw provider records for triage
//! - CallTracker: facade wiring them together

pub mod diagnostics;
pub mod extraction;
pub mod ingestor;
pub mod poller;
pub mod reconciler;
pub mod session_manager;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use diagnostics::DiagnosticsCollector;
pub use extraction::{extract_answer, NOT_ANSWERED};
pub use ingestor::EventIngestor;
pub use poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
pub use reconciler::{
    normalize_conversation, ReconcileOutcome, ResultReconciler, DEFAULT_MAX_ATTEMPTS,
};
pub use session_manager::{PollHandle, ReconcilePlan, SessionManager, UpdateOutcome};
pub use tracker::{CallTracker, TrackerConfig};
