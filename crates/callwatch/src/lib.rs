//! Callwatch Library
//!
//! Lifecycle tracking for outbound conversational-AI phone calls.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure entities and logic
//!   - `entities/`: Sessions, jobs, results, conversation records
//!   - `value_objects/`: CallStatus, Confidence, Transcript, UpdateSource
//!   - `errors/`: TrackerError
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `CallProvider`: the external conversational-AI provider
//!   - `SessionObserver`: receivers of session updates
//!
//! - **Services** (`services/`): Session manager, status poller, event
//!   ingestor, result reconciler, diagnostics and the `CallTracker` facade
//!
//! # Usage
//!
//! ```rust,ignore
//! use callwatch::{AgentConfig, CallTracker, TrackerConfig};
//!
//! let tracker = CallTracker::new(provider, TrackerConfig::default());
//! let session = tracker.start("+34699043286", AgentConfig::default()).await?;
//! ```

pub mod domain;
pub mod ports;
pub mod services;

// Re-export commonly used types
pub use domain::{
    AgentConfig, CallEvent, CallJob, CallOutcome, CallResult, CallSession, CallStatus,
    Confidence, ConversationDetail, ConversationRecord, DiagnosticSnapshot, DispatchedCall,
    ExtractedAnswer, IgnoreReason, ProviderAnswer, ResultState, StatusReport, Transcript,
    TrackerError, UpdateSource,
};
pub use ports::{CallProvider, JobFilter, LoggingObserver, SessionObserver, SessionUpdate};
pub use services::{CallTracker, ReconcileOutcome, TrackerConfig, UpdateOutcome};
