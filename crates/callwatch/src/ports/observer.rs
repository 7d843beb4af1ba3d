//! Session Observer Port
//!
//! Observers are told about every accepted session write, synchronously,
//! after the write is committed.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entities::CallSession;
use crate::domain::value_objects::{CallStatus, UpdateSource};

/// Snapshot handed to observers
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate {
    pub session: CallSession,
    pub previous_status: CallStatus,
    pub source: UpdateSource,
}

impl SessionUpdate {
    pub fn job_id(&self) -> &str {
        &self.session.job_id
    }

    /// True when this write moved the session into a new state
    pub fn is_transition(&self) -> bool {
        self.previous_status != self.session.status
    }

    /// True when this write moved the session into `completed`
    pub fn entered_completed(&self) -> bool {
        self.is_transition() && self.session.status == CallStatus::Completed
    }
}

/// Receives session updates
///
/// Called with the session lock released. Implementations must not block;
/// hand heavy work to a task.
pub trait SessionObserver: Send + Sync {
    fn on_update(&self, update: &SessionUpdate);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionUpdate) + Send + Sync,
{
    fn on_update(&self, update: &SessionUpdate) {
        self(update)
    }
}

/// Observer that only forwards updates for one job
pub struct JobFilter {
    job_id: String,
    inner: Arc<dyn SessionObserver>,
}

impl JobFilter {
    pub fn new(job_id: impl Into<String>, inner: Arc<dyn SessionObserver>) -> Self {
        Self {
            job_id: job_id.into(),
            inner,
        }
    }
}

impl SessionObserver for JobFilter {
    fn on_update(&self, update: &SessionUpdate) {
        if update.job_id() == self.job_id {
            self.inner.on_update(update);
        }
    }
}

/// Observer that logs every update through `tracing`
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_update(&self, update: &SessionUpdate) {
        if update.is_transition() {
            tracing::info!(
                job_id = %update.job_id(),
                source = %update.source,
                "📞 {} → {}",
                update.previous_status,
                update.session.status
            );
        } else {
            tracing::debug!(
                job_id = %update.job_id(),
                source = %update.source,
                status = %update.session.status,
                "Session refreshed"
            );
        }
    }
}
