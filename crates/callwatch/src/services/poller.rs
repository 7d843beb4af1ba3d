//! Status Poller - Periodic status queries per job
//!
//! At most one timer runs per job. A timer stops on its own once the session
//! is terminal or removed; provider errors are logged and the next tick
//! retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::domain::{IgnoreReason, UpdateSource};
use crate::ports::CallProvider;
use crate::services::session_manager::{PollHandle, SessionManager, UpdateOutcome};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Drives polling timers for tracked jobs
#[derive(Clone)]
pub struct StatusPoller {
    provider: Arc<dyn CallProvider>,
    sessions: Arc<SessionManager>,
    default_interval: Duration,
}

impl StatusPoller {
    pub fn new(
        provider: Arc<dyn CallProvider>,
        sessions: Arc<SessionManager>,
        default_interval: Duration,
    ) -> Self {
        Self {
            provider,
            sessions,
            default_interval,
        }
    }

    /// Start polling a job. Returns false when a timer is already running or
    /// the session is unknown or finished.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self, job_id: &str, every: Option<Duration>) -> bool {
        let Some(handle) = self.sessions.register_timer(job_id) else {
            tracing::debug!(job_id, "Polling not started");
            return false;
        };

        let every = every
            .filter(|d| !d.is_zero())
            .unwrap_or(self.default_interval);
        tracing::info!(job_id, interval = ?every, "⏱️ Polling started");

        let poller = self.clone();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            poller.run(job_id, handle, every).await;
        });
        true
    }

    /// Cancel a job's timer. Idempotent.
    pub fn stop_polling(&self, job_id: &str) -> bool {
        let stopped = self.sessions.cancel_timer(job_id);
        if stopped {
            tracing::info!(job_id, "⏹️ Polling stopped");
        }
        stopped
    }

    async fn run(self, job_id: String, handle: PollHandle, every: Duration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = handle.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.poll_once(&job_id).await {
                break;
            }
        }

        self.sessions.release_timer(&job_id, handle.id);
        tracing::debug!(job_id = %job_id, "Polling timer finished");
    }

    /// One status query. Returns false when polling should end.
    async fn poll_once(&self, job_id: &str) -> bool {
        match self.provider.query_status(job_id).await {
            Ok(report) => {
                let outcome = self.sessions.apply_update(
                    job_id,
                    report.status,
                    report.last_update,
                    report.embedded_results,
                    UpdateSource::Poll,
                );
                if matches!(outcome, UpdateOutcome::Ignored(IgnoreReason::UnknownJob)) {
                    return false;
                }
            }
            Err(e) => {
                tracing::warn!(
                    job_id,
                    provider = self.provider.name(),
                    "⚠️ Status poll failed: {}",
                    e
                );
            }
        }

        match self.sessions.status_of(job_id) {
            Some(status) if status.is_terminal() => {
                tracing::info!(job_id, %status, "🏁 Job finished, polling ends");
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}
