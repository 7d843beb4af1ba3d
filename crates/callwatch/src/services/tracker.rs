//! Call Tracker - Facade over the tracking services
//!
//! Wires the session manager, poller, ingestor and reconciler together and
//! exposes the operations callers (HTTP API, CLI, tests) need.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::{
    AgentConfig, CallEvent, CallJob, CallSession, DiagnosticSnapshot, ResultState, TrackerError,
};
use crate::ports::{CallProvider, JobFilter, SessionObserver, SessionUpdate};
use crate::services::diagnostics::DiagnosticsCollector;
use crate::services::ingestor::EventIngestor;
use crate::services::poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
use crate::services::reconciler::{ReconcileOutcome, ResultReconciler, DEFAULT_MAX_ATTEMPTS};
use crate::services::session_manager::{SessionManager, UpdateOutcome};

/// Tracker configuration
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Interval between status polls
    pub poll_interval: Duration,
    /// Misses before reconciliation falls back to diagnostics
    pub max_reconcile_attempts: u32,
    /// Reconcile automatically when a call completes without results
    pub auto_reconcile: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_reconcile_attempts: DEFAULT_MAX_ATTEMPTS,
            auto_reconcile: true,
        }
    }
}

/// Entry point for tracking outbound calls
///
/// # Example
///
/// ```rust,ignore
/// let tracker = CallTracker::new(provider, TrackerConfig::default());
/// let session = tracker
///     .start("+34699043286", AgentConfig::default().with_questions(["What is your name?"]))
///     .await?;
/// tracker.subscribe(Some(&session.job_id), Arc::new(|u: &SessionUpdate| println!("{}", u.session.status)));
/// ```
pub struct CallTracker {
    provider: Arc<dyn CallProvider>,
    sessions: Arc<SessionManager>,
    poller: StatusPoller,
    ingestor: EventIngestor,
    reconciler: ResultReconciler,
    diagnostics: DiagnosticsCollector,
}

impl CallTracker {
    pub fn new(provider: Arc<dyn CallProvider>, config: TrackerConfig) -> Self {
        let sessions = Arc::new(SessionManager::new());
        let poller = StatusPoller::new(provider.clone(), sessions.clone(), config.poll_interval);
        let ingestor = EventIngestor::new(sessions.clone());
        let reconciler = ResultReconciler::new(
            provider.clone(),
            sessions.clone(),
            config.max_reconcile_attempts,
        );
        let diagnostics = DiagnosticsCollector::new(provider.clone());

        if config.auto_reconcile {
            sessions.subscribe(Arc::new(AutoReconcile {
                reconciler: reconciler.clone(),
            }));
        }

        Self {
            provider,
            sessions,
            poller,
            ingestor,
            reconciler,
            diagnostics,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Validate, dispatch and start tracking a call
    pub async fn start(
        &self,
        phone_number: &str,
        agent: AgentConfig,
    ) -> Result<CallSession, TrackerError> {
        let job = CallJob::new(phone_number, agent)?;
        let dispatched = self.provider.dispatch_call(&job).await?;

        tracing::info!(
            job_id = %dispatched.job_id,
            agent_id = %dispatched.agent_id,
            provider = self.provider.name(),
            "📤 Call dispatched"
        );

        let session = self.sessions.create_session(
            &dispatched.job_id,
            &job.phone_number,
            &dispatched.agent_id,
            job.agent,
        )?;
        self.poller.start_polling(&session.job_id, None);
        Ok(session)
    }

    /// Observe updates for one job, or for every job when `job_id` is `None`
    pub fn subscribe(&self, job_id: Option<&str>, observer: Arc<dyn SessionObserver>) {
        match job_id {
            Some(job_id) => self
                .sessions
                .subscribe(Arc::new(JobFilter::new(job_id, observer))),
            None => self.sessions.subscribe(observer),
        }
    }

    /// Stop polling a job. The session stays readable.
    pub fn stop(&self, job_id: &str) -> Result<bool, TrackerError> {
        self.sessions.get_session(job_id)?;
        Ok(self.poller.stop_polling(job_id))
    }

    pub fn is_polling(&self, job_id: &str) -> bool {
        self.sessions.has_timer(job_id)
    }

    pub fn get_result(&self, job_id: &str) -> Result<ResultState, TrackerError> {
        Ok(self.sessions.get_session(job_id)?.result_state())
    }

    pub async fn reconcile(&self, job_id: &str) -> Result<ReconcileOutcome, TrackerError> {
        self.reconciler.reconcile(job_id).await
    }

    /// Raw provider records for the job's agent
    pub async fn diagnostics(&self, job_id: &str) -> Result<DiagnosticSnapshot, TrackerError> {
        let session = self.sessions.get_session(job_id)?;
        self.diagnostics
            .collect(job_id, &session.agent_id, session.attempts)
            .await
    }

    pub fn session(&self, job_id: &str) -> Result<CallSession, TrackerError> {
        self.sessions.get_session(job_id)
    }

    pub fn sessions(&self) -> Vec<CallSession> {
        self.sessions.list_sessions()
    }

    /// Discard a session and its timer
    pub fn remove(&self, job_id: &str) -> Result<CallSession, TrackerError> {
        let removed = self
            .sessions
            .remove_session(job_id)
            .ok_or_else(|| TrackerError::session_not_found(job_id))?;
        tracing::info!(job_id, "🗑️ Session removed");
        Ok(removed)
    }

    /// Apply one push event
    pub fn ingest(&self, event: CallEvent) -> UpdateOutcome {
        self.ingestor.ingest(event)
    }

    /// Spawn the push-event loop and return its sender
    pub fn open_event_channel(&self, buffer: usize) -> mpsc::Sender<CallEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.ingestor.clone().spawn(rx);
        tx
    }

    /// Cancel all polling timers
    pub fn shutdown(&self) {
        let timers = self.sessions.active_timers();
        self.sessions.shutdown();
        tracing::info!(timers, "🛑 Tracker stopped");
    }
}

/// Starts reconciliation when a session enters `completed` without results
struct AutoReconcile {
    reconciler: ResultReconciler,
}

impl SessionObserver for AutoReconcile {
    fn on_update(&self, update: &SessionUpdate) {
        let session = &update.session;
        if !update.entered_completed() || !session.needs_reconciliation() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(job_id = %session.job_id, "No runtime, skipping auto-reconcile");
            return;
        };

        let reconciler = self.reconciler.clone();
        let job_id = session.job_id.clone();
        runtime.spawn(async move {
            match reconciler.reconcile(&job_id).await {
                Ok(outcome) => {
                    tracing::debug!(job_id = %job_id, ?outcome, "Auto-reconcile finished")
                }
                Err(e) => tracing::warn!(
                    job_id = %job_id,
                    transient = e.is_transient(),
                    "⚠️ Auto-reconcile failed: {}",
                    e
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallStatus, ConversationDetail, Transcript};
    use crate::services::testing::MockProvider;
    use parking_lot::Mutex;

    fn agent() -> AgentConfig {
        AgentConfig::default().with_questions(["What is your name?"])
    }

    #[tokio::test]
    async fn test_start_validates_before_dispatch() {
        let provider = Arc::new(MockProvider::new());
        let tracker = CallTracker::new(provider, TrackerConfig::default());

        let err = tracker.start("699043286", agent()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Dispatch(_)));
        assert!(tracker.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_start_tracks_and_polls() {
        let provider = Arc::new(MockProvider::new());
        let tracker = CallTracker::new(provider, TrackerConfig::default());

        let session = tracker.start("+34 699 043 286", agent()).await.unwrap();
        assert_eq!(session.phone_number, "+34699043286");
        assert_eq!(session.status, CallStatus::Initiating);
        assert!(tracker.stop(&session.job_id).unwrap());
        assert!(!tracker.stop(&session.job_id).unwrap());
        tracker.remove(&session.job_id).unwrap();
        assert!(tracker.session(&session.job_id).is_err());
    }

    #[tokio::test]
    async fn test_completion_triggers_reconcile_once() {
        let provider = Arc::new(MockProvider::new());
        provider.set_conversation(
            "job_1",
            ConversationDetail::new("conv_1", Transcript::Text("user: my name is ana".into())),
        );
        let tracker = CallTracker::new(provider.clone(), TrackerConfig::default());
        let session = tracker.start("+34699043286", agent()).await.unwrap();
        tracker.stop(&session.job_id).unwrap();

        tracker.ingest(CallEvent::new("job_1", CallStatus::Completed).at(10));
        tracker.ingest(CallEvent::new("job_1", CallStatus::Completed).at(11));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(provider.conversation_queries(), 1);
        let ResultState::Ready { result } = tracker.get_result("job_1").unwrap() else {
            panic!("expected a result");
        };
        assert_eq!(result.answer_for("What is your name?").unwrap().answer, "ana");
    }

    #[tokio::test]
    async fn test_auto_reconcile_can_be_disabled() {
        let provider = Arc::new(MockProvider::new());
        let config = TrackerConfig {
            auto_reconcile: false,
            ..TrackerConfig::default()
        };
        let tracker = CallTracker::new(provider.clone(), config);
        tracker.start("+34699043286", agent()).await.unwrap();

        tracker.ingest(CallEvent::new("job_1", CallStatus::Completed).at(10));
        tokio::task::yield_now().await;

        assert_eq!(provider.conversation_queries(), 0);
        assert!(matches!(
            tracker.get_result("job_1").unwrap(),
            ResultState::Pending { .. }
        ));
    }

    #[tokio::test]
    async fn test_subscribe_filters_by_job() {
        let provider = Arc::new(MockProvider::new());
        let tracker = CallTracker::new(provider, TrackerConfig::default());
        let first = tracker.start("+34699043286", agent()).await.unwrap();
        let second = tracker.start("+34699043287", agent()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        tracker.subscribe(
            Some(&second.job_id),
            Arc::new(move |u: &SessionUpdate| sink.lock().push(u.job_id().to_string())),
        );

        tracker.ingest(CallEvent::new(first.job_id.clone(), CallStatus::InProgress).at(1));
        tracker.ingest(CallEvent::new(second.job_id.clone(), CallStatus::InProgress).at(1));

        assert_eq!(*seen.lock(), vec![second.job_id]);
    }
}
