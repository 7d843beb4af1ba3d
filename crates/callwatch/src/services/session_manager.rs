//! Session Manager - Authoritative store of call sessions
//!
//! Every status write goes through `apply_update`, which is the only place
//! session state changes. Writes are serialized by one lock that is never
//! held across an `.await`; observers run after it is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    AgentConfig, CallOutcome, CallResult, CallSession, CallStatus, IgnoreReason, TrackerError,
    UpdateSource,
};
use crate::ports::{SessionObserver, SessionUpdate};

/// Result of `apply_update`
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Applied(SessionUpdate),
    Ignored(IgnoreReason),
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Registration of a polling timer for one job
#[derive(Debug, Clone)]
pub struct PollHandle {
    pub id: u64,
    pub token: CancellationToken,
}

/// What reconciliation should do for a session, decided under the lock
#[derive(Debug, Clone)]
pub enum ReconcilePlan {
    /// An outcome (or provider-embedded result) already exists
    Settled(CallOutcome),
    /// Query the provider for the conversation. Misses only count once the
    /// call has completed.
    Query {
        agent_id: String,
        questions: Vec<String>,
        completed: bool,
    },
    /// Attempts exhausted but no snapshot stored yet
    Exhausted { agent_id: String, attempts: u32 },
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, CallSession>,
    timers: HashMap<String, PollHandle>,
}

/// Session store and polling-timer registry
#[derive(Default)]
pub struct SessionManager {
    state: Mutex<State>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    next_timer_id: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for every session update
    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    fn notify(&self, update: &SessionUpdate) {
        let observers: Vec<Arc<dyn SessionObserver>> = self.observers.read().clone();
        for observer in observers {
            observer.on_update(update);
        }
    }

    /// Create the session for a freshly dispatched job.
    ///
    /// A finished session under the same job id is replaced; a live one is
    /// an error.
    pub fn create_session(
        &self,
        job_id: &str,
        phone_number: &str,
        agent_id: &str,
        agent: AgentConfig,
    ) -> Result<CallSession, TrackerError> {
        let update = {
            let mut state = self.state.lock();
            if let Some(existing) = state.sessions.get(job_id) {
                if !existing.is_terminal() {
                    return Err(TrackerError::duplicate(job_id));
                }
                tracing::debug!(job_id, status = %existing.status, "Replacing finished session");
            }
            Self::insert_fresh(&mut state, CallSession::new(job_id, phone_number, agent_id, agent))
        };

        self.notify(&update);
        Ok(update.session)
    }

    /// Replace a session unconditionally, cancelling its timer
    pub fn replace_session(
        &self,
        job_id: &str,
        phone_number: &str,
        agent_id: &str,
        agent: AgentConfig,
    ) -> CallSession {
        let update = {
            let mut state = self.state.lock();
            Self::insert_fresh(&mut state, CallSession::new(job_id, phone_number, agent_id, agent))
        };

        self.notify(&update);
        update.session
    }

    fn insert_fresh(state: &mut State, session: CallSession) -> SessionUpdate {
        if let Some(handle) = state.timers.remove(&session.job_id) {
            handle.token.cancel();
        }
        state
            .sessions
            .insert(session.job_id.clone(), session.clone());
        SessionUpdate {
            session,
            previous_status: CallStatus::Idle,
            source: UpdateSource::Dispatch,
        }
    }

    /// Apply one status write from any source
    pub fn apply_update(
        &self,
        job_id: &str,
        status: CallStatus,
        timestamp: i64,
        embedded_results: Option<CallResult>,
        source: UpdateSource,
    ) -> UpdateOutcome {
        let update = {
            let mut state = self.state.lock();
            let Some(session) = state.sessions.get_mut(job_id) else {
                return UpdateOutcome::Ignored(IgnoreReason::UnknownJob);
            };

            if let Err(reason) = session.check_update(status, timestamp) {
                tracing::debug!(job_id, %source, %status, timestamp, ?reason, "Update ignored");
                return UpdateOutcome::Ignored(reason);
            }

            let previous_status = session.status;
            session.apply(status, timestamp, embedded_results);
            SessionUpdate {
                session: session.clone(),
                previous_status,
                source,
            }
        };

        self.notify(&update);
        UpdateOutcome::Applied(update)
    }

    pub fn get_session(&self, job_id: &str) -> Result<CallSession, TrackerError> {
        self.state
            .lock()
            .sessions
            .get(job_id)
            .cloned()
            .ok_or_else(|| TrackerError::session_not_found(job_id))
    }

    pub fn status_of(&self, job_id: &str) -> Option<CallStatus> {
        self.state.lock().sessions.get(job_id).map(|s| s.status)
    }

    /// All sessions, oldest first
    pub fn list_sessions(&self) -> Vec<CallSession> {
        let mut sessions: Vec<CallSession> =
            self.state.lock().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        sessions
    }

    /// Drop a session and stop its timer
    pub fn remove_session(&self, job_id: &str) -> Option<CallSession> {
        let mut state = self.state.lock();
        if let Some(handle) = state.timers.remove(job_id) {
            handle.token.cancel();
        }
        state.sessions.remove(job_id)
    }

    // ---- polling timers ----

    /// Claim the timer slot for a job. `None` when a live timer exists or the
    /// session is unknown or finished.
    pub fn register_timer(&self, job_id: &str) -> Option<PollHandle> {
        let mut state = self.state.lock();
        match state.sessions.get(job_id) {
            Some(session) if !session.is_terminal() => {}
            _ => return None,
        }
        if let Some(existing) = state.timers.get(job_id) {
            if !existing.token.is_cancelled() {
                return None;
            }
        }

        let handle = PollHandle {
            id: self.next_timer_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        state.timers.insert(job_id.to_string(), handle.clone());
        Some(handle)
    }

    /// Remove a timer registration if it still belongs to `timer_id`
    pub fn release_timer(&self, job_id: &str, timer_id: u64) {
        let mut state = self.state.lock();
        if state.timers.get(job_id).is_some_and(|h| h.id == timer_id) {
            state.timers.remove(job_id);
        }
    }

    /// Cancel and deregister a job's timer. Returns false if none was running.
    pub fn cancel_timer(&self, job_id: &str) -> bool {
        match self.state.lock().timers.remove(job_id) {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_timer(&self, job_id: &str) -> bool {
        self.state.lock().timers.contains_key(job_id)
    }

    pub fn active_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Cancel every timer
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        for (_, handle) in state.timers.drain() {
            handle.token.cancel();
        }
    }

    // ---- reconciliation bookkeeping ----

    /// Decide how a reconciliation request proceeds
    pub fn plan_reconcile(
        &self,
        job_id: &str,
        max_attempts: u32,
    ) -> Result<ReconcilePlan, TrackerError> {
        let state = self.state.lock();
        let session = state
            .sessions
            .get(job_id)
            .ok_or_else(|| TrackerError::session_not_found(job_id))?;

        if let Some(outcome) = &session.outcome {
            return Ok(ReconcilePlan::Settled(outcome.clone()));
        }
        if let Some(result) = &session.embedded_results {
            return Ok(ReconcilePlan::Settled(CallOutcome::Result(result.clone())));
        }
        if matches!(session.status, CallStatus::Failed | CallStatus::Cancelled) {
            return Err(TrackerError::NotReconcilable {
                job_id: job_id.to_string(),
                status: session.status,
            });
        }
        let completed = session.status == CallStatus::Completed;
        if completed && session.attempts >= max_attempts {
            return Ok(ReconcilePlan::Exhausted {
                agent_id: session.agent_id.clone(),
                attempts: session.attempts,
            });
        }

        Ok(ReconcilePlan::Query {
            agent_id: session.agent_id.clone(),
            questions: session.agent.questions.clone(),
            completed,
        })
    }

    /// Count one reconciliation that found no conversation.
    /// Returns the attempt count after the increment, capped at `max_attempts`.
    pub fn record_miss(&self, job_id: &str, max_attempts: u32) -> Result<u32, TrackerError> {
        let mut state = self.state.lock();
        let session = state
            .sessions
            .get_mut(job_id)
            .ok_or_else(|| TrackerError::session_not_found(job_id))?;
        session.attempts = (session.attempts + 1).min(max_attempts);
        Ok(session.attempts)
    }

    /// Store the reconciliation outcome. The first stored outcome wins and is
    /// returned to later callers.
    pub fn store_outcome(
        &self,
        job_id: &str,
        outcome: CallOutcome,
    ) -> Result<CallOutcome, TrackerError> {
        let update = {
            let mut state = self.state.lock();
            let session = state
                .sessions
                .get_mut(job_id)
                .ok_or_else(|| TrackerError::session_not_found(job_id))?;

            if let Some(existing) = &session.outcome {
                return Ok(existing.clone());
            }
            if outcome.is_result() {
                session.attempts = 0;
            }
            session.outcome = Some(outcome);
            SessionUpdate {
                session: session.clone(),
                previous_status: session.status,
                source: UpdateSource::Reconcile,
            }
        };

        self.notify(&update);
        update
            .session
            .outcome
            .ok_or_else(|| TrackerError::session_not_found(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiagnosticSnapshot, Transcript};
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;

    fn manager_with(job_id: &str) -> SessionManager {
        let manager = SessionManager::new();
        manager
            .create_session(job_id, "+34699043286", "agent_1", AgentConfig::default())
            .unwrap();
        manager
    }

    fn push(manager: &SessionManager, job_id: &str, status: CallStatus, ts: i64) -> UpdateOutcome {
        manager.apply_update(job_id, status, ts, None, UpdateSource::Push)
    }

    #[test]
    fn test_stale_push_after_newer_poll() {
        let manager = manager_with("abc123");
        assert!(manager
            .apply_update("abc123", CallStatus::InProgress, 1000, None, UpdateSource::Poll)
            .is_applied());

        let outcome = push(&manager, "abc123", CallStatus::Completed, 990);
        assert!(matches!(
            outcome,
            UpdateOutcome::Ignored(IgnoreReason::Stale { .. })
        ));

        let session = manager.get_session("abc123").unwrap();
        assert_eq!(session.status, CallStatus::InProgress);
        assert_eq!(session.last_update, Some(1000));
    }

    #[test]
    fn test_terminal_is_absorbing() {
        let manager = manager_with("job");
        push(&manager, "job", CallStatus::Failed, 10);
        let outcome = push(&manager, "job", CallStatus::Completed, 20);
        assert!(matches!(
            outcome,
            UpdateOutcome::Ignored(IgnoreReason::Terminal { .. })
        ));
        assert_eq!(manager.status_of("job"), Some(CallStatus::Failed));
    }

    #[test]
    fn test_unknown_job_ignored() {
        let manager = SessionManager::new();
        assert!(matches!(
            push(&manager, "nope", CallStatus::Completed, 1),
            UpdateOutcome::Ignored(IgnoreReason::UnknownJob)
        ));
    }

    #[test]
    fn test_duplicate_live_session_rejected() {
        let manager = manager_with("job");
        let err = manager
            .create_session("job", "+34699043286", "agent_2", AgentConfig::default())
            .unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateJob { .. }));

        push(&manager, "job", CallStatus::Completed, 5);
        let replaced = manager
            .create_session("job", "+34699043286", "agent_2", AgentConfig::default())
            .unwrap();
        assert_eq!(replaced.agent_id, "agent_2");
        assert_eq!(replaced.status, CallStatus::Initiating);
    }

    #[test]
    fn test_explicit_replace_resets_live_session() {
        let manager = manager_with("job");
        push(&manager, "job", CallStatus::InProgress, 10);
        let handle = manager.register_timer("job").unwrap();

        let replaced =
            manager.replace_session("job", "+34699043286", "agent_2", AgentConfig::default());
        assert_eq!(replaced.status, CallStatus::Initiating);
        assert_eq!(replaced.last_update, None);
        assert!(handle.token.is_cancelled());
        assert!(!manager.has_timer("job"));
    }

    #[test]
    fn test_observers_see_applied_updates_only() {
        let manager = manager_with("job");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        manager.subscribe(Arc::new(move |_: &SessionUpdate| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        push(&manager, "job", CallStatus::InProgress, 10);
        push(&manager, "job", CallStatus::InProgress, 10);
        push(&manager, "job", CallStatus::Initiated, 5);
        push(&manager, "job", CallStatus::Completed, 20);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_observer_can_read_manager() {
        let manager = Arc::new(manager_with("job"));
        let inner = manager.clone();
        let observed = Arc::new(Mutex::new(None));
        let slot = observed.clone();
        manager.subscribe(Arc::new(move |u: &SessionUpdate| {
            *slot.lock() = inner.status_of(u.job_id());
        }));

        push(&manager, "job", CallStatus::InProgress, 1);
        assert_eq!(*observed.lock(), Some(CallStatus::InProgress));
    }

    #[test]
    fn test_timer_slot_is_exclusive() {
        let manager = manager_with("job");
        let first = manager.register_timer("job").unwrap();
        assert!(manager.register_timer("job").is_none());

        assert!(manager.cancel_timer("job"));
        assert!(first.token.is_cancelled());

        let second = manager.register_timer("job").unwrap();
        manager.release_timer("job", first.id);
        assert!(manager.has_timer("job"));
        manager.release_timer("job", second.id);
        assert!(!manager.has_timer("job"));
    }

    #[test]
    fn test_no_timer_for_finished_session() {
        let manager = manager_with("job");
        push(&manager, "job", CallStatus::Cancelled, 3);
        assert!(manager.register_timer("job").is_none());
        assert!(manager.register_timer("other").is_none());
    }

    #[test]
    fn test_remove_session_cancels_timer() {
        let manager = manager_with("job");
        let handle = manager.register_timer("job").unwrap();
        assert!(manager.remove_session("job").is_some());
        assert!(handle.token.is_cancelled());
        assert_eq!(manager.active_timers(), 0);
    }

    #[test]
    fn test_first_outcome_wins() {
        let manager = manager_with("job");
        let first = CallOutcome::Result(CallResult::new("conv_1", Transcript::Unavailable));
        let second =
            CallOutcome::Diagnostic(DiagnosticSnapshot::new("job", "agent_1", 5, Vec::new()));

        assert_eq!(manager.store_outcome("job", first.clone()).unwrap(), first);
        assert_eq!(manager.store_outcome("job", second).unwrap(), first);
    }

    #[test]
    fn test_misses_are_capped() {
        let manager = manager_with("job");
        push(&manager, "job", CallStatus::Completed, 10);
        for _ in 0..7 {
            manager.record_miss("job", 5).unwrap();
        }
        assert_eq!(manager.get_session("job").unwrap().attempts, 5);
        assert!(matches!(
            manager.plan_reconcile("job", 5).unwrap(),
            ReconcilePlan::Exhausted { attempts: 5, .. }
        ));
    }

    #[test]
    fn test_failed_session_not_reconcilable() {
        let manager = manager_with("job");
        push(&manager, "job", CallStatus::Failed, 3);
        assert!(matches!(
            manager.plan_reconcile("job", 5),
            Err(TrackerError::NotReconcilable { .. })
        ));
    }

    const PROGRESSION: [CallStatus; 4] = [
        CallStatus::Initiated,
        CallStatus::InProgress,
        CallStatus::Completed,
        CallStatus::Completed,
    ];

    /// Updates whose timestamps agree with the state machine order, with
    /// occasional duplicates.
    fn ordered_updates() -> impl Strategy<Value = Vec<(CallStatus, i64)>> {
        prop::collection::vec((0usize..3, 1i64..5, any::<bool>()), 1..12).prop_map(|steps| {
            let mut ts = 0;
            let mut rank = 0;
            let mut updates = Vec::new();
            for (advance, gap, duplicate) in steps {
                rank = (rank + advance % 2).min(PROGRESSION.len() - 1);
                ts += gap;
                let status = PROGRESSION[rank];
                updates.push((status, ts));
                if duplicate {
                    updates.push((status, ts));
                }
                if status.is_terminal() {
                    break;
                }
            }
            updates
        })
    }

    fn final_state(updates: &[(CallStatus, i64)]) -> (CallStatus, Option<i64>) {
        let manager = manager_with("job");
        for (status, ts) in updates {
            push(&manager, "job", *status, *ts);
        }
        let session = manager.get_session("job").unwrap();
        (session.status, session.last_update)
    }

    proptest! {
        #[test]
        fn prop_delivery_order_does_not_matter(
            updates in ordered_updates(),
            seed in any::<u64>(),
        ) {
            let mut shuffled = updates.clone();
            let len = shuffled.len();
            let mut s = seed;
            for i in (1..len).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                shuffled.swap(i, (s >> 33) as usize % (i + 1));
            }

            prop_assert_eq!(final_state(&updates), final_state(&shuffled));
        }

        #[test]
        fn prop_last_update_never_decreases(
            updates in prop::collection::vec((0usize..4, 0i64..50), 1..20),
        ) {
            let manager = manager_with("job");
            let mut last = None;
            for (idx, ts) in updates {
                push(&manager, "job", PROGRESSION[idx], ts);
                let current = manager.get_session("job").unwrap().last_update;
                prop_assert!(current >= last);
                last = current;
            }
        }
    }
}
