//! Event Ingestor - Applies pushed status events
//!
//! Push events go through the same ordering rules as polled statuses, so a
//! late push never overwrites a newer poll.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{CallEvent, UpdateSource};
use crate::services::session_manager::{SessionManager, UpdateOutcome};

#[derive(Clone)]
pub struct EventIngestor {
    sessions: Arc<SessionManager>,
}

impl EventIngestor {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Apply one event. Events without a timestamp are stamped with the
    /// receipt time.
    pub fn ingest(&self, event: CallEvent) -> UpdateOutcome {
        let timestamp = event.timestamp.unwrap_or_else(|| Utc::now().timestamp());
        let outcome = self.sessions.apply_update(
            &event.job_id,
            event.status,
            timestamp,
            event.results,
            UpdateSource::Push,
        );

        if let UpdateOutcome::Ignored(reason) = &outcome {
            tracing::debug!(job_id = %event.job_id, status = %event.status, ?reason, "Push event dropped");
        }
        outcome
    }

    /// Consume events from a channel until every sender is dropped
    pub fn spawn(self, mut events: mpsc::Receiver<CallEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("📨 Event ingestion started");
            while let Some(event) = events.recv().await {
                self.ingest(event);
            }
            tracing::info!("📨 Event channel closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentConfig, CallStatus, IgnoreReason};

    fn setup() -> (EventIngestor, Arc<SessionManager>) {
        let sessions = Arc::new(SessionManager::new());
        sessions
            .create_session("abc123", "+34699043286", "agent_1", AgentConfig::default())
            .unwrap();
        (EventIngestor::new(sessions.clone()), sessions)
    }

    #[test]
    fn test_late_push_is_dropped() {
        let (ingestor, sessions) = setup();
        sessions.apply_update("abc123", CallStatus::InProgress, 1000, None, UpdateSource::Poll);

        let outcome = ingestor.ingest(CallEvent::new("abc123", CallStatus::Completed).at(990));
        assert!(matches!(
            outcome,
            UpdateOutcome::Ignored(IgnoreReason::Stale { .. })
        ));
        assert_eq!(sessions.status_of("abc123"), Some(CallStatus::InProgress));
    }

    #[test]
    fn test_missing_timestamp_uses_receipt_time() {
        let (ingestor, sessions) = setup();
        let before = Utc::now().timestamp();
        assert!(ingestor
            .ingest(CallEvent::new("abc123", CallStatus::InProgress))
            .is_applied());

        let last = sessions.get_session("abc123").unwrap().last_update.unwrap();
        assert!(last >= before);
    }

    #[tokio::test]
    async fn test_channel_feeds_sessions() {
        let (ingestor, sessions) = setup();
        let (tx, rx) = mpsc::channel(8);
        let task = ingestor.spawn(rx);

        tx.send(CallEvent::new("abc123", CallStatus::InProgress).at(10))
            .await
            .unwrap();
        tx.send(CallEvent::new("abc123", CallStatus::Completed).at(20))
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(sessions.status_of("abc123"), Some(CallStatus::Completed));
    }
}
