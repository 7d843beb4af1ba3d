//! Diagnostics - Raw provider data for unmatched jobs

use std::sync::Arc;

use crate::domain::{DiagnosticSnapshot, TrackerError};
use crate::ports::CallProvider;

/// Collects every conversation the provider knows for an agent
#[derive(Clone)]
pub struct DiagnosticsCollector {
    provider: Arc<dyn CallProvider>,
}

impl DiagnosticsCollector {
    pub fn new(provider: Arc<dyn CallProvider>) -> Self {
        Self { provider }
    }

    /// Snapshot of the provider's records for `agent_id`.
    ///
    /// Read-only; never touches session state.
    pub async fn collect(
        &self,
        job_id: &str,
        agent_id: &str,
        attempts: u32,
    ) -> Result<DiagnosticSnapshot, TrackerError> {
        let records = self.provider.list_conversations(agent_id).await?;
        let snapshot = DiagnosticSnapshot::new(job_id, agent_id, attempts, records);

        let linked = snapshot
            .records
            .iter()
            .any(|r| r.job_id.as_deref() == Some(job_id));
        tracing::info!(
            job_id,
            agent_id,
            found = snapshot.total_conversations_found,
            linked,
            "🔍 Diagnostics collected"
        );

        Ok(snapshot)
    }

    /// Like `collect`, but a provider failure yields an empty snapshot
    /// carrying the error instead.
    pub async fn collect_or_note(
        &self,
        job_id: &str,
        agent_id: &str,
        attempts: u32,
    ) -> DiagnosticSnapshot {
        match self.collect(job_id, agent_id, attempts).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(job_id, agent_id, "⚠️ Diagnostics unavailable: {}", e);
                DiagnosticSnapshot::new(job_id, agent_id, attempts, Vec::new())
                    .with_note(format!("conversation listing failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConversationRecord;
    use crate::services::testing::MockProvider;

    fn record(id: &str, job: &str) -> ConversationRecord {
        ConversationRecord::from_raw(serde_json::json!({
            "conversation_id": id,
            "agent_id": "agent_1",
            "batch_call_id": job,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_lists_every_record() {
        let provider = Arc::new(MockProvider::new());
        provider.set_records(vec![record("c1", "job_a"), record("c2", "job_b")]);
        let collector = DiagnosticsCollector::new(provider);

        let snapshot = collector.collect("job_x", "agent_1", 2).await.unwrap();
        assert_eq!(snapshot.total_conversations_found, 2);
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.seen_job_ids(), vec!["job_a", "job_b"]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_noted() {
        let provider = Arc::new(MockProvider::new());
        provider.fail_listing(true);
        let collector = DiagnosticsCollector::new(provider.clone());

        assert!(collector.collect("job_x", "agent_1", 0).await.is_err());

        let snapshot = collector.collect_or_note("job_x", "agent_1", 5).await;
        assert_eq!(snapshot.total_conversations_found, 0);
        assert!(snapshot.note.unwrap().contains("listing failed"));
    }
}
