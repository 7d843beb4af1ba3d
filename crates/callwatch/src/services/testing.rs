//! In-memory provider for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    CallJob, CallStatus, ConversationDetail, ConversationRecord, DispatchedCall, StatusReport,
    TrackerError,
};
use crate::ports::CallProvider;

#[derive(Default)]
pub struct MockProvider {
    statuses: Mutex<HashMap<String, StatusReport>>,
    conversations: Mutex<HashMap<String, ConversationDetail>>,
    records: Mutex<Vec<ConversationRecord>>,
    next_job: AtomicUsize,
    status_failing: AtomicBool,
    conversation_failing: AtomicBool,
    listing_failing: AtomicBool,
    status_calls: AtomicUsize,
    conversation_calls: AtomicUsize,
    listing_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, job_id: &str, status: CallStatus, last_update: i64) {
        self.statuses.lock().insert(
            job_id.to_string(),
            StatusReport {
                status,
                last_update,
                embedded_results: None,
            },
        );
    }

    pub fn set_conversation(&self, job_id: &str, detail: ConversationDetail) {
        self.conversations.lock().insert(job_id.to_string(), detail);
    }

    pub fn set_records(&self, records: Vec<ConversationRecord>) {
        *self.records.lock() = records;
    }

    pub fn fail_status(&self, failing: bool) {
        self.status_failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_conversation(&self, failing: bool) {
        self.conversation_failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, failing: bool) {
        self.listing_failing.store(failing, Ordering::SeqCst);
    }

    pub fn status_queries(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn conversation_queries(&self) -> usize {
        self.conversation_calls.load(Ordering::SeqCst)
    }

    pub fn listing_queries(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallProvider for MockProvider {
    async fn dispatch_call(&self, job: &CallJob) -> Result<DispatchedCall, TrackerError> {
        job.agent.validate()?;
        let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DispatchedCall {
            job_id: format!("job_{}", n),
            agent_id: format!("agent_{}", n),
        })
    }

    async fn query_status(&self, job_id: &str) -> Result<StatusReport, TrackerError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_failing.load(Ordering::SeqCst) {
            return Err(TrackerError::unavailable("status endpoint down"));
        }
        self.statuses
            .lock()
            .get(job_id)
            .cloned()
            .ok_or_else(|| TrackerError::unavailable(format!("unknown job {}", job_id)))
    }

    async fn query_conversation(
        &self,
        job_id: &str,
        _agent_id: &str,
    ) -> Result<Option<ConversationDetail>, TrackerError> {
        self.conversation_calls.fetch_add(1, Ordering::SeqCst);
        if self.conversation_failing.load(Ordering::SeqCst) {
            return Err(TrackerError::unavailable("conversation endpoint down"));
        }
        Ok(self.conversations.lock().get(job_id).cloned())
    }

    async fn list_conversations(
        &self,
        _agent_id: &str,
    ) -> Result<Vec<ConversationRecord>, TrackerError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if self.listing_failing.load(Ordering::SeqCst) {
            return Err(TrackerError::unavailable("listing endpoint down"));
        }
        Ok(self.records.lock().clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
