//! Call Provider Port
//!
//! Abstract interface to the external conversational-AI provider that places
//! the call and runs the conversation.

use async_trait::async_trait;

use crate::domain::entities::{
    CallJob, ConversationDetail, ConversationRecord, DispatchedCall, StatusReport,
};
use crate::domain::errors::TrackerError;

/// External call provider
///
/// Implementations map transport failures to
/// `TrackerError::ProviderUnavailable` and input rejected by the provider to
/// `TrackerError::Dispatch`.
///
/// # Example
///
/// ```rust,ignore
/// use callwatch::ports::CallProvider;
///
/// struct HttpProvider { /* reqwest client */ }
///
/// #[async_trait]
/// impl CallProvider for HttpProvider {
///     async fn dispatch_call(&self, job: &CallJob) -> Result<DispatchedCall, TrackerError> {
///         // POST the agent and the batch call
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Hand a validated job to the provider
    async fn dispatch_call(&self, job: &CallJob) -> Result<DispatchedCall, TrackerError>;

    /// Current status of a job
    async fn query_status(&self, job_id: &str) -> Result<StatusReport, TrackerError>;

    /// Conversation belonging to a job, correlated by job id first and agent
    /// id second. `Ok(None)` means "not there yet".
    async fn query_conversation(
        &self,
        job_id: &str,
        agent_id: &str,
    ) -> Result<Option<ConversationDetail>, TrackerError>;

    /// Every conversation record the provider knows for an agent
    async fn list_conversations(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ConversationRecord>, TrackerError>;

    /// Provider name for logs (e.g. "elevenlabs")
    fn name(&self) -> &str;
}
