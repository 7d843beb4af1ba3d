//! Conversation records as reported by the provider

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Transcript;

/// Raw conversation record from the provider's listing
///
/// The typed fields are the ones correlation needs; `raw` keeps the full
/// payload for operator inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub agent_id: Option<String>,
    /// Batch/job id the conversation belongs to, if the provider links it
    pub job_id: Option<String>,
    pub status: Option<String>,
    /// Unix seconds
    pub created_at: Option<i64>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl ConversationRecord {
    /// Parse one entry of a provider listing. Entries without a
    /// conversation id are skipped by returning `None`.
    pub fn from_raw(raw: serde_json::Value) -> Option<Self> {
        let text = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let conversation_id = text("conversation_id").or_else(|| text("id"))?;
        let agent_id = text("agent_id");
        let job_id = text("batch_call_id").or_else(|| text("job_id"));
        let status = text("status");
        let created_at = ["start_time_unix_secs", "created_at_unix_secs", "created_at"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(|v| v.as_i64()));

        Some(Self {
            conversation_id,
            agent_id,
            job_id,
            status,
            created_at,
            raw,
        })
    }
}

/// Pick the conversation that belongs to a job.
///
/// A record linked to the job id wins. Otherwise the most recent record for
/// the agent is used, since every call dispatches its own agent.
pub fn select_conversation<'a>(
    records: &'a [ConversationRecord],
    job_id: &str,
    agent_id: &str,
) -> Option<&'a ConversationRecord> {
    records
        .iter()
        .find(|r| r.job_id.as_deref() == Some(job_id))
        .or_else(|| {
            records
                .iter()
                .filter(|r| r.agent_id.as_deref() == Some(agent_id))
                .max_by_key(|r| r.created_at.unwrap_or(i64::MIN))
        })
}

/// One answer as the provider reports it, before correlation with the
/// configured questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAnswer {
    /// Provider-side identifier, e.g. `question_2`
    pub key: Option<String>,
    /// Question text, if echoed back
    pub question: Option<String>,
    pub answer: String,
    pub confidence: Option<f64>,
}

/// Full conversation fetched for reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub conversation_id: String,
    pub transcript: Transcript,
    pub answers: Vec<ProviderAnswer>,
}

impl ConversationDetail {
    pub fn new(conversation_id: impl Into<String>, transcript: Transcript) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            transcript,
            answers: Vec::new(),
        }
    }

    pub fn with_answers(mut self, answers: Vec<ProviderAnswer>) -> Self {
        self.answers = answers;
        self
    }
}
