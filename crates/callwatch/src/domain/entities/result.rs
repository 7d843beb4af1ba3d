//! CallResult and DiagnosticSnapshot - What a finished call yields

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationRecord;
use crate::domain::value_objects::{Confidence, Transcript};

/// One configured question with the answer found for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAnswer {
    pub question: String,
    pub answer: String,
    pub confidence: Confidence,
}

/// Normalized results of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub conversation_id: String,
    /// Keyed by question identifier (`question_1`, `question_2`, ...)
    pub extracted_info: BTreeMap<String, ExtractedAnswer>,
    pub transcript: Transcript,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CallResult {
    pub fn new(conversation_id: impl Into<String>, transcript: Transcript) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            extracted_info: BTreeMap::new(),
            transcript,
            processed_at: Utc::now(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Look up an answer by the original question text
    pub fn answer_for(&self, question: &str) -> Option<&ExtractedAnswer> {
        self.extracted_info.values().find(|a| a.question == question)
    }
}

/// Raw provider data collected when reconciliation cannot find a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub job_id: String,
    pub agent_id: String,
    pub total_conversations_found: usize,
    pub attempts: u32,
    pub records: Vec<ConversationRecord>,
    pub collected_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DiagnosticSnapshot {
    pub fn new(
        job_id: impl Into<String>,
        agent_id: impl Into<String>,
        attempts: u32,
        records: Vec<ConversationRecord>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            agent_id: agent_id.into(),
            total_conversations_found: records.len(),
            attempts,
            records,
            collected_at: Utc::now(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Distinct job ids seen among the inspected records
    pub fn seen_job_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .records
            .iter()
            .filter_map(|r| r.job_id.as_deref())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Terminal product of reconciliation: exactly one of the two
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallOutcome {
    Result(CallResult),
    Diagnostic(DiagnosticSnapshot),
}

impl CallOutcome {
    pub fn is_result(&self) -> bool {
        matches!(self, CallOutcome::Result(_))
    }
}
