//! Call DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use callwatch::{AgentConfig, CallSession, DiagnosticSnapshot, ReconcileOutcome, ResultState};

/// Request to start a call
///
/// Field names are accepted in snake_case or camelCase.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartCallRequest {
    /// Destination in international format, e.g. "+34699043286"
    #[serde(alias = "phoneNumber")]
    pub phone_number: String,
    #[serde(default, alias = "agentName")]
    pub agent_name: Option<String>,
    /// What the call is for (default: "follow up with you")
    #[serde(default, alias = "callPurpose", alias = "purpose")]
    pub call_purpose: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default, alias = "voiceId")]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, alias = "firstMessage")]
    pub first_message: Option<String>,
    #[serde(default, alias = "customPrompt")]
    pub custom_prompt: Option<String>,
}

impl StartCallRequest {
    pub fn agent_config(&self) -> AgentConfig {
        let mut agent = AgentConfig::default().with_questions(self.questions.iter().cloned());
        if let Some(name) = &self.agent_name {
            agent.name = name.clone();
        }
        if let Some(purpose) = &self.call_purpose {
            agent.purpose = purpose.clone();
        }
        if let Some(language) = &self.language {
            agent.language = language.clone();
        }
        if let Some(voice_id) = &self.voice_id {
            agent = agent.with_voice(voice_id.as_str());
        }
        if let Some(message) = &self.first_message {
            agent = agent.with_first_message(message.as_str());
        }
        if let Some(prompt) = &self.custom_prompt {
            agent = agent.with_custom_prompt(prompt.as_str());
        }
        agent
    }
}

/// Agent summary returned after dispatch
#[derive(Debug, Serialize, ToSchema)]
pub struct AgentSummary {
    pub name: String,
    pub purpose: String,
    pub questions_count: usize,
    pub first_message: String,
    pub voice_id: String,
}

impl AgentSummary {
    pub fn from_domain(agent: &AgentConfig) -> Self {
        Self {
            name: agent.name.clone(),
            purpose: agent.purpose.clone(),
            questions_count: agent.questions.len(),
            first_message: agent.effective_first_message(),
            voice_id: agent.voice_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StartCallResponse {
    pub job_id: String,
    pub agent_id: String,
    pub status: String,
    pub agent: AgentSummary,
}

/// Tracked session
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub job_id: String,
    pub phone_number: String,
    pub agent_id: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    /// Provider timestamp of the last accepted update (unix seconds)
    pub last_update: Option<i64>,
    pub attempts: u32,
    pub polling: bool,
    pub has_outcome: bool,
    pub agent: AgentSummary,
    pub questions: Vec<String>,
}

impl SessionResponse {
    pub fn from_domain(session: CallSession, polling: bool) -> Self {
        Self {
            has_outcome: session.outcome.is_some() || session.embedded_results.is_some(),
            agent: AgentSummary::from_domain(&session.agent),
            questions: session.agent.questions.clone(),
            job_id: session.job_id,
            phone_number: session.phone_number,
            agent_id: session.agent_id,
            status: session.status.to_string(),
            start_time: session.start_time,
            last_update: session.last_update,
            attempts: session.attempts,
            polling,
        }
    }
}

/// Current result state: ready, diagnostic, pending or ended
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultResponse {
    pub job_id: String,
    #[schema(value_type = Object)]
    pub result: ResultState,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub job_id: String,
    #[schema(value_type = Object)]
    pub outcome: ReconcileOutcome,
}

/// Raw provider records for triage
#[derive(Debug, Serialize, ToSchema)]
pub struct DiagnosticsResponse {
    pub job_id: String,
    pub agent_id: String,
    pub attempts: u32,
    pub total_conversations_found: usize,
    /// Job ids referenced by the inspected records
    pub seen_job_ids: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<serde_json::Value>,
    pub collected_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl DiagnosticsResponse {
    pub fn from_domain(snapshot: DiagnosticSnapshot) -> Self {
        let seen_job_ids = snapshot
            .seen_job_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        let records = snapshot
            .records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "conversation_id": r.conversation_id,
                    "agent_id": r.agent_id,
                    "job_id": r.job_id,
                    "status": r.status,
                    "created_at": r.created_at,
                })
            })
            .collect();

        Self {
            job_id: snapshot.job_id,
            agent_id: snapshot.agent_id,
            attempts: snapshot.attempts,
            total_conversations_found: snapshot.total_conversations_found,
            seen_job_ids,
            records,
            collected_at: snapshot.collected_at,
            note: snapshot.note,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopResponse {
    pub job_id: String,
    /// False when no timer was running
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_request() {
        let request: StartCallRequest = serde_json::from_value(serde_json::json!({
            "phoneNumber": "+34699043286",
            "agentName": "Survey Bot",
            "callPurpose": "collect feedback",
            "questions": ["What is your name?"],
            "firstMessage": "Hello!"
        }))
        .unwrap();

        let agent = request.agent_config();
        assert_eq!(agent.name, "Survey Bot");
        assert_eq!(agent.purpose, "collect feedback");
        assert_eq!(agent.first_message, "Hello!");
        assert_eq!(agent.voice_id, callwatch::domain::DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_voice_and_prompt_overrides() {
        let request: StartCallRequest = serde_json::from_value(serde_json::json!({
            "phone_number": "+34699043286",
            "voice_id": "voice_42",
            "custom_prompt": "Only ask the listed questions."
        }))
        .unwrap();

        let agent = request.agent_config();
        assert_eq!(agent.voice_id, "voice_42");
        assert_eq!(agent.custom_prompt, "Only ask the listed questions.");
        assert_eq!(agent.name, AgentConfig::default().name);
    }
}
