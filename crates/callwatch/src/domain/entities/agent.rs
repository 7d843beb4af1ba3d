//! AgentConfig - Persona and script for one outbound call

use serde::{Deserialize, Serialize};

use crate::domain::errors::TrackerError;

pub const DEFAULT_AGENT_NAME: &str = "AI Assistant";
pub const DEFAULT_PURPOSE: &str = "follow up with you";
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Agent configuration, immutable once a call is dispatched
///
/// Question order is significant: the n-th question is identified as
/// `question_n` in extracted results. Duplicate question text is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub purpose: String,
    pub voice_id: String,
    pub language: String,
    pub first_message: String,
    pub custom_prompt: String,
    pub questions: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            purpose: DEFAULT_PURPOSE.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            first_message: String::new(),
            custom_prompt: String::new(),
            questions: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            ..Self::default()
        }
    }

    pub fn with_questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.questions = questions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_first_message(mut self, message: impl Into<String>) -> Self {
        self.first_message = message.into();
        self
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = prompt.into();
        self
    }

    /// Identifier of the question at `index` (zero-based)
    pub fn question_id(index: usize) -> String {
        format!("question_{}", index + 1)
    }

    /// Greeting sent to the provider: the configured one, or a default
    /// built from the persona.
    pub fn effective_first_message(&self) -> String {
        if !self.first_message.trim().is_empty() {
            return self.first_message.clone();
        }
        if self.questions.is_empty() {
            format!(
                "Hi, I'm {}. I'm calling to {}. How are you doing today?",
                self.name, self.purpose
            )
        } else {
            format!(
                "Hi, I'm {}. I'm calling to {}. I have a few questions that will only take a couple of minutes. Is now a good time to talk?",
                self.name, self.purpose
            )
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.name.trim().is_empty() {
            return Err(TrackerError::dispatch("agent name is required"));
        }
        if self.questions.iter().any(|q| q.trim().is_empty()) {
            return Err(TrackerError::dispatch("questions must not be blank"));
        }
        Ok(())
    }
}
