//! Webhook DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use callwatch::CallStatus;

/// Push event from the provider
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookEvent {
    /// "call_started", "call_ended" or "speech_update"
    #[serde(default)]
    pub event_type: Option<String>,
    /// Job (batch call) id
    #[serde(alias = "call_id", alias = "batch_call_id", alias = "jobId")]
    pub job_id: String,
    /// Raw provider status, used when no event_type is given
    #[serde(default)]
    pub status: Option<String>,
    /// Unix seconds; receipt time is used when absent
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub transcript: Option<serde_json::Value>,
    /// Partial speech for speech_update events
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// Lifecycle status carried by the event, if any
    pub fn lifecycle_status(&self) -> Option<CallStatus> {
        match self.event_type.as_deref() {
            Some("call_started") => Some(CallStatus::InProgress),
            Some("call_ended") => Some(CallStatus::Completed),
            Some("speech_update") => None,
            Some(other) => CallStatus::from_provider(other),
            None => self.status.as_deref().and_then(CallStatus::from_provider),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub accepted: bool,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
