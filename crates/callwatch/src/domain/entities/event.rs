//! Status payloads exchanged with the provider

use serde::{Deserialize, Serialize};

use super::result::CallResult;
use crate::domain::value_objects::CallStatus;

/// Acknowledgement of a dispatched call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedCall {
    pub job_id: String,
    pub agent_id: String,
}

/// Answer to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: CallStatus,
    /// Provider clock, unix seconds
    pub last_update: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded_results: Option<CallResult>,
}

/// Push notification from the provider's event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    pub job_id: String,
    pub status: CallStatus,
    /// Provider timestamp (unix seconds); receipt time is used when absent
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub results: Option<CallResult>,
}

impl CallEvent {
    pub fn new(job_id: impl Into<String>, status: CallStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            timestamp: None,
            results: None,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_results(mut self, results: CallResult) -> Self {
        self.results = Some(results);
        self
    }
}
