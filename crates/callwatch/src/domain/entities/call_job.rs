//! CallJob - The request that starts a call

use serde::{Deserialize, Serialize};

use super::agent::AgentConfig;
use crate::domain::errors::TrackerError;

/// Phone number plus agent configuration, validated before dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallJob {
    pub phone_number: String,
    pub agent: AgentConfig,
}

impl CallJob {
    /// Validate and normalize a job.
    ///
    /// Phone numbers are accepted in E.164 form (`+` followed by 8 to 15
    /// digits); spaces, dashes, dots and parentheses are stripped first.
    pub fn new(phone_number: &str, agent: AgentConfig) -> Result<Self, TrackerError> {
        let phone_number = normalize_phone_number(phone_number)?;
        agent.validate()?;
        Ok(Self {
            phone_number,
            agent,
        })
    }
}

pub fn normalize_phone_number(raw: &str) -> Result<String, TrackerError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if compact.is_empty() {
        return Err(TrackerError::dispatch("phone number is required"));
    }

    let Some(digits) = compact.strip_prefix('+') else {
        return Err(TrackerError::dispatch(format!(
            "phone number must be in international format: {}",
            raw
        )));
    };

    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(TrackerError::dispatch(format!("invalid phone number: {}", raw)));
    }

    Ok(compact)
}
