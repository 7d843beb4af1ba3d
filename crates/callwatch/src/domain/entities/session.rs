//! CallSession - Tracked state of one dispatched job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentConfig;
use super::result::{CallOutcome, CallResult, DiagnosticSnapshot};
use crate::domain::value_objects::CallStatus;

/// One session per dispatched job, keyed by the provider's job id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub job_id: String,
    pub phone_number: String,
    pub agent_id: String,
    pub agent: AgentConfig,
    pub start_time: DateTime<Utc>,
    pub status: CallStatus,
    /// Timestamp of the last accepted status write (provider clock, unix seconds)
    pub last_update: Option<i64>,
    pub embedded_results: Option<CallResult>,
    /// Reconciliation attempts that found no conversation
    pub attempts: u32,
    pub outcome: Option<CallOutcome>,
}

/// Why an update was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Older than the session's `last_update`
    Stale { current: i64, incoming: i64 },
    /// Same timestamp and no progress in the state machine
    Duplicate,
    /// Would move the state machine backwards
    Regression { from: CallStatus, to: CallStatus },
    /// Session already finished
    Terminal { status: CallStatus },
    /// No session for this job id
    UnknownJob,
}

/// What `get_result` reports for a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultState {
    Ready { result: CallResult },
    Diagnostic { snapshot: DiagnosticSnapshot },
    Pending { status: CallStatus, attempts: u32 },
    Ended { status: CallStatus },
}

impl CallSession {
    /// New session in `initiating`, before any provider write
    pub fn new(
        job_id: impl Into<String>,
        phone_number: impl Into<String>,
        agent_id: impl Into<String>,
        agent: AgentConfig,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            phone_number: phone_number.into(),
            agent_id: agent_id.into(),
            agent,
            start_time: Utc::now(),
            status: CallStatus::Initiating,
            last_update: None,
            embedded_results: None,
            attempts: 0,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Decide whether a write is accepted.
    ///
    /// The register is ordered by `(timestamp, state rank)`: a write must be
    /// newer, or equally new and further along the state machine. A newer
    /// write that moves backwards is still refused, and the first terminal
    /// status sticks.
    pub fn check_update(&self, status: CallStatus, timestamp: i64) -> Result<(), IgnoreReason> {
        if self.status.is_terminal() {
            return Err(IgnoreReason::Terminal {
                status: self.status,
            });
        }

        if let Some(current) = self.last_update {
            if timestamp < current {
                return Err(IgnoreReason::Stale {
                    current,
                    incoming: timestamp,
                });
            }
            if timestamp == current && status.rank() <= self.status.rank() {
                return Err(IgnoreReason::Duplicate);
            }
        }

        if !self.status.can_advance_to(status) {
            return Err(IgnoreReason::Regression {
                from: self.status,
                to: status,
            });
        }

        Ok(())
    }

    /// Apply a write that passed `check_update`
    pub(crate) fn apply(
        &mut self,
        status: CallStatus,
        timestamp: i64,
        embedded_results: Option<CallResult>,
    ) {
        self.status = status;
        self.last_update = Some(timestamp);
        if embedded_results.is_some() {
            self.embedded_results = embedded_results;
        }
    }

    /// Completed without results attached by the provider
    pub fn needs_reconciliation(&self) -> bool {
        self.status == CallStatus::Completed
            && self.embedded_results.is_none()
            && self.outcome.is_none()
    }

    pub fn result_state(&self) -> ResultState {
        if let Some(result) = &self.embedded_results {
            return ResultState::Ready {
                result: result.clone(),
            };
        }
        match &self.outcome {
            Some(CallOutcome::Result(result)) => ResultState::Ready {
                result: result.clone(),
            },
            Some(CallOutcome::Diagnostic(snapshot)) => ResultState::Diagnostic {
                snapshot: snapshot.clone(),
            },
            None if matches!(self.status, CallStatus::Failed | CallStatus::Cancelled) => {
                ResultState::Ended {
                    status: self.status,
                }
            }
            None => ResultState::Pending {
                status: self.status,
                attempts: self.attempts,
            },
        }
    }
}
