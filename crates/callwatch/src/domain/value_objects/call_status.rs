//! CallStatus - Lifecycle state of a dispatched call

use serde::{Deserialize, Serialize};

/// Lifecycle state of a call job
///
/// `Idle` and `Initiating` are local-only states; everything after them is
/// reported by the provider. `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Idle,
    Initiating,
    Initiated,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl CallStatus {
    /// Position in the state machine. Terminal states share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            CallStatus::Idle => 0,
            CallStatus::Initiating => 1,
            CallStatus::Initiated => 2,
            CallStatus::InProgress => 3,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Cancelled => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Cancelled
        )
    }

    /// Whether a session may move from `self` to `next`.
    ///
    /// Staying in the same non-terminal state is allowed (a refresh). Nothing
    /// leaves a terminal state.
    pub fn can_advance_to(self, next: CallStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    /// Map a provider-reported status string onto the state machine.
    ///
    /// Returns `None` for strings that carry no lifecycle information.
    pub fn from_provider(raw: &str) -> Option<CallStatus> {
        match raw.trim().to_lowercase().as_str() {
            "pending" | "initiated" | "queued" | "scheduled" => Some(CallStatus::Initiated),
            "in_progress" | "in-progress" | "running" | "call_started" => {
                Some(CallStatus::InProgress)
            }
            "completed" | "done" | "call_ended" => Some(CallStatus::Completed),
            "failed" | "error" => Some(CallStatus::Failed),
            "cancelled" | "canceled" => Some(CallStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Idle => write!(f, "idle"),
            CallStatus::Initiating => write!(f, "initiating"),
            CallStatus::Initiated => write!(f, "initiated"),
            CallStatus::InProgress => write!(f, "in_progress"),
            CallStatus::Completed => write!(f, "completed"),
            CallStatus::Failed => write!(f, "failed"),
            CallStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(CallStatus::Idle),
            "initiating" => Ok(CallStatus::Initiating),
            other => {
                CallStatus::from_provider(other).ok_or_else(|| format!("Unknown call status: {}", s))
            }
        }
    }
}
