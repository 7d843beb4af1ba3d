//! UpdateSource - Which channel produced a session write

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Dispatch,
    Poll,
    Push,
    Reconcile,
}

impl std::fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateSource::Dispatch => write!(f, "dispatch"),
            UpdateSource::Poll => write!(f, "poll"),
            UpdateSource::Push => write!(f, "push"),
            UpdateSource::Reconcile => write!(f, "reconcile"),
        }
    }
}
