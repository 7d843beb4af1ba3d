//! Domain Entities
//!
//! - AgentConfig: persona and scripted questions
//! - CallJob: phone number + agent, validated for dispatch
//! - CallSession: tracked lifecycle of one job
//! - CallResult / DiagnosticSnapshot: what a finished call yields
//! - ConversationRecord / ConversationDetail: provider-side conversation data
//! - CallEvent / StatusReport: status payloads

mod agent;
mod call_job;
mod conversation;
mod event;
mod result;
mod session;

pub use agent::*;
pub use call_job::*;
pub use conversation::*;
pub use event::*;
pub use result::*;
pub use session::*;
