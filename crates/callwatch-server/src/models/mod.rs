//! Callwatch API Models
//!
//! - Call: start requests, session views, results
//! - Webhook: provider push events

mod call;
mod webhook;

pub use call::*;
pub use webhook::*;
