//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod call_status;
mod confidence;
mod transcript;
mod update_source;

pub use call_status::*;
pub use confidence::*;
pub use transcript::*;
pub use update_source::*;
