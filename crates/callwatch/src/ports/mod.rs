//! Ports (Interfaces)
//!
//! Abstract interfaces that define how the tracker interacts with the
//! provider and with whoever watches sessions.
//!
//! Implementations of the provider live in the infrastructure layer.

pub mod observer;
pub mod provider;

// Re-exports
pub use observer::*;
pub use provider::*;
