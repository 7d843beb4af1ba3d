//! Infrastructure Adapters
//!
//! Implementations of domain ports for external systems.

pub mod elevenlabs;
pub mod signature;

// Re-exports
pub use elevenlabs::{ElevenLabsConfig, ElevenLabsProvider};
pub use signature::{sign_payload, verify_signature, SIGNATURE_HEADER};
