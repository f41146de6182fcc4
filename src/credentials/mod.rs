//! iOS credential collection for remote builds
//!
//! # Module Organization
//!
//! - `model` - Credential identity, kinds and the credential bundle
//! - `state` - Per-kind state and the pure decision table
//! - `workflow` - Prompting, validation and the publish/build handoff

pub mod model;
pub mod state;
pub mod workflow;

// Re-export public API
pub use model::{CredentialKind, CredentialMetadata, IosCredentials, Platform};
pub use state::{KindState, NextAction, next_action};
pub use workflow::{CredentialWorkflow, WorkflowOptions, resolve_metadata, run_build};
