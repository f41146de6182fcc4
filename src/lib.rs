//! Credential collection, publishing and remote builds for kodegen mobile projects

#[macro_use]
pub mod prompts;

pub mod config;
pub mod credentials;
pub mod error;
pub mod packager;
pub mod platform_api;
pub mod service;
pub mod status;
pub mod validation;

// Re-export common types
pub use config::{ProjectConfig, PublishConfig};
pub use credentials::{CredentialWorkflow, WorkflowOptions, run_build};
pub use error::PublishError;
pub use service::{PlatformService, ServiceError};
