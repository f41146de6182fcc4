//! Contract with the build service that stores credentials and runs builds.

use crate::credentials::{CredentialKind, CredentialMetadata, IosCredentials, Platform};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the build service.
///
/// `Classified` carries a code the service attached to the rejection and is
/// turned into an actionable message by the workflow. Everything else (network
/// faults, timeouts, malformed responses) is `Unclassified` and propagates as is.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message} (code: {code})")]
    Classified { code: String, message: String },

    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl ServiceError {
    #[must_use]
    pub fn classified(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Classified {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Message suitable for the operator, without the code suffix
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Classified { message, .. } => message.clone(),
            Self::Unclassified(e) => e.to_string(),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Build accepted by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSubmission {
    pub id: String,
    #[serde(default)]
    pub status_url: Option<String>,
}

/// Operations the credential workflow needs from the build service.
///
/// Implementations handle transport; the workflow only sees the tagged
/// [`ServiceError`] and never inspects error identities.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Credentials stored for `metadata`, or `None` if nothing is stored
    async fn fetch_existing_credentials(
        &self,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<Option<IosCredentials>>;

    /// Validate one credential kind.
    ///
    /// With `candidate = None` the service re-checks what it already stores.
    async fn validate_credential(
        &self,
        platform: Platform,
        kind: CredentialKind,
        candidate: Option<&IosCredentials>,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<()>;

    /// Persist `bundle` for `metadata`
    async fn update_credential(
        &self,
        platform: Platform,
        bundle: &IosCredentials,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<()>;

    /// Have the service create and store a distribution certificate
    async fn auto_generate_certificate(&self, metadata: &CredentialMetadata) -> ServiceResult<()>;

    /// Have the service create and store a push certificate, returning its validity
    async fn auto_generate_push_certificate(
        &self,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<bool>;

    /// Make sure an App ID exists for `metadata.bundle_identifier`
    async fn ensure_app_identifier_registered(
        &self,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<()>;

    /// Start a remote build of the published experiences
    async fn submit_build(
        &self,
        experience_ids: &[String],
        platform: Platform,
    ) -> ServiceResult<BuildSubmission>;
}
