//! Error types for credential collection, publishing and build submission.

use crate::credentials::CredentialKind;
use crate::service::ServiceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "The stored {kind} is no longer valid.\n\
         Run the build again with --clear-credentials to enter new credentials."
    )]
    InvalidStoredCredentials { kind: CredentialKind },

    #[error("Apple ID rejected: {0}")]
    AppleIdRejected(String),

    #[error(
        "The distribution certificate is not present in your Apple developer portal: {0}\n\
         Upload a different certificate or let the build service generate one."
    )]
    CertificateNotInPortal(String),

    #[error(
        "The push certificate is not present in your Apple developer portal: {0}\n\
         Upload a different push certificate or let the build service generate one."
    )]
    PushCertificateNotInPortal(String),

    #[error("Failed fetching/uploading certificates: {0}")]
    CertificateFetch(String),

    #[error(
        "Could not register an app identifier for '{bundle_identifier}': {message}\n\
         Change the bundle identifier in app.json to a value you own and run the build again."
    )]
    AppIdRegistration {
        bundle_identifier: String,
        message: String,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Packager failed: {0}")]
    Packager(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}
