//! Credential identity and material exchanged with the build service.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Mobile platform a build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Platform {
    #[serde(rename = "ios")]
    Ios,
}

impl Platform {
    /// Path segment used by the build service API
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ios => write!(f, "iOS"),
        }
    }
}

/// The three kinds of credential a build needs, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
    #[serde(rename = "appleId")]
    AppleId,
    #[serde(rename = "cert")]
    DistributionCertificate,
    #[serde(rename = "push")]
    PushCertificate,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AppleId => "Apple ID",
            Self::DistributionCertificate => "distribution certificate",
            Self::PushCertificate => "push certificate",
        };
        f.write_str(name)
    }
}

/// Key identifying which project, account and platform a credential set belongs to.
///
/// Built once per run from the operator config and `app.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMetadata {
    pub username: String,
    pub experience_name: String,
    pub bundle_identifier: String,
    pub platform: Platform,
}

impl CredentialMetadata {
    #[must_use]
    pub fn new(username: &str, slug: &str, bundle_identifier: &str, platform: Platform) -> Self {
        Self {
            username: username.to_string(),
            experience_name: format!("@{username}/{slug}"),
            bundle_identifier: bundle_identifier.to_string(),
            platform,
        }
    }
}

/// iOS credential bundle as stored by the build service.
///
/// Every field is optional: a missing field means that credential kind still has
/// to be collected. Certificate fields hold base64-encoded PKCS#12 data. Callers
/// zeroize bundles once they are done with them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(rename_all = "camelCase")]
pub struct IosCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_p12: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_p12: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_password: Option<String>,
}

impl IosCredentials {
    /// Whether the material for `kind` is known
    #[must_use]
    pub fn has(&self, kind: CredentialKind) -> bool {
        match kind {
            CredentialKind::AppleId => self.apple_id.is_some() && self.password.is_some(),
            CredentialKind::DistributionCertificate => self.cert_p12.is_some(),
            CredentialKind::PushCertificate => self.push_p12.is_some(),
        }
    }

    /// Copy every field present in `other` over this bundle.
    pub fn merge(&mut self, other: &IosCredentials) {
        fn take(dst: &mut Option<String>, src: &Option<String>) {
            if let Some(value) = src {
                *dst = Some(value.clone());
            }
        }

        take(&mut self.apple_id, &other.apple_id);
        take(&mut self.password, &other.password);
        take(&mut self.team_id, &other.team_id);
        take(&mut self.cert_p12, &other.cert_p12);
        take(&mut self.cert_password, &other.cert_password);
        take(&mut self.push_p12, &other.push_p12);
        take(&mut self.push_password, &other.push_password);
    }
}

impl fmt::Debug for IosCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() { "<redacted>" } else { "<none>" }
        }

        f.debug_struct("IosCredentials")
            .field("apple_id", &self.apple_id)
            .field("password", &redact(&self.password))
            .field("team_id", &self.team_id)
            .field("cert_p12", &redact(&self.cert_p12))
            .field("cert_password", &redact(&self.cert_password))
            .field("push_p12", &redact(&self.push_p12))
            .field("push_password", &redact(&self.push_password))
            .finish()
    }
}
