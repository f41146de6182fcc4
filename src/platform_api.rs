//! HTTP client for the kodegen build service

use crate::config::PublishConfig;
use crate::credentials::{CredentialKind, CredentialMetadata, IosCredentials, Platform};
use crate::error::Result;
use crate::service::{BuildSubmission, PlatformService, ServiceError, ServiceResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HttpPlatformService {
    #[zeroize(skip)]
    client: reqwest::Client,
    #[zeroize(skip)]
    api_url: String,
    #[zeroize(skip)]
    request_timeout_secs: u64,
    session_token: Option<String>,
}

impl HttpPlatformService {
    /// Create client from operator configuration
    pub fn new(config: &PublishConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("kodegen_publish/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            request_timeout_secs: config.request_timeout_secs,
            session_token: config.session_token.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ServiceResult<reqwest::Response> {
        let url = format!("{}/{path}", self.api_url);
        tracing::debug!(%url, "build service request");

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.session_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(
                    "Request to the build service timed out after {} seconds. Check your network connection.",
                    if e.is_connect() { CONNECT_TIMEOUT_SECS } else { self.request_timeout_secs }
                )
            } else if e.is_connect() {
                anyhow::anyhow!(
                    "Could not connect to the build service at {}. Check network/firewall settings.",
                    self.api_url
                )
            } else {
                anyhow::anyhow!("Network error: {e}")
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        tracing::debug!(%status, body = %error_text, "build service error");
        Err(classify_error_response(status, &error_text))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ServiceResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::from(anyhow::anyhow!("Malformed response from {path}: {e}")))
    }
}

// Build service error response structures
#[derive(Deserialize)]
struct ErrorResponse {
    errors: Vec<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Turn a non-2xx response into a tagged [`ServiceError`].
///
/// Only bodies carrying a coded error are classified; anything else is
/// reported as an unclassified failure with a hint based on the status.
fn classify_error_response(status: reqwest::StatusCode, body: &str) -> ServiceError {
    if let Ok(response) = serde_json::from_str::<ErrorResponse>(body)
        && let Some(err) = response.errors.into_iter().next()
    {
        let message = err
            .message
            .or(err.detail)
            .unwrap_or_else(|| format!("Request failed: {status}"));
        return ServiceError::classified(err.code, message);
    }

    let hint = match status.as_u16() {
        401 => "Authentication failed - check your session token".to_string(),
        403 => "Permission denied for this account".to_string(),
        429 => "Rate limited - wait and retry".to_string(),
        _ => format!("Request failed: {status}"),
    };
    ServiceError::Unclassified(anyhow::anyhow!(hint))
}

#[derive(Serialize)]
struct MetadataRequest<'a> {
    metadata: &'a CredentialMetadata,
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    kind: CredentialKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<&'a IosCredentials>,
    metadata: &'a CredentialMetadata,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    credentials: &'a IosCredentials,
    metadata: &'a CredentialMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildRequest<'a> {
    experience_ids: &'a [String],
    platform: Platform,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    credentials: Option<IosCredentials>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushResponse {
    is_valid: bool,
}

#[async_trait]
impl PlatformService for HttpPlatformService {
    async fn fetch_existing_credentials(
        &self,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<Option<IosCredentials>> {
        let path = format!("credentials/{}/fetch", metadata.platform.as_str());
        let response: FetchResponse = self.post_json(&path, &MetadataRequest { metadata }).await?;
        Ok(response.credentials)
    }

    async fn validate_credential(
        &self,
        platform: Platform,
        kind: CredentialKind,
        candidate: Option<&IosCredentials>,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<()> {
        let path = format!("credentials/{}/validate", platform.as_str());
        let request = ValidateRequest {
            kind,
            credentials: candidate,
            metadata,
        };
        self.post(&path, &request).await?;
        Ok(())
    }

    async fn update_credential(
        &self,
        platform: Platform,
        bundle: &IosCredentials,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<()> {
        let path = format!("credentials/{}/update", platform.as_str());
        let request = UpdateRequest {
            credentials: bundle,
            metadata,
        };
        self.post(&path, &request).await?;
        Ok(())
    }

    async fn auto_generate_certificate(&self, metadata: &CredentialMetadata) -> ServiceResult<()> {
        self.post("credentials/ios/certificate/generate", &MetadataRequest { metadata })
            .await?;
        Ok(())
    }

    async fn auto_generate_push_certificate(
        &self,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<bool> {
        let response: PushResponse = self
            .post_json("credentials/ios/push/generate", &MetadataRequest { metadata })
            .await?;
        Ok(response.is_valid)
    }

    async fn ensure_app_identifier_registered(
        &self,
        metadata: &CredentialMetadata,
    ) -> ServiceResult<()> {
        self.post("credentials/ios/app-id", &MetadataRequest { metadata })
            .await?;
        Ok(())
    }

    async fn submit_build(
        &self,
        experience_ids: &[String],
        platform: Platform,
    ) -> ServiceResult<BuildSubmission> {
        let request = BuildRequest {
            experience_ids,
            platform,
        };
        self.post_json("builds", &request).await
    }
}
