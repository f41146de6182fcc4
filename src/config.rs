//! Operator and project configuration.

use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default build service endpoint
pub const DEFAULT_API_URL: &str = "https://api.kodegen.dev/v1";

/// Default packager program used for `publish` and `status`
pub const DEFAULT_PACKAGER: &str = "kodegen-packager";

/// Project manifest read from the project directory
pub const PROJECT_CONFIG_FILE: &str = "app.json";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Operator configuration, read from `{config_dir}/kodegen/publish.toml`.
///
/// Environment variables take priority over the file:
/// `KODEGEN_API_URL`, `KODEGEN_USERNAME`, `KODEGEN_SESSION_TOKEN`, `KODEGEN_PACKAGER`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Account the credentials are stored under
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub session_token: Option<String>,

    #[serde(default = "default_packager")]
    pub packager: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            session_token: None,
            packager: default_packager(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PublishConfig {
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kodegen").join("publish.toml"))
    }

    /// Load from `path`, or from the default location when it exists, then
    /// apply environment overrides.
    ///
    /// An explicit `path` that does not exist is an error; a missing default
    /// file is not.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let config = match file {
            Some(file) => {
                let content = tokio::fs::read_to_string(&file).await.map_err(|e| {
                    PublishError::MissingConfig(format!(
                        "Could not read {}: {e}",
                        file.display()
                    ))
                })?;
                tracing::debug!(path = %file.display(), "loaded publish config");
                toml::from_str(&content)?
            }
            None => Self::default(),
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply overrides from `lookup` (normally the process environment).
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("KODEGEN_API_URL") {
            self.api_url = url;
        }
        if let Some(username) = lookup("KODEGEN_USERNAME") {
            self.username = Some(username);
        }
        if let Some(token) = lookup("KODEGEN_SESSION_TOKEN") {
            self.session_token = Some(token);
        }
        if let Some(packager) = lookup("KODEGEN_PACKAGER") {
            self.packager = packager;
        }
        self
    }

    /// Logged-in username, required before any credential lookup
    pub fn username(&self) -> Result<&str> {
        match self.username.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(PublishError::MissingConfig(
                "No username configured.\n\
                 Set `username` in publish.toml or the KODEGEN_USERNAME environment variable."
                    .to_string(),
            )),
        }
    }
}

/// Subset of `app.json` the publish workflow reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub ios: Option<IosProjectConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosProjectConfig {
    #[serde(default)]
    pub bundle_identifier: Option<String>,
}

impl ProjectConfig {
    pub async fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(PROJECT_CONFIG_FILE);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(PublishError::MissingConfig(format!(
                "No {PROJECT_CONFIG_FILE} found in {}",
                project_dir.display()
            )));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn slug(&self) -> Result<&str> {
        match self.slug.as_deref() {
            Some(slug) if !slug.trim().is_empty() => Ok(slug),
            _ => Err(PublishError::MissingConfig(format!(
                "`slug` is not set in {PROJECT_CONFIG_FILE}"
            ))),
        }
    }

    pub fn bundle_identifier(&self) -> Result<&str> {
        match self.ios.as_ref().and_then(|ios| ios.bundle_identifier.as_deref()) {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(PublishError::MissingConfig(format!(
                "`ios.bundleIdentifier` is not set in {PROJECT_CONFIG_FILE}.\n\
                 Add a bundle identifier such as \"com.yourcompany.yourapp\" and run the build again."
            ))),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_packager() -> String {
    DEFAULT_PACKAGER.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
