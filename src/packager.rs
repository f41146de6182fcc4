//! Bridge to the external packager that bundles and publishes projects.
//!
//! The packager is a separate program; this module only spawns it and parses
//! the JSON it prints.

use crate::error::{PublishError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// A process the packager manages for a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub name: String,
    #[serde(default)]
    pub pid: Option<u32>,
    pub status: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
}

impl ProcessInfo {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishOutput {
    experience_ids: Vec<String>,
}

#[derive(Deserialize)]
struct StatusOutput {
    processes: Vec<ProcessInfo>,
}

#[async_trait]
pub trait Packager: Send + Sync {
    /// Bundle and publish the project, returning the published experience ids
    async fn publish_project(&self, project_dir: &Path) -> Result<Vec<String>>;

    /// Packager processes for `project_dir`, or every managed process when `all`
    async fn status(&self, project_dir: &Path, all: bool) -> Result<Vec<ProcessInfo>>;
}

/// [`Packager`] backed by a packager executable on `PATH` or at an explicit path
#[derive(Debug, Clone)]
pub struct ExternalPackager {
    program: String,
}

impl ExternalPackager {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run_json(&self, args: &[&OsStr]) -> Result<Vec<u8>> {
        tracing::debug!(program = %self.program, ?args, "running packager");

        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                PublishError::Packager(format!(
                    "Failed to run '{}': {e}\n   \
                     Install the packager or set `packager` in publish.toml",
                    self.program
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PublishError::Packager(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Packager for ExternalPackager {
    async fn publish_project(&self, project_dir: &Path) -> Result<Vec<String>> {
        let stdout = self
            .run_json(&[OsStr::new("publish"), OsStr::new("--json"), project_dir.as_os_str()])
            .await?;
        let parsed: PublishOutput = serde_json::from_slice(&stdout)?;

        if parsed.experience_ids.is_empty() {
            return Err(PublishError::Packager(
                "Publish succeeded but returned no experience ids".to_string(),
            ));
        }

        tracing::info!(count = parsed.experience_ids.len(), "project published");
        Ok(parsed.experience_ids)
    }

    async fn status(&self, project_dir: &Path, all: bool) -> Result<Vec<ProcessInfo>> {
        let mut args = vec![OsStr::new("status"), OsStr::new("--json")];
        if all {
            args.push(OsStr::new("--all"));
        } else {
            args.push(project_dir.as_os_str());
        }

        let stdout = self.run_json(&args).await?;
        let parsed: StatusOutput = serde_json::from_slice(&stdout)?;
        Ok(parsed.processes)
    }
}
