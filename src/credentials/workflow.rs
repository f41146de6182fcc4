//! Credential collection, validation and the publish/build handoff
//!
//! The workflow settles each credential kind in a fixed order:
//!
//! 1. Apple ID (certificates are issued under the Apple developer account)
//! 2. Distribution certificate
//! 3. App ID registration for the bundle identifier
//! 4. Push certificate (scoped to the registered App ID)
//!
//! Then it publishes the project and submits a build of what was published.
//! Any remote failure ends the run; the operator reruns the command.

use super::model::{CredentialKind, CredentialMetadata, IosCredentials, Platform};
use super::state::{KindState, NextAction, next_action};
use crate::config::{ProjectConfig, PublishConfig};
use crate::error::{PublishError, Result};
use crate::packager::Packager;
use crate::prompts::{Answers, Choice, Prompter, Question, prompt_all};
use crate::service::{BuildSubmission, PlatformService, ServiceError};
use crate::success;
use crate::validation::{absolute_path_transform, certificate_path_validator};
use base64::Engine;
use std::io::Write;
use std::path::Path;
use termcolor::{BufferWriter, ColorChoice, WriteColor};
use zeroize::Zeroize;

const SOURCE_GENERATE: &str = "generate";
const SOURCE_UPLOAD: &str = "upload";

/// Options chosen by the operator for one run
#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    pub platform: Platform,
    /// Ignore stored credentials and collect every kind again
    pub clear_credentials: bool,
}

/// Build the credential lookup key for a project.
///
/// The bundle identifier is checked first so a misconfigured project fails
/// before any prompt or network call.
pub fn resolve_metadata(
    config: &PublishConfig,
    project: &ProjectConfig,
    platform: Platform,
) -> Result<CredentialMetadata> {
    let bundle_identifier = project.bundle_identifier()?;
    let username = config.username()?;
    let slug = project.slug()?;
    Ok(CredentialMetadata::new(username, slug, bundle_identifier, platform))
}

/// Load the project, settle its credentials, publish it and submit a build.
pub async fn run_build(
    project_dir: &Path,
    config: &PublishConfig,
    options: WorkflowOptions,
    service: &dyn PlatformService,
    packager: &dyn Packager,
    prompter: &mut dyn Prompter,
) -> Result<BuildSubmission> {
    let project = ProjectConfig::load(project_dir).await?;
    let metadata = resolve_metadata(config, &project, options.platform)?;

    let mut workflow = CredentialWorkflow::new(service, prompter, metadata, options);
    workflow.ensure_credentials().await?;
    workflow.publish_and_build(packager, project_dir).await
}

/// Drives one credential kind at a time to `Valid`.
pub struct CredentialWorkflow<'a> {
    service: &'a dyn PlatformService,
    prompter: &'a mut dyn Prompter,
    metadata: CredentialMetadata,
    options: WorkflowOptions,
    credentials: IosCredentials,
}

impl<'a> CredentialWorkflow<'a> {
    pub fn new(
        service: &'a dyn PlatformService,
        prompter: &'a mut dyn Prompter,
        metadata: CredentialMetadata,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            service,
            prompter,
            metadata,
            options,
            credentials: IosCredentials::default(),
        }
    }

    /// Make sure the Apple ID, distribution certificate and push certificate
    /// are all valid for this project.
    pub async fn ensure_credentials(&mut self) -> Result<()> {
        let existing = if self.options.clear_credentials {
            tracing::info!("clear-credentials set, ignoring stored credentials");
            None
        } else {
            self.service
                .fetch_existing_credentials(&self.metadata)
                .await?
        };

        let initial = |kind| KindState::from_existing(existing.as_ref(), kind);
        let apple_id = initial(CredentialKind::AppleId);
        let certificate = initial(CredentialKind::DistributionCertificate);
        let push = initial(CredentialKind::PushCertificate);

        if let Some(existing) = &existing {
            self.credentials.merge(existing);
        }

        print_step(&format!(
            "Checking {} credentials for {} ({})",
            self.options.platform, self.metadata.experience_name, self.metadata.bundle_identifier
        ));

        self.settle(CredentialKind::AppleId, apple_id).await?;
        self.settle(CredentialKind::DistributionCertificate, certificate)
            .await?;
        self.register_app_id().await?;
        self.settle(CredentialKind::PushCertificate, push).await?;

        Ok(())
    }

    /// Publish the project and submit a build of the published experiences.
    pub async fn publish_and_build(
        &self,
        packager: &dyn Packager,
        project_dir: &Path,
    ) -> Result<BuildSubmission> {
        print_step("Publishing project");
        let experience_ids = packager.publish_project(project_dir).await?;
        success!("Published {} experience(s)", experience_ids.len());

        let submission = self
            .service
            .submit_build(&experience_ids, self.options.platform)
            .await?;
        tracing::info!(build_id = %submission.id, "build submitted");
        success!("Build queued: {}", submission.id);

        Ok(submission)
    }

    async fn settle(&mut self, kind: CredentialKind, initial: KindState) -> Result<()> {
        let mut state = initial;
        loop {
            let action = next_action(state, self.options.clear_credentials);
            tracing::debug!(%kind, ?state, ?action, "credential state");

            match action {
                NextAction::Proceed => return Ok(()),
                NextAction::Abort => return Err(PublishError::InvalidStoredCredentials { kind }),
                NextAction::Revalidate => state = self.revalidate(kind).await?,
                NextAction::Collect => {
                    self.collect(kind).await?;
                    state = KindState::Valid;
                }
            }
        }
    }

    async fn revalidate(&mut self, kind: CredentialKind) -> Result<KindState> {
        match self
            .service
            .validate_credential(self.options.platform, kind, None, &self.metadata)
            .await
        {
            Ok(()) => {
                success!("Stored {} is valid", kind);
                Ok(KindState::Valid)
            }
            Err(ServiceError::Classified { code, message }) => {
                tracing::warn!(%kind, %code, %message, "stored credential rejected");
                Ok(KindState::Invalid)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn collect(&mut self, kind: CredentialKind) -> Result<()> {
        match kind {
            CredentialKind::AppleId => self.collect_apple_id().await,
            CredentialKind::DistributionCertificate | CredentialKind::PushCertificate => {
                self.collect_certificate(kind).await
            }
        }
    }

    async fn collect_apple_id(&mut self) -> Result<()> {
        print_step("Apple developer account");

        let questions = [
            Question::text("appleId", "Apple ID").required(),
            Question::masked("password", "Password (for your Apple ID)").required(),
            Question::text("teamId", "Apple Team ID").required(),
        ];
        let answers = prompt_all(self.prompter, &questions)?;

        let mut candidate = IosCredentials {
            apple_id: answer(&answers, "appleId"),
            password: answer(&answers, "password"),
            team_id: answer(&answers, "teamId"),
            ..Default::default()
        };

        let result = self
            .service
            .validate_credential(
                self.options.platform,
                CredentialKind::AppleId,
                Some(&candidate),
                &self.metadata,
            )
            .await;

        let outcome = match result {
            Ok(()) => self.persist(&candidate).await.map_err(PublishError::from),
            Err(ServiceError::Classified { message, .. }) => {
                Err(PublishError::AppleIdRejected(message))
            }
            Err(e) => Err(e.into()),
        };
        candidate.zeroize();
        outcome?;

        success!("Apple ID validated");
        Ok(())
    }

    async fn collect_certificate(&mut self, kind: CredentialKind) -> Result<()> {
        let noun = if kind == CredentialKind::PushCertificate {
            "push notification certificate"
        } else {
            "distribution certificate"
        };
        print_step(&format!("iOS {noun}"));

        let questions = [
            Question::select(
                "source",
                format!("How would you like to provide your {noun}?"),
                vec![
                    Choice::new(SOURCE_GENERATE, format!("Let the build service generate a {noun}")),
                    Choice::new(SOURCE_UPLOAD, format!("Upload my own {noun} (.p12)")),
                ],
            ),
            Question::text("path", format!("Path to {noun} (.p12)"))
                .when(is_upload)
                .transform(absolute_path_transform)
                .validate_with(certificate_path_validator),
            Question::masked("password", "Certificate password (leave empty if none)")
                .when(is_upload),
        ];
        let answers = prompt_all(self.prompter, &questions)?;

        if answers.get("source") == Some(SOURCE_UPLOAD) {
            let path = answers.get("path").unwrap_or_default();
            self.upload_certificate(kind, Path::new(path), answer(&answers, "password"))
                .await?;
        } else {
            self.generate_certificate(kind).await?;
        }

        success!("{} ready", capitalize(noun));
        Ok(())
    }

    async fn generate_certificate(&mut self, kind: CredentialKind) -> Result<()> {
        if kind == CredentialKind::PushCertificate {
            // A false validity without a coded error is still a failure
            match self
                .service
                .auto_generate_push_certificate(&self.metadata)
                .await
            {
                Ok(true) => Ok(()),
                Ok(false) => Err(PublishError::CertificateFetch(
                    "the build service did not return a valid push certificate".to_string(),
                )),
                Err(e) => Err(PublishError::CertificateFetch(e.message())),
            }
        } else {
            self.service
                .auto_generate_certificate(&self.metadata)
                .await
                .map_err(|e| PublishError::CertificateFetch(e.message()))
        }
    }

    async fn upload_certificate(
        &mut self,
        kind: CredentialKind,
        path: &Path,
        password: Option<String>,
    ) -> Result<()> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PublishError::CertificateFetch(format!("could not read {}: {e}", path.display()))
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let mut candidate = IosCredentials::default();
        if kind == CredentialKind::PushCertificate {
            candidate.push_p12 = Some(encoded);
            candidate.push_password = password;
        } else {
            candidate.cert_p12 = Some(encoded);
            candidate.cert_password = password;
        }

        let result = self
            .service
            .validate_credential(self.options.platform, kind, Some(&candidate), &self.metadata)
            .await;

        let outcome = match result {
            Ok(()) => self
                .persist(&candidate)
                .await
                .map_err(|e| PublishError::CertificateFetch(e.message())),
            Err(ServiceError::Classified { message, .. }) => {
                if kind == CredentialKind::PushCertificate {
                    Err(PublishError::PushCertificateNotInPortal(message))
                } else {
                    Err(PublishError::CertificateNotInPortal(message))
                }
            }
            Err(e) => Err(PublishError::CertificateFetch(e.to_string())),
        };
        candidate.zeroize();
        outcome
    }

    async fn register_app_id(&mut self) -> Result<()> {
        tracing::debug!(bundle_identifier = %self.metadata.bundle_identifier, "registering app id");
        self.service
            .ensure_app_identifier_registered(&self.metadata)
            .await
            .map_err(|e| PublishError::AppIdRegistration {
                bundle_identifier: self.metadata.bundle_identifier.clone(),
                message: e.message(),
            })?;
        success!("App ID registered for {}", self.metadata.bundle_identifier);
        Ok(())
    }

    /// Merge a validated candidate into the working bundle and store it.
    async fn persist(&mut self, candidate: &IosCredentials) -> std::result::Result<(), ServiceError> {
        self.credentials.merge(candidate);
        self.service
            .update_credential(self.options.platform, &self.credentials, &self.metadata)
            .await
    }
}

impl Drop for CredentialWorkflow<'_> {
    fn drop(&mut self) {
        self.credentials.zeroize();
    }
}

fn is_upload(answers: &Answers) -> bool {
    answers.get("source") == Some(SOURCE_UPLOAD)
}

/// Non-empty answer as an owned value
fn answer(answers: &Answers, name: &str) -> Option<String> {
    answers
        .get(name)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn print_step(title: &str) {
    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let _ = writeln!(&mut buffer, "\n{}", "━".repeat(60));
    let _ = writeln!(&mut buffer, "{title}\n");
    let _ = bufwtr.print(&buffer);
}
