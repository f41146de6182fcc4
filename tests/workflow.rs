use async_trait::async_trait;
use base64::Engine;
use kodegen_bundler_publish::config::PublishConfig;
use kodegen_bundler_publish::credentials::{
    CredentialKind, CredentialMetadata, IosCredentials, Platform, WorkflowOptions, run_build,
};
use kodegen_bundler_publish::error::{PublishError, Result};
use kodegen_bundler_publish::packager::{Packager, ProcessInfo};
use kodegen_bundler_publish::prompts::ScriptedPrompter;
use kodegen_bundler_publish::service::{
    BuildSubmission, PlatformService, ServiceError, ServiceResult,
};
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Fetch,
    Revalidate(CredentialKind),
    ValidateCandidate(CredentialKind),
    Update,
    GenerateCertificate,
    GeneratePushCertificate,
    RegisterAppId,
    SubmitBuild(Vec<String>),
}

#[derive(Default)]
struct FakeService {
    existing: Option<IosCredentials>,
    invalid_stored: Vec<CredentialKind>,
    rejected_candidates: Vec<CredentialKind>,
    network_down: bool,
    candidate_unreachable: bool,
    certificate_generation_fails: bool,
    push_generation_rejected: bool,
    push_not_valid: bool,
    app_id_taken: bool,
    calls: Mutex<Vec<Call>>,
    candidates: Mutex<Vec<IosCredentials>>,
}

impl FakeService {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn position(&self, call: &Call) -> usize {
        self.calls()
            .iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("{call:?} never happened: {:?}", self.calls()))
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

#[async_trait]
impl PlatformService for FakeService {
    async fn fetch_existing_credentials(
        &self,
        _metadata: &CredentialMetadata,
    ) -> ServiceResult<Option<IosCredentials>> {
        self.record(Call::Fetch);
        Ok(self.existing.clone())
    }

    async fn validate_credential(
        &self,
        _platform: Platform,
        kind: CredentialKind,
        candidate: Option<&IosCredentials>,
        _metadata: &CredentialMetadata,
    ) -> ServiceResult<()> {
        if self.network_down {
            return Err(anyhow::anyhow!("connection reset by peer").into());
        }

        match candidate {
            None => {
                self.record(Call::Revalidate(kind));
                if self.invalid_stored.contains(&kind) {
                    return Err(ServiceError::classified("CREDENTIALS_INVALID", "revoked"));
                }
            }
            Some(candidate) => {
                self.record(Call::ValidateCandidate(kind));
                self.candidates.lock().unwrap().push(candidate.clone());
                if self.candidate_unreachable {
                    return Err(anyhow::anyhow!("upload timed out").into());
                }
                if self.rejected_candidates.contains(&kind) {
                    return Err(ServiceError::classified(
                        "CREDENTIALS_REJECTED",
                        format!("{kind} rejected by Apple"),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn update_credential(
        &self,
        _platform: Platform,
        _bundle: &IosCredentials,
        _metadata: &CredentialMetadata,
    ) -> ServiceResult<()> {
        self.record(Call::Update);
        Ok(())
    }

    async fn auto_generate_certificate(&self, _metadata: &CredentialMetadata) -> ServiceResult<()> {
        self.record(Call::GenerateCertificate);
        if self.certificate_generation_fails {
            return Err(ServiceError::classified(
                "CERT_LIMIT_REACHED",
                "maximum number of distribution certificates reached",
            ));
        }
        Ok(())
    }

    async fn auto_generate_push_certificate(
        &self,
        _metadata: &CredentialMetadata,
    ) -> ServiceResult<bool> {
        self.record(Call::GeneratePushCertificate);
        if self.push_generation_rejected {
            return Err(ServiceError::classified(
                "PUSH_LIMIT_REACHED",
                "too many push certificates",
            ));
        }
        Ok(!self.push_not_valid)
    }

    async fn ensure_app_identifier_registered(
        &self,
        _metadata: &CredentialMetadata,
    ) -> ServiceResult<()> {
        self.record(Call::RegisterAppId);
        if self.app_id_taken {
            return Err(ServiceError::classified(
                "APP_ID_TAKEN",
                "An App ID with this identifier is not available",
            ));
        }
        Ok(())
    }

    async fn submit_build(
        &self,
        experience_ids: &[String],
        _platform: Platform,
    ) -> ServiceResult<BuildSubmission> {
        self.record(Call::SubmitBuild(experience_ids.to_vec()));
        Ok(BuildSubmission {
            id: "build-1".to_string(),
            status_url: None,
        })
    }
}

#[derive(Default)]
struct FakePackager {
    publish_fails: bool,
    published: Mutex<usize>,
}

impl FakePackager {
    fn publish_count(&self) -> usize {
        *self.published.lock().unwrap()
    }
}

#[async_trait]
impl Packager for FakePackager {
    async fn publish_project(&self, _project_dir: &Path) -> Result<Vec<String>> {
        *self.published.lock().unwrap() += 1;
        if self.publish_fails {
            return Err(PublishError::Packager("bundling failed".to_string()));
        }
        Ok(vec!["exp-1".to_string()])
    }

    async fn status(&self, _project_dir: &Path, _all: bool) -> Result<Vec<ProcessInfo>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn project(app_json: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.json"), app_json).unwrap();
    dir
}

fn ios_project() -> TempDir {
    project(r#"{ "name": "Demo", "slug": "demo", "ios": { "bundleIdentifier": "com.example.demo" } }"#)
}

fn config() -> PublishConfig {
    PublishConfig {
        username: Some("jane".to_string()),
        ..Default::default()
    }
}

fn full_bundle() -> IosCredentials {
    IosCredentials {
        apple_id: Some("dev@example.com".to_string()),
        password: Some("app-password".to_string()),
        team_id: Some("ABCDE12345".to_string()),
        cert_p12: Some("Q0VSVA==".to_string()),
        cert_password: Some("cert-pass".to_string()),
        push_p12: Some("UFVTSA==".to_string()),
        push_password: Some("push-pass".to_string()),
    }
}

fn apple_id_only() -> IosCredentials {
    IosCredentials {
        apple_id: Some("dev@example.com".to_string()),
        password: Some("app-password".to_string()),
        team_id: Some("ABCDE12345".to_string()),
        ..Default::default()
    }
}

fn options(clear_credentials: bool) -> WorkflowOptions {
    WorkflowOptions {
        platform: Platform::Ios,
        clear_credentials,
    }
}

async fn build(
    dir: &TempDir,
    service: &FakeService,
    packager: &FakePackager,
    prompter: &mut ScriptedPrompter,
    clear_credentials: bool,
) -> Result<BuildSubmission> {
    run_build(
        dir.path(),
        &config(),
        options(clear_credentials),
        service,
        packager,
        prompter,
    )
    .await
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_bundle_identifier_fails_before_any_prompt() {
    let dir = project(r#"{ "name": "Demo", "slug": "demo" }"#);
    let service = FakeService::default();
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["dev@example.com"]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::MissingConfig(_)));
    assert!(prompter.asked().is_empty());
    assert!(service.calls().is_empty());
    assert_eq!(packager.publish_count(), 0);
}

#[tokio::test]
async fn valid_stored_credentials_need_no_prompts() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let submission = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap();

    assert_eq!(submission.id, "build-1");
    assert!(prompter.asked().is_empty());
    assert_eq!(
        service.calls(),
        vec![
            Call::Fetch,
            Call::Revalidate(CredentialKind::AppleId),
            Call::Revalidate(CredentialKind::DistributionCertificate),
            Call::RegisterAppId,
            Call::Revalidate(CredentialKind::PushCertificate),
            Call::SubmitBuild(vec!["exp-1".to_string()]),
        ]
    );
    assert_eq!(packager.publish_count(), 1);
}

#[tokio::test]
async fn clear_flag_collects_every_kind() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new([
        "new@example.com",
        "new-password",
        "TEAM123456",
        "generate",
        "generate",
    ]);

    build(&dir, &service, &packager, &mut prompter, true)
        .await
        .unwrap();

    let calls = service.calls();
    assert!(!calls.contains(&Call::Fetch));
    assert!(
        !calls.iter().any(|c| matches!(c, Call::Revalidate(_))),
        "clear flag must never revalidate: {calls:?}"
    );
    assert_eq!(
        calls[..5],
        [
            Call::ValidateCandidate(CredentialKind::AppleId),
            Call::Update,
            Call::GenerateCertificate,
            Call::RegisterAppId,
            Call::GeneratePushCertificate,
        ]
    );
    assert_eq!(prompter.asked(), ["appleId", "password", "teamId", "source", "source"]);
    assert_eq!(prompter.remaining(), 0);
}

#[tokio::test]
async fn absent_kinds_are_collected_not_revalidated() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(apple_id_only()),
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["generate", "generate"]);

    build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap();

    assert_eq!(service.count(&Call::Revalidate(CredentialKind::AppleId)), 1);
    assert_eq!(
        service.count(&Call::Revalidate(CredentialKind::DistributionCertificate)),
        0
    );
    assert_eq!(service.count(&Call::Revalidate(CredentialKind::PushCertificate)), 0);
    assert_eq!(service.count(&Call::GenerateCertificate), 1);
    assert_eq!(service.count(&Call::GeneratePushCertificate), 1);
}

#[tokio::test]
async fn invalid_apple_id_stops_before_certificates() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        invalid_stored: vec![CredentialKind::AppleId],
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::InvalidStoredCredentials {
            kind: CredentialKind::AppleId
        }
    ));
    assert!(err.to_string().contains("--clear-credentials"));
    assert_eq!(
        service.calls(),
        vec![Call::Fetch, Call::Revalidate(CredentialKind::AppleId)]
    );
    assert!(prompter.asked().is_empty());
    assert_eq!(packager.publish_count(), 0);
}

#[tokio::test]
async fn invalid_stored_push_certificate_is_not_retried() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        invalid_stored: vec![CredentialKind::PushCertificate],
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::InvalidStoredCredentials {
            kind: CredentialKind::PushCertificate
        }
    ));
    assert_eq!(service.count(&Call::Revalidate(CredentialKind::PushCertificate)), 1);
    assert_eq!(service.count(&Call::GeneratePushCertificate), 0);
}

#[tokio::test]
async fn bad_certificate_path_is_reprompted_before_upload() {
    let dir = ios_project();
    let cert_path = dir.path().join("dist.p12");
    let cert_bytes = [0x30u8, 0x82, 0x0a, 0x01, 0x02];
    std::fs::write(&cert_path, cert_bytes).unwrap();
    let missing = dir.path().join("missing.p12");

    let service = FakeService {
        existing: Some(apple_id_only()),
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new([
        "upload".to_string(),
        missing.display().to_string(),
        cert_path.display().to_string(),
        "p12-pass".to_string(),
        "generate".to_string(),
    ]);

    build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap();

    assert_eq!(prompter.rejected(), ["path"]);
    assert_eq!(
        prompter.asked(),
        ["source", "path", "path", "password", "source"]
    );

    // The only certificate sent is the one read from the accepted path
    assert_eq!(
        service.count(&Call::ValidateCandidate(CredentialKind::DistributionCertificate)),
        1
    );
    let candidates = service.candidates.lock().unwrap();
    assert_eq!(candidates.len(), 1);
    let expected = base64::engine::general_purpose::STANDARD.encode(cert_bytes);
    assert_eq!(candidates[0].cert_p12.as_deref(), Some(expected.as_str()));
    assert_eq!(candidates[0].cert_password.as_deref(), Some("p12-pass"));
    drop(candidates);

    let validated = service.position(&Call::ValidateCandidate(
        CredentialKind::DistributionCertificate,
    ));
    assert!(validated < service.position(&Call::RegisterAppId));
    assert_eq!(service.calls()[validated + 1], Call::Update);
}

#[tokio::test]
async fn uploaded_certificate_not_in_portal() {
    let dir = ios_project();
    let cert_path = dir.path().join("dist.p12");
    std::fs::write(&cert_path, [0x30u8, 0x82]).unwrap();

    let service = FakeService {
        existing: Some(apple_id_only()),
        rejected_candidates: vec![CredentialKind::DistributionCertificate],
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new([
        "upload".to_string(),
        cert_path.display().to_string(),
        String::new(),
    ]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::CertificateNotInPortal(_)));
    assert_eq!(service.count(&Call::Update), 0);
    assert_eq!(service.count(&Call::RegisterAppId), 0);
}

#[tokio::test]
async fn push_certificate_upload_not_in_portal() {
    let dir = ios_project();
    let push_path = dir.path().join("push.p12");
    std::fs::write(&push_path, [0x30u8, 0x82]).unwrap();

    let service = FakeService {
        existing: Some(apple_id_only()),
        rejected_candidates: vec![CredentialKind::PushCertificate],
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new([
        "generate".to_string(),
        "upload".to_string(),
        push_path.display().to_string(),
        String::new(),
    ]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::PushCertificateNotInPortal(_)));
    let candidates = service.candidates.lock().unwrap();
    assert!(candidates[0].push_p12.is_some());
    assert_eq!(candidates[0].push_password, None);
}

#[tokio::test]
async fn rejected_apple_id_reports_service_message() {
    let dir = ios_project();
    let service = FakeService {
        rejected_candidates: vec![CredentialKind::AppleId],
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["dev@example.com", "wrong", "ABCDE12345"]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    match err {
        PublishError::AppleIdRejected(message) => {
            assert_eq!(message, "Apple ID rejected by Apple");
        }
        other => panic!("expected AppleIdRejected, got {other:?}"),
    }
    assert_eq!(service.count(&Call::Update), 0);
}

#[tokio::test]
async fn unclassified_failure_propagates_unchanged() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        network_down: true,
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::Service(ServiceError::Unclassified(_))
    ));
    assert_eq!(err.to_string(), "connection reset by peer");
}

#[tokio::test]
async fn push_certificate_without_validity_is_fatal() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(apple_id_only()),
        push_not_valid: true,
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["generate", "generate"]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::CertificateFetch(_)));
    assert!(
        err.to_string()
            .starts_with("Failed fetching/uploading certificates")
    );
    assert_eq!(packager.publish_count(), 0);
    assert!(
        !service
            .calls()
            .iter()
            .any(|c| matches!(c, Call::SubmitBuild(_)))
    );
}

#[tokio::test]
async fn app_id_registered_once_between_certificate_and_push() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(apple_id_only()),
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["generate", "generate"]);

    build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap();

    assert_eq!(service.count(&Call::RegisterAppId), 1);
    let certificate = service.position(&Call::GenerateCertificate);
    let app_id = service.position(&Call::RegisterAppId);
    let push = service.position(&Call::GeneratePushCertificate);
    let submitted = service.position(&Call::SubmitBuild(vec!["exp-1".to_string()]));
    assert!(certificate < app_id);
    assert!(app_id < push);
    assert!(push < submitted);
}

#[tokio::test]
async fn app_id_failure_asks_for_new_bundle_identifier() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        app_id_taken: true,
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    match &err {
        PublishError::AppIdRegistration {
            bundle_identifier, ..
        } => assert_eq!(bundle_identifier, "com.example.demo"),
        other => panic!("expected AppIdRegistration, got {other:?}"),
    }
    assert!(err.to_string().contains("Change the bundle identifier"));
    assert_eq!(service.count(&Call::Revalidate(CredentialKind::PushCertificate)), 0);
}

#[tokio::test]
async fn failed_certificate_generation_stops_before_app_id() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(apple_id_only()),
        certificate_generation_fails: true,
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["generate", "generate"]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::CertificateFetch(_)));
    assert_eq!(
        err.to_string(),
        "Failed fetching/uploading certificates: maximum number of distribution certificates reached"
    );
    assert_eq!(service.count(&Call::GenerateCertificate), 1);
    assert_eq!(service.count(&Call::RegisterAppId), 0);
    assert_eq!(service.count(&Call::GeneratePushCertificate), 0);
    assert_eq!(packager.publish_count(), 0);
}

#[tokio::test]
async fn rejected_push_generation_is_a_fetch_failure() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(apple_id_only()),
        push_generation_rejected: true,
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new(["generate", "generate"]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    // Only uploads are reported as missing from the portal
    assert!(matches!(err, PublishError::CertificateFetch(_)));
    assert_eq!(
        err.to_string(),
        "Failed fetching/uploading certificates: too many push certificates"
    );
    assert_eq!(service.count(&Call::RegisterAppId), 1);
    assert_eq!(packager.publish_count(), 0);
    assert!(
        !service
            .calls()
            .iter()
            .any(|c| matches!(c, Call::SubmitBuild(_)))
    );
}

#[tokio::test]
async fn unreachable_service_during_upload_is_a_fetch_failure() {
    let dir = ios_project();
    let cert_path = dir.path().join("dist.p12");
    std::fs::write(&cert_path, [0x30u8, 0x82]).unwrap();

    let service = FakeService {
        existing: Some(apple_id_only()),
        candidate_unreachable: true,
        ..Default::default()
    };
    let packager = FakePackager::default();
    let mut prompter = ScriptedPrompter::new([
        "upload".to_string(),
        cert_path.display().to_string(),
        String::new(),
    ]);

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::CertificateFetch(_)));
    assert_eq!(
        err.to_string(),
        "Failed fetching/uploading certificates: upload timed out"
    );
    assert_eq!(
        service.count(&Call::ValidateCandidate(CredentialKind::DistributionCertificate)),
        1
    );
    assert_eq!(service.count(&Call::Update), 0);
    assert_eq!(service.count(&Call::RegisterAppId), 0);
}

#[tokio::test]
async fn publish_failure_never_submits_a_build() {
    let dir = ios_project();
    let service = FakeService {
        existing: Some(full_bundle()),
        ..Default::default()
    };
    let packager = FakePackager {
        publish_fails: true,
        ..Default::default()
    };
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let err = build(&dir, &service, &packager, &mut prompter, false)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Packager(_)));
    assert_eq!(packager.publish_count(), 1);
    assert_eq!(service.count(&Call::RegisterAppId), 1);
    assert!(
        !service
            .calls()
            .iter()
            .any(|c| matches!(c, Call::SubmitBuild(_)))
    );
}
