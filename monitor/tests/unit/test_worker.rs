//! Deploy worker integration tests

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use artmon::deploy::extract::{Extractor, TarExtractor};
use artmon::deploy::pipeline::Pipeline;
use artmon::deploy::worker::{DeployOutcome, DeployWorker};
use artmon::errors::MonitorError;
use artmon::ledger::{DeployRecord, DeployStatus, Ledger, SqlLedger};
use artmon::models::deployment::DeployJob;

use common::{
    key, standard_files, tarball, BrokenLedger, FakeDeployService, FakeExtractor, FakeRepository,
};

struct Harness {
    ledger: Arc<SqlLedger>,
    service: Arc<FakeDeployService>,
    repository: Arc<FakeRepository>,
    pipeline: Arc<Pipeline>,
    tmp: tempfile::TempDir,
}

impl Harness {
    async fn new(
        repository: FakeRepository,
        service: FakeDeployService,
        extractor: impl Extractor + 'static,
    ) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = common::memory_ledger().await;
        let service = Arc::new(service);
        let repository = Arc::new(repository);
        let pipeline = common::pipeline(
            ledger.clone(),
            repository.clone(),
            service.clone(),
            Arc::new(extractor),
            tmp.path(),
        );
        Self {
            ledger,
            service,
            repository,
            pipeline,
            tmp,
        }
    }

    async fn standard(service: FakeDeployService) -> Self {
        Self::new(
            FakeRepository::new().with_archive("video", "1.0.1"),
            service,
            FakeExtractor::with_files(standard_files()),
        )
        .await
    }

    async fn run(&self) -> DeployOutcome {
        DeployWorker::new(self.pipeline.clone(), DeployJob::new("video", "1.0.1"))
            .run()
            .await
    }

    async fn record(&self) -> DeployRecord {
        self.ledger
            .query_last_deploy(&key("video"))
            .await
            .unwrap()
            .expect("worker must leave a ledger record")
    }

    fn workspace_is_clean(&self) -> bool {
        !self.tmp.path().join("video").exists()
    }
}

#[tokio::test]
async fn test_successful_deploy() {
    let harness = Harness::standard(FakeDeployService::new(
        "deploy-1",
        &[DeployStatus::Started, DeployStatus::Started, DeployStatus::Success],
    ))
    .await;

    let outcome = harness.run().await;
    assert!(matches!(&outcome, DeployOutcome::Succeeded { deploy_id } if deploy_id == "deploy-1"));
    assert!(outcome.is_success());

    let record = harness.record().await;
    assert_eq!(record.status, DeployStatus::Success);
    assert_eq!(record.deploy_id, "deploy-1");
    assert_eq!(record.version, "1.0.1");
    assert_eq!(harness.service.status_checks(), 3);

    assert_eq!(
        harness.repository.fetched(),
        vec!["payloads/video/foo.com-development-video-1.0.1.tar.gz".to_string()]
    );
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_submission_carries_manifest_and_encoded_files() {
    let harness =
        Harness::standard(FakeDeployService::new("deploy-1", &[DeployStatus::Success])).await;
    harness.run().await;

    let submitted = harness.service.submitted();
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.name, "video");
    assert_eq!(request.image_version, "1.0.1-23");
    assert_eq!(request.num_instances, 2);
    assert_eq!(
        STANDARD.decode(&request.service_template).unwrap(),
        b"[Unit]\nDescription=video"
    );
    assert_eq!(
        STANDARD.decode(request.etcd2_keys.as_ref().unwrap()).unwrap(),
        b"/video/config value"
    );
}

#[tokio::test]
async fn test_secondary_config_is_optional() {
    let files = standard_files()
        .into_iter()
        .filter(|(name, _)| !name.ends_with(".etcd2"))
        .collect();
    let harness = Harness::new(
        FakeRepository::new().with_archive("video", "1.0.1"),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        FakeExtractor::with_files(files),
    )
    .await;

    assert!(harness.run().await.is_success());
    assert!(harness.service.submitted()[0].etcd2_keys.is_none());
}

#[tokio::test]
async fn test_polling_timeout_records_failure() {
    let harness = Harness::standard(FakeDeployService::new("deploy-2", &[DeployStatus::Started])).await;

    let outcome = harness.run().await;
    match outcome {
        DeployOutcome::Failed { deploy_id, error } => {
            assert_eq!(deploy_id.as_deref(), Some("deploy-2"));
            assert!(matches!(error, MonitorError::Timeout(_)));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(harness.service.status_checks(), 6);
    let record = harness.record().await;
    assert_eq!(record.status, DeployStatus::Failed);
    assert_eq!(record.deploy_id, "deploy-2");
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_remote_failure_is_a_rejection() {
    let harness = Harness::standard(FakeDeployService::new(
        "deploy-3",
        &[DeployStatus::Started, DeployStatus::Failed],
    ))
    .await;

    let outcome = harness.run().await;
    assert!(matches!(
        outcome,
        DeployOutcome::Failed { error: MonitorError::DeployRejected(_), .. }
    ));
    assert_eq!(harness.service.status_checks(), 2);
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
}

#[tokio::test]
async fn test_missing_manifest_fails_before_submission() {
    let files = standard_files()
        .into_iter()
        .filter(|(name, _)| !name.ends_with(".json"))
        .collect();
    let harness = Harness::new(
        FakeRepository::new().with_archive("video", "1.0.1"),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        FakeExtractor::with_files(files),
    )
    .await;

    let outcome = harness.run().await;
    assert!(matches!(
        outcome,
        DeployOutcome::Failed { deploy_id: None, error: MonitorError::MissingFile(_) }
    ));
    assert!(harness.service.submitted().is_empty());

    let record = harness.record().await;
    assert_eq!(record.status, DeployStatus::Failed);
    assert_eq!(record.deploy_id, "");
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_missing_service_file_fails() {
    let files = standard_files()
        .into_iter()
        .filter(|(name, _)| !name.ends_with(".service"))
        .collect();
    let harness = Harness::new(
        FakeRepository::new().with_archive("video", "1.0.1"),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        FakeExtractor::with_files(files),
    )
    .await;

    assert!(matches!(
        harness.run().await,
        DeployOutcome::Failed { error: MonitorError::MissingFile(_), .. }
    ));
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
}

#[tokio::test]
async fn test_malformed_manifest_fails() {
    let files = vec![
        ("video.json".to_string(), "{not json".to_string()),
        ("video.service".to_string(), "[Unit]".to_string()),
    ];
    let harness = Harness::new(
        FakeRepository::new().with_archive("video", "1.0.1"),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        FakeExtractor::with_files(files),
    )
    .await;

    assert!(matches!(
        harness.run().await,
        DeployOutcome::Failed { error: MonitorError::ManifestError(_), .. }
    ));
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_download_failure() {
    let harness = Harness::new(
        FakeRepository::new(),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        FakeExtractor::with_files(standard_files()),
    )
    .await;

    assert!(matches!(
        harness.run().await,
        DeployOutcome::Failed { error: MonitorError::HttpStatus { status: 404, .. }, .. }
    ));
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_extraction_failure() {
    let harness = Harness::new(
        FakeRepository::new().with_archive("video", "1.0.1"),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        FakeExtractor::failing(),
    )
    .await;

    assert!(matches!(
        harness.run().await,
        DeployOutcome::Failed { error: MonitorError::ArchiveError(_), .. }
    ));
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_submission_failure() {
    let harness = Harness::standard(FakeDeployService::rejecting_submissions()).await;

    assert!(matches!(
        harness.run().await,
        DeployOutcome::Failed { deploy_id: None, .. }
    ));
    assert_eq!(harness.service.status_checks(), 0);
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
}

#[tokio::test]
async fn test_leftover_workspace_is_replaced() {
    let harness =
        Harness::standard(FakeDeployService::new("deploy-1", &[DeployStatus::Success])).await;
    let stale = harness.tmp.path().join("video").join("stale.json");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, "{}").unwrap();

    assert!(harness.run().await.is_success());
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_unrecorded_start_aborts_the_job() {
    let tmp = tempfile::tempdir().unwrap();
    let ledger = Arc::new(BrokenLedger::new());
    let repository = Arc::new(FakeRepository::new().with_archive("video", "1.0.1"));
    let service = Arc::new(FakeDeployService::new("deploy-1", &[DeployStatus::Success]));
    let pipeline = common::pipeline(
        ledger.clone(),
        repository.clone(),
        service.clone(),
        Arc::new(FakeExtractor::with_files(standard_files())),
        tmp.path(),
    );

    let outcome = DeployWorker::new(pipeline, DeployJob::new("video", "1.0.1"))
        .run()
        .await;

    assert!(matches!(outcome, DeployOutcome::NotStarted { .. }));
    assert!(repository.fetched().is_empty());
    assert!(service.submitted().is_empty());
    assert_eq!(ledger.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_deploy_from_real_tarball() {
    let archive = tarball("video", "1.0.1", &standard_files());
    let harness = Harness::new(
        FakeRepository::new().with_archive_bytes("video", "1.0.1", archive),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        TarExtractor,
    )
    .await;

    let outcome = harness.run().await;
    assert!(matches!(&outcome, DeployOutcome::Succeeded { deploy_id } if deploy_id == "deploy-1"));

    let submitted = harness.service.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].name, "video");
    assert_eq!(submitted[0].num_instances, 2);
    assert_eq!(
        submitted[0].service_template,
        STANDARD.encode("[Unit]\nDescription=video")
    );
    assert_eq!(harness.record().await.status, DeployStatus::Success);
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_corrupt_tarball_fails_the_deploy() {
    let harness = Harness::new(
        FakeRepository::new().with_archive_bytes("video", "1.0.1", b"not a tarball".to_vec()),
        FakeDeployService::new("deploy-1", &[DeployStatus::Success]),
        TarExtractor,
    )
    .await;

    assert!(matches!(
        harness.run().await,
        DeployOutcome::Failed { error: MonitorError::ArchiveError(_), deploy_id: None }
    ));
    assert!(harness.service.submitted().is_empty());
    assert_eq!(harness.record().await.status, DeployStatus::Failed);
    assert!(harness.workspace_is_clean());
}

#[tokio::test]
async fn test_application_name_cannot_escape_staging_root() {
    let outer = tempfile::tempdir().unwrap();
    let staging = outer.path().join("staging");
    let sentinel = outer.path().join("sentinel.txt");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(&sentinel, "keep me").unwrap();

    let ledger = common::memory_ledger().await;
    let service = Arc::new(FakeDeployService::new("deploy-1", &[DeployStatus::Success]));
    let pipeline = common::pipeline(
        ledger.clone(),
        Arc::new(FakeRepository::new().with_archive("..", "1.0.0")),
        service.clone(),
        Arc::new(FakeExtractor::with_files(standard_files())),
        &staging,
    );

    for name in ["..", ".", "nested/app"] {
        let outcome = DeployWorker::new(pipeline.clone(), DeployJob::new(name, "1.0.0"))
            .run()
            .await;
        assert!(
            matches!(outcome, DeployOutcome::Failed { error: MonitorError::ArchiveError(_), .. }),
            "{} must be refused",
            name
        );
        let record = ledger.query_last_deploy(&key(name)).await.unwrap().unwrap();
        assert_eq!(record.status, DeployStatus::Failed);
    }

    assert!(sentinel.exists());
    assert!(staging.exists());
    assert!(service.submitted().is_empty());
}
