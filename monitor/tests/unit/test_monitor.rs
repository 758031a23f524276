//! Monitor worker integration tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use artmon::deploy::pipeline::Pipeline;
use artmon::ledger::{DeployStatus, Ledger, SqlLedger};
use artmon::telemetry::MonitorStats;
use artmon::workers::monitor::{self, run_cycle, CycleReport};

use common::{key, standard_files, FakeDeployService, FakeExtractor, FakeRepository, ListingFailure};

async fn setup(repository: FakeRepository, tmp: &tempfile::TempDir) -> (Arc<SqlLedger>, Arc<Pipeline>) {
    let ledger = common::memory_ledger().await;
    let pipeline = common::pipeline(
        ledger.clone(),
        Arc::new(repository),
        Arc::new(FakeDeployService::new("deploy-1", &[DeployStatus::Success])),
        Arc::new(FakeExtractor::with_files(standard_files())),
        tmp.path(),
    );
    (ledger, pipeline)
}

async fn wait_for_cycles(stats: &MonitorStats, cycles: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.cycles() < cycles {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("monitor did not run the expected cycles");
}

#[tokio::test]
async fn test_cycle_deploys_and_then_settles() {
    let tmp = tempfile::tempdir().unwrap();
    let repository = FakeRepository::new()
        .with_app("video", &["1.0.0.deploy", "1.0.1.deploy"])
        .with_archive("video", "1.0.1");
    let (ledger, pipeline) = setup(repository, &tmp).await;
    let stats = MonitorStats::new();

    let report = run_cycle(&pipeline, &stats).await;
    assert_eq!(
        report,
        CycleReport {
            detection_failed: false,
            jobs: 1,
            succeeded: 1,
            failed: 0,
            not_started: 0,
        }
    );
    let record = ledger.query_last_deploy(&key("video")).await.unwrap().unwrap();
    assert_eq!(record.status, DeployStatus::Success);

    // Nothing new in the repository
    let report = run_cycle(&pipeline, &stats).await;
    assert_eq!(report.jobs, 0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.cycles, 2);
    assert_eq!(snapshot.jobs_dispatched, 1);
    assert_eq!(snapshot.deploys_succeeded, 1);
}

#[tokio::test]
async fn test_cycle_waits_for_every_worker() {
    let tmp = tempfile::tempdir().unwrap();
    // Only video has a payload; audio fails to download
    let repository = FakeRepository::new()
        .with_app("video", &["1.0.1.deploy"])
        .with_app("audio", &["2.0.0.deploy"])
        .with_archive("video", "1.0.1");
    let (ledger, pipeline) = setup(repository, &tmp).await;
    let stats = MonitorStats::new();

    let report = run_cycle(&pipeline, &stats).await;
    assert_eq!(report.jobs, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    // Every worker has written its final state by the time the cycle returns
    let audio = ledger.query_last_deploy(&key("audio")).await.unwrap().unwrap();
    assert_eq!(audio.status, DeployStatus::Failed);
    let video = ledger.query_last_deploy(&key("video")).await.unwrap().unwrap();
    assert_eq!(video.status, DeployStatus::Success);
}

#[tokio::test]
async fn test_detection_error_counts_as_no_jobs() {
    let tmp = tempfile::tempdir().unwrap();
    let mut repository = FakeRepository::new().with_app("video", &["1.0.1.deploy"]);
    repository.top_level_failure = Some(ListingFailure::Unreachable);
    let (_ledger, pipeline) = setup(repository, &tmp).await;
    let stats = MonitorStats::new();

    let report = run_cycle(&pipeline, &stats).await;
    assert!(report.detection_failed);
    assert_eq!(report.jobs, 0);
    assert_eq!(stats.snapshot().detection_errors, 1);
}

#[tokio::test]
async fn test_force_triggers_a_cycle_and_shutdown_stops_the_loop() {
    let tmp = tempfile::tempdir().unwrap();
    let (_ledger, pipeline) = setup(FakeRepository::new(), &tmp).await;
    let stats = Arc::new(MonitorStats::new());
    let (force_tx, force_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let options = monitor::Options {
        interval: Duration::from_secs(3600),
    };
    let worker_stats = stats.clone();
    let handle = tokio::spawn(async move {
        monitor::run(
            &options,
            pipeline,
            worker_stats,
            force_rx,
            // The timer never fires on its own
            |_| std::future::pending::<()>(),
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });

    force_tx.send(()).await.unwrap();
    wait_for_cycles(&stats, 1).await;

    force_tx.send(()).await.unwrap();
    wait_for_cycles(&stats, 2).await;

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
    assert_eq!(stats.cycles(), 2);
}

#[tokio::test]
async fn test_timer_triggers_cycles() {
    let tmp = tempfile::tempdir().unwrap();
    let (_ledger, pipeline) = setup(FakeRepository::new(), &tmp).await;
    let stats = Arc::new(MonitorStats::new());
    let (_force_tx, force_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let options = monitor::Options {
        interval: Duration::from_millis(5),
    };
    let worker_stats = stats.clone();
    let handle = tokio::spawn(async move {
        monitor::run(
            &options,
            pipeline,
            worker_stats,
            force_rx,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });

    wait_for_cycles(&stats, 3).await;
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_before_any_trigger() {
    let tmp = tempfile::tempdir().unwrap();
    let (_ledger, pipeline) = setup(FakeRepository::new(), &tmp).await;
    let stats = Arc::new(MonitorStats::new());
    let (_force_tx, force_rx) = mpsc::channel(1);

    let options = monitor::Options::default();
    monitor::run(
        &options,
        pipeline,
        stats.clone(),
        force_rx,
        tokio::time::sleep,
        Box::pin(async {}),
    )
    .await;

    assert_eq!(stats.cycles(), 0);
}
