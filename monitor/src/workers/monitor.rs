//! Monitor worker: periodic and forced detection-and-deploy cycles

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::deploy::detector::detect;
use crate::deploy::pipeline::Pipeline;
use crate::deploy::worker::{DeployOutcome, DeployWorker};
use crate::telemetry::MonitorStats;

/// Monitor worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Time between repository checks
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

/// Summary of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub detection_failed: bool,
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_started: usize,
}

/// Run the monitor worker.
///
/// Waits for the interval to elapse or a force request, whichever comes
/// first, then runs a full cycle. Shutdown is checked between cycles only:
/// a running cycle always finishes.
pub async fn run<S, F>(
    options: &Options,
    pipeline: Arc<Pipeline>,
    stats: Arc<MonitorStats>,
    mut force_rx: mpsc::Receiver<()>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Monitor worker starting...");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_signal => {
                info!("Monitor worker shutting down...");
                return;
            }
            Some(()) = force_rx.recv() => {
                info!("Forced repository check");
            }
            _ = sleep_fn(options.interval) => {
                debug!("Polling interval elapsed");
            }
        }

        let report = run_cycle(&pipeline, &stats).await;
        if report.jobs > 0 {
            info!(
                "Cycle complete: {} jobs, {} succeeded, {} failed, {} not started",
                report.jobs, report.succeeded, report.failed, report.not_started
            );
        } else {
            debug!("Cycle complete: nothing to deploy");
        }
    }
}

/// Detect, deploy every job concurrently, and wait for all of them
pub async fn run_cycle(pipeline: &Arc<Pipeline>, stats: &MonitorStats) -> CycleReport {
    stats.record_cycle();
    let mut report = CycleReport::default();

    let jobs = match detect(pipeline).await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("Unable to check repository for new versions: {}", e);
            stats.record_detection_error();
            report.detection_failed = true;
            return report;
        }
    };

    report.jobs = jobs.len();
    stats.record_jobs(jobs.len() as u64);

    let mut workers = JoinSet::new();
    for job in jobs {
        workers.spawn(DeployWorker::new(pipeline.clone(), job).run());
    }

    while let Some(result) = workers.join_next().await {
        match result {
            Ok(DeployOutcome::Succeeded { .. }) => {
                report.succeeded += 1;
                stats.record_outcome(true);
            }
            Ok(DeployOutcome::Failed { .. }) => {
                report.failed += 1;
                stats.record_outcome(false);
            }
            Ok(DeployOutcome::NotStarted { .. }) => {
                report.not_started += 1;
                stats.record_outcome(false);
            }
            Err(e) => {
                warn!("Deploy worker did not finish: {}", e);
                report.failed += 1;
                stats.record_outcome(false);
            }
        }
    }

    report
}
