//! Deploy worker: one application's pipeline from archive to recorded outcome

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use openapi_client::models::DeployRequest;
use tracing::{debug, error, info, warn};

use crate::deploy::files::DeployFiles;
use crate::deploy::pipeline::{Pipeline, StatusPolling};
use crate::errors::MonitorError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::http::deployments::DeployService;
use crate::ledger::{DeployKey, DeployStatus};
use crate::models::deployment::{DeployJob, ServiceMetadata};
use crate::storage::layout::{ArchiveName, StorageLayout};

/// How a worker finished
#[derive(Debug)]
pub enum DeployOutcome {
    /// The deploy service reported success and the ledger says so
    Succeeded { deploy_id: String },

    /// The job failed at some step and the ledger was moved to `Failed`
    Failed {
        deploy_id: Option<String>,
        error: MonitorError,
    },

    /// The start of the job could not be recorded, nothing was attempted
    NotStarted { error: MonitorError },
}

impl DeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeployOutcome::Succeeded { .. })
    }
}

/// Runs a single deploy job
pub struct DeployWorker {
    pipeline: Arc<Pipeline>,
    job: DeployJob,
}

impl DeployWorker {
    pub fn new(pipeline: Arc<Pipeline>, job: DeployJob) -> Self {
        Self { pipeline, job }
    }

    pub fn job(&self) -> &DeployJob {
        &self.job
    }

    /// Run the job to completion.
    ///
    /// Once the start is recorded, exactly one terminal status is written
    /// before returning. The working directory is gone by then.
    pub async fn run(self) -> DeployOutcome {
        let key = self.pipeline.key(&self.job.name);
        info!("Deploying {} {}", key, self.job.version);

        if let Err(e) = self
            .pipeline
            .ledger
            .upsert_started(&key, &self.job.version)
            .await
        {
            error!("Unable to record start of {} {}: {}", key, self.job.version, e);
            return DeployOutcome::NotStarted { error: e };
        }

        let mut deploy_id = None;
        let result = self.execute(&mut deploy_id).await;
        match result {
            Ok(id) => match self.record(&key, &id, DeployStatus::Success).await {
                Ok(()) => {
                    info!("Deploy {} {} succeeded ({})", key, self.job.version, id);
                    DeployOutcome::Succeeded { deploy_id: id }
                }
                Err(e) => {
                    // Never leave the record in Started
                    let _ = self.record(&key, &id, DeployStatus::Failed).await;
                    DeployOutcome::Failed {
                        deploy_id: Some(id),
                        error: e,
                    }
                }
            },
            Err(e) => {
                error!("Deploy {} {} failed: {}", key, self.job.version, e);
                let id = deploy_id.clone().unwrap_or_default();
                let _ = self.record(&key, &id, DeployStatus::Failed).await;
                DeployOutcome::Failed {
                    deploy_id,
                    error: e,
                }
            }
        }
    }

    async fn record(
        &self,
        key: &DeployKey,
        deploy_id: &str,
        status: DeployStatus,
    ) -> Result<(), MonitorError> {
        let result = self
            .pipeline
            .ledger
            .update_status(key, deploy_id, status)
            .await;
        if let Err(e) = &result {
            error!("Unable to record {} for {}: {}", status, key, e);
        }
        result
    }

    /// Every step between the recorded start and the final status
    async fn execute(&self, deploy_id: &mut Option<String>) -> Result<String, MonitorError> {
        let workspace = Workspace::stage(&self.pipeline.layout, &self.job.name).await?;
        let result = self.deploy_from(&workspace, deploy_id).await;
        workspace.remove().await;
        result
    }

    async fn deploy_from(
        &self,
        workspace: &Workspace,
        deploy_id: &mut Option<String>,
    ) -> Result<String, MonitorError> {
        let pipeline = &self.pipeline;
        let job = &self.job;
        let archive = ArchiveName::new(&pipeline.domain, &pipeline.environment, &job.name, &job.version);

        let archive_file = pipeline.layout.archive_file(&job.name, &archive)?;
        self.download(&archive, &archive_file).await?;
        pipeline
            .extractor
            .extract(archive_file.path(), workspace.dir().path())
            .await?;

        let extract_dir = pipeline.layout.extract_dir(&job.name, &archive)?;
        let files = DeployFiles::discover(&extract_dir).await?;
        let (manifest, template) = files.require(&archive.file_name())?;
        let metadata = ServiceMetadata::load(manifest, template, &files).await?;
        debug!(
            "Manifest for {}: {} {} ({} instances)",
            job.name, metadata.name, metadata.image_version, metadata.num_instances
        );

        let request = build_request(&metadata).await?;
        let id = pipeline.deploy_service.submit(&request).await?;
        *deploy_id = Some(id.clone());
        info!("Deploy of {} {} submitted as {}", job.name, job.version, id);

        await_completion(pipeline.deploy_service.as_ref(), &id, pipeline.status_polling).await?;
        Ok(id)
    }

    async fn download(&self, archive: &ArchiveName, dest: &File) -> Result<(), MonitorError> {
        let path = format!(
            "{}/{}/{}",
            self.pipeline.payload_repo,
            self.job.name,
            archive.file_name()
        );
        debug!("Downloading {}", path);

        let bytes = self.pipeline.repository.fetch_archive(&path).await?;
        dest.write_bytes(&bytes).await.map_err(|e| {
            MonitorError::ArchiveError(format!("Cannot write file {}: {}", dest.path().display(), e))
        })
    }
}

/// Assemble the submission from a parsed manifest and its template files
pub async fn build_request(metadata: &ServiceMetadata) -> Result<DeployRequest, MonitorError> {
    let template = File::new(&metadata.template_path).read_bytes().await?;
    let etcd2_keys = match &metadata.etcd2_path {
        Some(path) => Some(STANDARD.encode(File::new(path).read_bytes().await?)),
        None => None,
    };

    Ok(DeployRequest {
        name: metadata.name.clone(),
        version: metadata.version.clone(),
        image_version: metadata.image_version.clone(),
        num_instances: metadata.num_instances,
        service_template: STANDARD.encode(template),
        etcd2_keys,
    })
}

/// Wait for a submitted deploy to leave `Started`.
///
/// Each check is preceded by a pause. Still `Started` after the last check
/// is a timeout; an explicit `Failed` is a rejection.
pub async fn await_completion(
    service: &dyn DeployService,
    deploy_id: &str,
    polling: StatusPolling,
) -> Result<(), MonitorError> {
    let mut status = DeployStatus::Started;

    for attempt in 1..=polling.attempts {
        tokio::time::sleep(polling.interval).await;
        status = service.status(deploy_id).await?;
        debug!("Deploy {} status {} (check {}/{})", deploy_id, status, attempt, polling.attempts);
        if status != DeployStatus::Started {
            break;
        }
    }

    match status {
        DeployStatus::Success => Ok(()),
        DeployStatus::Failed => Err(MonitorError::DeployRejected(format!(
            "Deploy failed for deployID {}",
            deploy_id
        ))),
        DeployStatus::Started => Err(MonitorError::Timeout(format!(
            "Deploy still running after polling period expired for deployID {}",
            deploy_id
        ))),
    }
}

/// Per-application working directory.
///
/// `remove` cleans it up at the end of a job. Dropping a workspace that was
/// never removed deletes it synchronously.
struct Workspace {
    dir: Dir,
    removed: bool,
}

impl Workspace {
    /// Clear anything a crashed run left behind and create a fresh directory
    async fn stage(layout: &StorageLayout, app: &str) -> Result<Self, MonitorError> {
        let dir = layout.app_dir(app)?;
        reset_dir(&dir).await.map_err(|e| {
            MonitorError::ArchiveError(format!(
                "Cannot make temp path {}: {}",
                dir.path().display(),
                e
            ))
        })?;
        Ok(Self { dir, removed: false })
    }

    fn dir(&self) -> &Dir {
        &self.dir
    }

    async fn remove(mut self) {
        if let Err(e) = self.dir.delete().await {
            warn!("Unable to remove {}: {}", self.dir.path().display(), e);
            return;
        }
        self.removed = true;
    }
}

async fn reset_dir(dir: &Dir) -> Result<(), MonitorError> {
    dir.delete().await?;
    dir.create().await
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = self.dir.delete_blocking() {
            warn!("Unable to remove {}: {}", self.dir.path().display(), e);
        }
    }
}
