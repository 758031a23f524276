//! Application state management

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::extract::TarExtractor;
use crate::deploy::pipeline::Pipeline;
use crate::errors::MonitorError;
use crate::http::artifactory::ArtifactoryClient;
use crate::http::deployments::DeployServiceClient;
use crate::ledger::SqlLedger;
use crate::telemetry::MonitorStats;

/// Main application state
pub struct AppState {
    /// Deploy ledger, closed last on shutdown
    pub ledger: Arc<SqlLedger>,

    /// Collaborators shared by every cycle
    pub pipeline: Arc<Pipeline>,

    /// Counters reported over HTTP
    pub stats: Arc<MonitorStats>,
}

impl AppState {
    /// Connect the ledger and build the repository and deploy service clients
    pub async fn init(options: &AppOptions) -> Result<Self, MonitorError> {
        let ledger = Arc::new(SqlLedger::connect(options.dsn.expose_secret()).await?);

        let repository = ArtifactoryClient::new(
            &options.repository.api_endpoint,
            &options.repository.raw_endpoint,
            &options.repository.user,
            copy_secret(&options.repository.password),
        )?;
        let deploy_service = DeployServiceClient::new(
            &options.deploy_service.url,
            copy_secret(&options.deploy_service.token),
        )?;

        let settings = &options.pipeline;
        settings.layout.setup().await?;
        info!("Staging deploys under {}", settings.layout.tmp_dir.display());

        let pipeline = Pipeline {
            ledger: ledger.clone(),
            repository: Arc::new(repository),
            deploy_service: Arc::new(deploy_service),
            extractor: Arc::new(TarExtractor),
            layout: settings.layout.clone(),
            domain: settings.domain.clone(),
            environment: settings.environment.clone(),
            deploy_repo: settings.deploy_repo.clone(),
            payload_repo: settings.payload_repo.clone(),
            status_polling: settings.status_polling,
        };

        Ok(Self {
            ledger,
            pipeline: Arc::new(pipeline),
            stats: Arc::new(MonitorStats::new()),
        })
    }

    /// Release shared resources. Every writer must be stopped first.
    pub async fn shutdown(&self) {
        self.ledger.close().await;
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}
