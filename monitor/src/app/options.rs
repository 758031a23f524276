//! Application configuration options

use std::time::Duration;

use openapi_server::models::OptionsInfo;
use secrecy::SecretString;

use crate::deploy::pipeline::StatusPolling;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::monitor;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Monitor worker options
    pub monitor: monitor::Options,

    /// Ledger connection
    pub dsn: SecretString,

    /// Artifact repository access
    pub repository: RepositoryOptions,

    /// Deploy service access
    pub deploy_service: DeployServiceOptions,

    /// What and where to deploy
    pub pipeline: PipelineOptions,

    /// Configuration reported over HTTP
    pub info: OptionsInfo,
}

impl From<Settings> for AppOptions {
    fn from(settings: Settings) -> Self {
        let info = OptionsInfo {
            name: settings.name.clone(),
            host_name: settings.hostname.clone(),
            domain: settings.domain.clone(),
            environment: settings.environment.clone(),
            deploy_url: settings.deploy_url.clone(),
            art_api_endpoint: settings.art_api_endpoint.clone(),
            art_polling_interval: settings.art_polling_interval_secs,
            art_deploy_repo: settings.art_deploy_repo.clone(),
            art_payload_repo: settings.art_payload_repo.clone(),
            port: settings.port,
            debug_enabled: settings.debug,
        };
        let raw_endpoint = settings.raw_endpoint();

        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            server: ServerOptions {
                host: settings.hostname,
                port: settings.port,
            },
            monitor: monitor::Options {
                interval: Duration::from_secs(settings.art_polling_interval_secs),
            },
            dsn: settings.dsn,
            repository: RepositoryOptions {
                api_endpoint: settings.art_api_endpoint,
                raw_endpoint,
                user: settings.art_user_id,
                password: settings.art_password,
            },
            deploy_service: DeployServiceOptions {
                url: settings.deploy_url,
                token: settings.deploy_token,
            },
            pipeline: PipelineOptions {
                layout: StorageLayout::new(settings.tmp_dir),
                domain: settings.domain,
                environment: settings.environment,
                deploy_repo: settings.art_deploy_repo,
                payload_repo: settings.art_payload_repo,
                status_polling: StatusPolling {
                    attempts: settings.status_poll_attempts,
                    interval: Duration::from_secs(settings.status_poll_interval_secs),
                },
            },
            info,
        }
    }
}

/// Lifecycle options for the monitor
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(300),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug)]
pub struct RepositoryOptions {
    pub api_endpoint: String,
    pub raw_endpoint: String,
    pub user: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct DeployServiceOptions {
    pub url: String,
    pub token: SecretString,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub layout: StorageLayout,
    pub domain: String,
    pub environment: String,
    pub deploy_repo: String,
    pub payload_repo: String,
    pub status_polling: StatusPolling,
}
