//! Error types for the artifactory monitor

use thiserror::Error;

/// Main error type for the monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Deploy service error: {0}")]
    DeployServiceError(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Missing file: {0}")]
    MissingFile(String),

    #[error("Deploy rejected: {0}")]
    DeployRejected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Internal(err.to_string())
    }
}
