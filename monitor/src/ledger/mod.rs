//! Deploy ledger: the durable record of the last deploy attempt per application.
//!
//! Records are keyed by `(domain, environment, application)` and are only
//! ever inserted or updated in place, never deleted.

pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::errors::MonitorError;

pub use openapi_client::models::DeployStatus;
pub use sql::SqlLedger;

/// Composite ledger key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeployKey {
    pub domain: String,
    pub environment: String,
    pub name: String,
}

impl DeployKey {
    pub fn new(
        domain: impl Into<String>,
        environment: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            environment: environment.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DeployKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.domain, self.environment, self.name)
    }
}

/// The last known deploy of one application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRecord {
    pub deploy_id: String,
    pub domain: String,
    pub environment: String,
    pub name: String,
    pub version: String,
    pub status: DeployStatus,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Ledger operations shared by the detector, the workers and the HTTP front-end.
///
/// Implementations must be safe for concurrent callers and must make every
/// write durable before returning.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record that a deploy of `version` is in progress, inserting or updating
    /// the single row for the key.
    async fn upsert_started(&self, key: &DeployKey, version: &str) -> Result<(), MonitorError>;

    /// Transition the existing record for the key. Affecting anything other
    /// than exactly one row is an error.
    async fn update_status(
        &self,
        key: &DeployKey,
        deploy_id: &str,
        status: DeployStatus,
    ) -> Result<(), MonitorError>;

    /// Last record for the key, `None` when nothing was ever attempted.
    async fn query_last_deploy(&self, key: &DeployKey)
        -> Result<Option<DeployRecord>, MonitorError>;

    /// Whether a bearer token is a recognized API credential
    async fn validate_credential(&self, token: &str) -> bool;
}
