//! Shared context for detection and deploy workers

use std::sync::Arc;
use std::time::Duration;

use crate::deploy::extract::Extractor;
use crate::http::artifactory::Repository;
use crate::http::deployments::DeployService;
use crate::ledger::{DeployKey, Ledger};
use crate::storage::layout::StorageLayout;

/// Bounds on waiting for a submitted deploy to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolling {
    /// Maximum number of status checks
    pub attempts: u32,

    /// Pause before each check
    pub interval: Duration,
}

impl Default for StatusPolling {
    fn default() -> Self {
        Self {
            attempts: 6,
            interval: Duration::from_secs(10),
        }
    }
}

/// Everything a cycle needs, handed to the detector and to every worker.
///
/// The collaborators are shared handles. The ledger in particular is used
/// concurrently by all workers of a cycle and by the HTTP front-end.
#[derive(Clone)]
pub struct Pipeline {
    pub ledger: Arc<dyn Ledger>,
    pub repository: Arc<dyn Repository>,
    pub deploy_service: Arc<dyn DeployService>,
    pub extractor: Arc<dyn Extractor>,
    pub layout: StorageLayout,

    /// Cluster domain, ex: `foo.com`
    pub domain: String,

    /// Cluster environment, ex: `development`
    pub environment: String,

    /// Repository holding one folder of deploy requests per application
    pub deploy_repo: String,

    /// Repository holding the payload archives
    pub payload_repo: String,

    pub status_polling: StatusPolling,
}

impl Pipeline {
    /// Ledger key of an application in this cluster
    pub fn key(&self, name: &str) -> DeployKey {
        DeployKey::new(&self.domain, &self.environment, name)
    }
}
