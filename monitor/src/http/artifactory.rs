//! Artifact repository client

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::errors::MonitorError;
use crate::http::client::{Credentials, HttpClient};
use crate::models::repository::{FolderInfo, RepositoryEntry};

/// Extension of deploy request files
pub const DEPLOY_EXTENSION: &str = "deploy";

const STORAGE_ROUTE: &str = "/storage";

/// Read access to the artifact repository
#[async_trait]
pub trait Repository: Send + Sync {
    /// List the folders (or the deploy request files) directly under `path`
    async fn list_entries(
        &self,
        path: &str,
        want_folders: bool,
    ) -> Result<Vec<RepositoryEntry>, MonitorError>;

    /// Download a payload from the raw content endpoint
    async fn fetch_archive(&self, path: &str) -> Result<Vec<u8>, MonitorError>;
}

/// Artifactory client.
///
/// Listings go through the API endpoint, payloads through the raw endpoint.
/// Both use basic authentication with the same account.
pub struct ArtifactoryClient {
    api: HttpClient,
    raw: HttpClient,
}

impl ArtifactoryClient {
    pub fn new(
        api_endpoint: &str,
        raw_endpoint: &str,
        user: &str,
        password: SecretString,
    ) -> Result<Self, MonitorError> {
        let api = HttpClient::new(
            api_endpoint,
            Credentials::Basic {
                user: user.to_string(),
                password: SecretString::from(password.expose_secret().to_string()),
            },
        )?;
        let raw = HttpClient::new(
            raw_endpoint,
            Credentials::Basic {
                user: user.to_string(),
                password,
            },
        )?;
        Ok(Self { api, raw })
    }
}

#[async_trait]
impl Repository for ArtifactoryClient {
    async fn list_entries(
        &self,
        path: &str,
        want_folders: bool,
    ) -> Result<Vec<RepositoryEntry>, MonitorError> {
        let route = format!("{}/{}/", STORAGE_ROUTE, path.trim_matches('/'));
        let info: FolderInfo = self.api.get(&route).await?;

        let entries = filter_entries(info.children, want_folders);
        debug!("Listed {} entries under {}", entries.len(), path);
        Ok(entries)
    }

    async fn fetch_archive(&self, path: &str) -> Result<Vec<u8>, MonitorError> {
        let route = format!("/{}", path.trim_start_matches('/'));
        self.raw.get_bytes(&route).await
    }
}

/// Keep folders only, or deploy request files only
pub fn filter_entries(entries: Vec<RepositoryEntry>, want_folders: bool) -> Vec<RepositoryEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.is_folder == want_folders)
        .filter(|entry| want_folders || is_deploy_file(&entry.uri))
        .collect()
}

fn is_deploy_file(uri: &str) -> bool {
    Path::new(uri)
        .extension()
        .map(|ext| ext == DEPLOY_EXTENSION)
        .unwrap_or(false)
}
