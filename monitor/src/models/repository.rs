//! Artifact repository listing models

use serde::Deserialize;

/// A node returned by the storage listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryEntry {
    /// Relative path segment, ex: `/video` or `/1.0.1-23.deploy`
    pub uri: String,

    #[serde(rename = "folder")]
    pub is_folder: bool,
}

impl RepositoryEntry {
    pub fn folder(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            is_folder: true,
        }
    }

    pub fn file(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            is_folder: false,
        }
    }
}

/// Storage listing response
#[derive(Debug, Clone, Deserialize)]
pub struct FolderInfo {
    #[serde(default)]
    pub repo: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub children: Vec<RepositoryEntry>,
}
