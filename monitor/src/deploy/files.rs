//! Classification of the files shipped in a deploy archive

use std::path::{Path, PathBuf};

use crate::errors::MonitorError;
use crate::filesys::dir::Dir;

/// Role a file plays in a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Service description (`.json`)
    Manifest,
    /// Unit/service template (`.service` or `.tmpl`)
    Template,
    /// Secondary orchestration config (`.etcd2`)
    Etcd2,
}

/// Role of a file from its name, `None` for files a deploy does not use
pub fn classify(name: &str) -> Option<FileRole> {
    let extension = Path::new(name).extension()?.to_str()?;
    match extension {
        "json" => Some(FileRole::Manifest),
        "service" | "tmpl" => Some(FileRole::Template),
        "etcd2" => Some(FileRole::Etcd2),
        _ => None,
    }
}

/// Files found in an extracted deploy tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployFiles {
    pub manifest: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub etcd2: Option<PathBuf>,
}

impl DeployFiles {
    /// Sort a list of paths into roles. Later paths replace earlier ones.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut files = Self::default();
        for path in paths {
            let role = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => classify(name),
                None => None,
            };
            match role {
                Some(FileRole::Manifest) => files.manifest = Some(path),
                Some(FileRole::Template) => files.template = Some(path),
                Some(FileRole::Etcd2) => files.etcd2 = Some(path),
                None => {}
            }
        }
        files
    }

    /// Scan the immediate entries of an extracted directory
    pub async fn discover(dir: &Dir) -> Result<Self, MonitorError> {
        let paths = dir.list_files().await.map_err(|e| {
            MonitorError::ArchiveError(format!(
                "Cannot read extracted files in {}: {}",
                dir.path().display(),
                e
            ))
        })?;
        Ok(Self::from_paths(paths))
    }

    /// Manifest and template paths, failing when either is missing
    pub fn require(&self, archive: &str) -> Result<(PathBuf, PathBuf), MonitorError> {
        let manifest = self.manifest.clone().ok_or_else(|| {
            MonitorError::MissingFile(format!("Metadata file not found in {}", archive))
        })?;
        let template = self.template.clone().ok_or_else(|| {
            MonitorError::MissingFile(format!("Service unit file not found in {}", archive))
        })?;
        Ok((manifest, template))
    }
}
