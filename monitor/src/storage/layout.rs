//! Staging layout for deploy archives

use std::path::{Component, Path, PathBuf};

use crate::errors::MonitorError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Default root for per-application working directories
pub const DEFAULT_TMP_DIR: &str = "/tmp/artmon";

/// Staging layout rooted at a fixed temp directory.
///
/// Every application gets `{tmp_dir}/{app}/`, which holds the downloaded
/// archive and the tree extracted from it.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all staging work
    pub tmp_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
        }
    }

    /// Root staging directory
    pub fn root_dir(&self) -> Dir {
        Dir::new(&self.tmp_dir)
    }

    /// Working directory owned by one application's worker.
    ///
    /// `app` must be a single plain path segment so the directory is always a
    /// direct child of `tmp_dir`.
    pub fn app_dir(&self, app: &str) -> Result<Dir, MonitorError> {
        Ok(self.root_dir().subdir(plain_segment(app)?))
    }

    /// Location of the downloaded archive
    pub fn archive_file(&self, app: &str, archive: &ArchiveName) -> Result<File, MonitorError> {
        Ok(self.app_dir(app)?.file(plain_segment(&archive.file_name())?))
    }

    /// Directory the archive unpacks into
    pub fn extract_dir(&self, app: &str, archive: &ArchiveName) -> Result<Dir, MonitorError> {
        Ok(self.app_dir(app)?.subdir(plain_segment(&archive.prefix)?))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), MonitorError> {
        self.root_dir().create().await
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(DEFAULT_TMP_DIR)
    }
}

/// `name` when it is exactly one normal path component: not empty, not `.`
/// or `..`, and free of separators.
pub fn plain_segment(name: &str) -> Result<&str, MonitorError> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single && !name.contains(|c: char| c == '/' || c == '\\') {
        Ok(name)
    } else {
        Err(MonitorError::ArchiveError(format!(
            "Refusing path segment {:?}",
            name
        )))
    }
}

/// Name of a deploy payload archive, ex: `foo.com-development-video-1.0.1-23.tar.gz`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub prefix: String,
}

impl ArchiveName {
    pub fn new(domain: &str, environment: &str, app: &str, version: &str) -> Self {
        Self {
            prefix: format!("{}-{}-{}-{}", domain, environment, app, version),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.tar.gz", self.prefix)
    }
}
