//! Archive extraction

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::MonitorError;

/// Unpacks a downloaded archive into a directory
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), MonitorError>;
}

/// Extraction through the system `tar`
#[derive(Debug, Clone, Default)]
pub struct TarExtractor;

#[async_trait]
impl Extractor for TarExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), MonitorError> {
        debug!("Extracting {} into {}", archive.display(), dest.display());

        let output = Command::new("tar")
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MonitorError::ArchiveError(format!("Failed to run tar: {}", e)))?;

        if !output.status.success() {
            return Err(MonitorError::ArchiveError(format!(
                "Cannot untar file {}: {}",
                archive.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
