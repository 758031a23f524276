//! Manifest loading

use std::path::PathBuf;

use crate::deploy::files::DeployFiles;
use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::models::deployment::ServiceMetadata;

impl ServiceMetadata {
    /// Parse the manifest of an extracted archive and attach the file paths
    /// found next to it.
    pub async fn load(
        manifest: PathBuf,
        template: PathBuf,
        files: &DeployFiles,
    ) -> Result<Self, MonitorError> {
        let file = File::new(&manifest);
        let contents = file.read_string().await.map_err(|e| {
            MonitorError::ManifestError(format!(
                "Cannot read metadata from {}: {}",
                manifest.display(),
                e
            ))
        })?;

        let mut metadata: ServiceMetadata = serde_json::from_str(&contents).map_err(|e| {
            MonitorError::ManifestError(format!(
                "Cannot parse metadata from {}: {}",
                manifest.display(),
                e
            ))
        })?;

        metadata.template_path = template;
        metadata.etcd2_path = files.etcd2.clone();
        Ok(metadata)
    }
}
