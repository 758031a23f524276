//! Deployment models

use std::path::PathBuf;

use serde::Deserialize;

/// One application's pending deploy for the current cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployJob {
    /// Application name
    pub name: String,

    /// Version to deploy
    pub version: String,
}

impl DeployJob {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Service description read from the manifest inside a deploy archive
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub image_version: String,

    #[serde(default = "default_num_instances")]
    pub num_instances: u32,

    /// Unit/service template found next to the manifest
    #[serde(skip)]
    pub template_path: PathBuf,

    /// Optional secondary orchestration config
    #[serde(skip)]
    pub etcd2_path: Option<PathBuf>,
}

fn default_num_instances() -> u32 {
    1
}
