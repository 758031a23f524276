//! Deploy service API models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a deploy, shared by the deploy service and the local ledger.
///
/// Encoded on the wire and in storage as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployStatus {
    Started,
    Success,
    Failed,
}

impl DeployStatus {
    pub fn code(&self) -> i64 {
        match self {
            DeployStatus::Started => 1,
            DeployStatus::Success => 2,
            DeployStatus::Failed => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DeployStatus::Started),
            2 => Some(DeployStatus::Success),
            3 => Some(DeployStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStatus::Started => "started",
            DeployStatus::Success => "success",
            DeployStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl Serialize for DeployStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for DeployStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = i64::deserialize(deserializer)?;
        DeployStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid deploy status: {}", code)))
    }
}

/// Deploy submission request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub name: String,
    pub version: String,
    pub image_version: String,
    pub num_instances: u32,
    /// Base64 encoded unit/service template
    pub service_template: String,
    /// Base64 encoded secondary orchestration config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd2_keys: Option<String>,
}

/// Deploy submission response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployIdResponse {
    #[serde(rename = "deployID")]
    pub deploy_id: String,
}

/// Deploy status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStatusResponse {
    #[serde(rename = "deployID", default)]
    pub deploy_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub status: DeployStatus,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}
