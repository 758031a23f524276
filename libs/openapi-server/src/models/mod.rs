//! Monitor API models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Non-secret server options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsInfo {
    pub name: String,
    pub host_name: String,
    pub domain: String,
    pub environment: String,
    #[serde(rename = "deployURL")]
    pub deploy_url: String,
    #[serde(rename = "artAPIEndpoint")]
    pub art_api_endpoint: String,
    pub art_polling_interval: u64,
    pub art_deploy_repo: String,
    pub art_payload_repo: String,
    pub port: u16,
    pub debug_enabled: bool,
}

/// Info response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub options: OptionsInfo,
}

/// Request counters for a single route
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub requests: u64,
    pub bytes_in: u64,
}

/// Aggregate monitor and request counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub start: DateTime<Utc>,
    pub requests: u64,
    pub bytes_in: u64,
    pub routes: BTreeMap<String, RouteStats>,
    pub cycles: u64,
    pub detection_errors: u64,
    pub jobs_dispatched: u64,
    pub deploys_succeeded: u64,
    pub deploys_failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Host resource usage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub cpu_usage: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_percent: f32,
    pub uptime_secs: u64,
    pub cpu_count: usize,
    pub hostname: String,
}

/// Metrics response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub options: OptionsInfo,
    pub stats: StatsSnapshot,
    pub system: SystemSnapshot,
}

/// Force check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceResponse {
    pub success: bool,
    pub queued: bool,
    pub message: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
