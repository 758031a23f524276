//! Settings file management

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::errors::MonitorError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::storage::layout::DEFAULT_TMP_DIR;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/artmon/settings.json";

/// Monitor settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Name of the server, sent in the `Server` response header
    #[serde(default)]
    pub name: String,

    /// Host to bind the HTTP server to
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Port to bind the HTTP server to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Domain of the cluster being deployed to
    #[serde(default)]
    pub domain: String,

    /// Environment of the cluster (development, qa, production...)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Deploy service URL
    #[serde(default)]
    pub deploy_url: String,

    /// Deploy service bearer token
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub deploy_token: SecretString,

    /// Artifactory API endpoint, ex: `https://art.example.com/artifactory/api`
    #[serde(default)]
    pub art_api_endpoint: String,

    /// Artifactory raw content endpoint. Derived from the API endpoint when absent.
    #[serde(default)]
    pub art_raw_endpoint: Option<String>,

    /// Artifactory user
    #[serde(default)]
    pub art_user_id: String,

    /// Artifactory password
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub art_password: SecretString,

    /// Seconds between repository checks
    #[serde(default = "default_polling_interval")]
    pub art_polling_interval_secs: u64,

    /// Repository holding the deploy request files
    #[serde(default)]
    pub art_deploy_repo: String,

    /// Repository holding the deploy payload archives
    #[serde(default)]
    pub art_payload_repo: String,

    /// Ledger database DSN, ex: `sqlite:///var/lib/artmon/ledger.db`
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub dsn: SecretString,

    /// Root for per-application working directories
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Number of deploy status checks before giving up
    #[serde(default = "default_status_poll_attempts")]
    pub status_poll_attempts: u32,

    /// Seconds between deploy status checks
    #[serde(default = "default_status_poll_interval")]
    pub status_poll_interval_secs: u64,

    /// Upper bound on graceful shutdown
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_polling_interval() -> u64 {
    300
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TMP_DIR)
}

fn default_status_poll_attempts() -> u32 {
    6
}

fn default_status_poll_interval() -> u64 {
    10
}

fn default_max_shutdown_delay() -> u64 {
    300
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::new(),
            hostname: default_hostname(),
            port: default_port(),
            domain: String::new(),
            environment: default_environment(),
            deploy_url: String::new(),
            deploy_token: empty_secret(),
            art_api_endpoint: String::new(),
            art_raw_endpoint: None,
            art_user_id: String::new(),
            art_password: empty_secret(),
            art_polling_interval_secs: default_polling_interval(),
            art_deploy_repo: String::new(),
            art_payload_repo: String::new(),
            dsn: empty_secret(),
            tmp_dir: default_tmp_dir(),
            status_poll_attempts: default_status_poll_attempts(),
            status_poll_interval_secs: default_status_poll_interval(),
            max_shutdown_delay_secs: default_max_shutdown_delay(),
            debug: false,
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
        }
    }
}

impl Settings {
    /// Read the settings file (if present) and apply command line overrides.
    ///
    /// The result is normalized but not validated.
    pub async fn load(
        file: &File,
        overrides: &HashMap<String, String>,
    ) -> Result<Self, MonitorError> {
        let mut settings = if file.exists().await {
            file.read_json::<Settings>().await.map_err(|e| {
                MonitorError::ConfigError(format!(
                    "Unable to read settings file {}: {}",
                    file.path().display(),
                    e
                ))
            })?
        } else {
            Settings::default()
        };

        for (key, value) in overrides {
            settings.apply_override(key, value)?;
        }

        settings.normalize();
        Ok(settings)
    }

    /// Override a single setting from its command line form
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), MonitorError> {
        match key {
            "name" => self.name = value.to_string(),
            "hostname" => self.hostname = value.to_string(),
            "port" => self.port = parse_value(key, value)?,
            "domain" => self.domain = value.to_string(),
            "environment" => self.environment = value.to_string(),
            "deploy_url" => self.deploy_url = value.to_string(),
            "deploy_token" => self.deploy_token = SecretString::from(value.to_string()),
            "art_api_endpoint" => self.art_api_endpoint = value.to_string(),
            "art_raw_endpoint" => self.art_raw_endpoint = Some(value.to_string()),
            "art_user_id" => self.art_user_id = value.to_string(),
            "art_password" => self.art_password = SecretString::from(value.to_string()),
            "art_polling_interval_secs" => self.art_polling_interval_secs = parse_value(key, value)?,
            "art_deploy_repo" => self.art_deploy_repo = value.to_string(),
            "art_payload_repo" => self.art_payload_repo = value.to_string(),
            "dsn" => self.dsn = SecretString::from(value.to_string()),
            "tmp_dir" => self.tmp_dir = PathBuf::from(value),
            "status_poll_attempts" => self.status_poll_attempts = parse_value(key, value)?,
            "status_poll_interval_secs" => self.status_poll_interval_secs = parse_value(key, value)?,
            "max_shutdown_delay_secs" => self.max_shutdown_delay_secs = parse_value(key, value)?,
            "debug" => self.debug = parse_value(key, value)?,
            "log_level" => self.log_level = value.parse().map_err(MonitorError::ConfigError)?,
            "log_json" => self.log_json = parse_value(key, value)?,
            "log_dir" => self.log_dir = Some(PathBuf::from(value)),
            // Process level flags handled by main
            "config" => {}
            _ => {
                return Err(MonitorError::ConfigError(format!("Unknown option: {}", key)));
            }
        }
        Ok(())
    }

    /// Trim endpoints and drop trailing slashes
    pub fn normalize(&mut self) {
        self.art_api_endpoint = normalize_endpoint(&self.art_api_endpoint);
        self.deploy_url = normalize_endpoint(&self.deploy_url);
        self.art_raw_endpoint = self
            .art_raw_endpoint
            .as_deref()
            .map(normalize_endpoint)
            .filter(|e| !e.is_empty());
        self.art_deploy_repo = self.art_deploy_repo.trim().trim_matches('/').to_string();
        self.art_payload_repo = self.art_payload_repo.trim().trim_matches('/').to_string();
    }

    /// Validate the mandatory options
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.domain.is_empty() {
            return Err(config_error("Service domain is mandatory."));
        }
        if self.deploy_url.is_empty() {
            return Err(config_error("Service deploy URL is mandatory."));
        }
        if self.deploy_token.expose_secret().is_empty() {
            return Err(config_error("Service deploy authorization token is mandatory."));
        }
        if self.art_api_endpoint.is_empty() {
            return Err(config_error("Artifactory API endpoint is mandatory."));
        }
        if self.art_user_id.is_empty() {
            return Err(config_error("Artifactory API user id is mandatory."));
        }
        if self.art_deploy_repo.is_empty() {
            return Err(config_error("Artifactory API deploy request repo name is mandatory."));
        }
        if self.art_payload_repo.is_empty() {
            return Err(config_error("Artifactory API payload repo is mandatory."));
        }
        if self.dsn.expose_secret().is_empty() {
            return Err(config_error("Database DSN settings are mandatory."));
        }
        if self.art_polling_interval_secs == 0 {
            return Err(config_error("Artifactory polling interval must be positive."));
        }

        for (label, endpoint) in [
            ("deploy URL", Some(self.deploy_url.as_str())),
            ("Artifactory API endpoint", Some(self.art_api_endpoint.as_str())),
            ("Artifactory raw endpoint", self.art_raw_endpoint.as_deref()),
        ] {
            if let Some(endpoint) = endpoint {
                url::Url::parse(endpoint).map_err(|e| {
                    MonitorError::ConfigError(format!("Invalid {} {}: {}", label, endpoint, e))
                })?;
            }
        }
        Ok(())
    }

    /// Endpoint for binary payload retrieval
    pub fn raw_endpoint(&self) -> String {
        match &self.art_raw_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => self.art_api_endpoint.replacen("/api", "", 1),
        }
    }

    /// Effective log level, raised to debug when debugging is enabled
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.log_level.clone()
        }
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, MonitorError> {
    value
        .parse()
        .map_err(|_| MonitorError::ConfigError(format!("Invalid value for {}: {}", key, value)))
}

fn config_error(msg: &str) -> MonitorError {
    MonitorError::ConfigError(msg.to_string())
}
