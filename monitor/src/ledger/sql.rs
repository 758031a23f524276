//! SQLite backed ledger

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::FromRow;
use tracing::{debug, info, warn};

use crate::errors::MonitorError;
use crate::ledger::{DeployKey, DeployRecord, DeployStatus, Ledger};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS artifactory_deploys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL,
        environment TEXT NOT NULL,
        service_name TEXT NOT NULL,
        deploy_id TEXT NOT NULL DEFAULT '',
        version TEXT NOT NULL,
        status INTEGER NOT NULL,
        updated_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (domain, environment, service_name)
    )",
    "CREATE TABLE IF NOT EXISTS artifactory_auth_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE
    )",
];

const MAX_CONNECTIONS: u32 = 8;

#[derive(Debug, FromRow)]
struct DeployRow {
    deploy_id: String,
    domain: String,
    environment: String,
    service_name: String,
    version: String,
    status: i64,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeployRow> for DeployRecord {
    type Error = MonitorError;

    fn try_from(row: DeployRow) -> Result<Self, Self::Error> {
        let status = DeployStatus::from_code(row.status).ok_or_else(|| {
            MonitorError::LedgerError(format!(
                "Unknown status {} for {}-{}-{}",
                row.status, row.domain, row.environment, row.service_name
            ))
        })?;

        Ok(DeployRecord {
            deploy_id: row.deploy_id,
            domain: row.domain,
            environment: row.environment,
            name: row.service_name,
            version: row.version,
            status,
            updated_at: row.updated_at,
            created_at: row.created_at,
        })
    }
}

/// Ledger stored in SQLite through a connection pool.
///
/// Every connection runs with `synchronous = FULL`, so a write is on disk
/// before the call returns.
pub struct SqlLedger {
    pool: SqlitePool,
}

impl SqlLedger {
    /// Open the database behind `dsn`, creating the schema if needed
    pub async fn connect(dsn: &str) -> Result<Self, MonitorError> {
        let options = SqliteConnectOptions::from_str(dsn)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(10));

        // An in-memory database lives and dies with its connection
        let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await?;
        let ledger = Self { pool };
        ledger.migrate().await?;

        info!("Connected to deploy ledger");
        Ok(ledger)
    }

    async fn migrate(&self) -> Result<(), MonitorError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Register an API token for the HTTP front-end
    pub async fn insert_credential(&self, token: &str) -> Result<(), MonitorError> {
        sqlx::query("INSERT OR IGNORE INTO artifactory_auth_tokens (token) VALUES (?)")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection. Callers must ensure no writer is still running.
    pub async fn close(&self) {
        info!("Closing deploy ledger...");
        self.pool.close().await;
    }
}

#[async_trait]
impl Ledger for SqlLedger {
    async fn upsert_started(&self, key: &DeployKey, version: &str) -> Result<(), MonitorError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO artifactory_deploys \
                (domain, environment, service_name, deploy_id, version, status, updated_at, created_at) \
             VALUES (?, ?, ?, '', ?, ?, ?, ?) \
             ON CONFLICT (domain, environment, service_name) DO UPDATE SET \
                deploy_id = '', \
                version = excluded.version, \
                status = excluded.status, \
                updated_at = excluded.updated_at",
        )
        .bind(&key.domain)
        .bind(&key.environment)
        .bind(&key.name)
        .bind(version)
        .bind(DeployStatus::Started.code())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MonitorError::LedgerError(format!(
                "Start of deploy {} {} was not recorded",
                key, version
            )));
        }

        debug!("Ledger: {} {} started", key, version);
        Ok(())
    }

    async fn update_status(
        &self,
        key: &DeployKey,
        deploy_id: &str,
        status: DeployStatus,
    ) -> Result<(), MonitorError> {
        let result = sqlx::query(
            "UPDATE artifactory_deploys \
             SET deploy_id = ?, status = ?, updated_at = ? \
             WHERE domain = ? AND environment = ? AND service_name = ?",
        )
        .bind(deploy_id)
        .bind(status.code())
        .bind(Utc::now())
        .bind(&key.domain)
        .bind(&key.environment)
        .bind(&key.name)
        .execute(&self.pool)
        .await?;

        match result.rows_affected() {
            1 => {
                debug!("Ledger: {} -> {}", key, status);
                Ok(())
            }
            rows => Err(MonitorError::LedgerError(format!(
                "Status update for {} affected {} rows",
                key, rows
            ))),
        }
    }

    async fn query_last_deploy(
        &self,
        key: &DeployKey,
    ) -> Result<Option<DeployRecord>, MonitorError> {
        let row = sqlx::query_as::<_, DeployRow>(
            "SELECT deploy_id, domain, environment, service_name, version, status, updated_at, created_at \
             FROM artifactory_deploys \
             WHERE domain = ? AND environment = ? AND service_name = ?",
        )
        .bind(&key.domain)
        .bind(&key.environment)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DeployRecord::try_from).transpose()
    }

    async fn validate_credential(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        let found = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM artifactory_auth_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await;

        match found {
            Ok(id) => id.is_some(),
            Err(e) => {
                warn!("Unable to validate credential: {}", e);
                false
            }
        }
    }
}
