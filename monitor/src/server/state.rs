//! Server state

use std::sync::Arc;

use openapi_server::models::OptionsInfo;
use tokio::sync::mpsc;

use crate::ledger::Ledger;
use crate::telemetry::MonitorStats;

/// Server state shared across handlers
pub struct ServerState {
    /// Non-secret configuration reported by info and metrics
    pub options: OptionsInfo,
    pub ledger: Arc<dyn Ledger>,
    pub stats: Arc<MonitorStats>,
    /// Wakes the monitor worker early
    pub force_tx: mpsc::Sender<()>,
    /// Value of the `Server` response header, omitted when empty
    pub name: String,
}

impl ServerState {
    pub fn new(
        options: OptionsInfo,
        ledger: Arc<dyn Ledger>,
        stats: Arc<MonitorStats>,
        force_tx: mpsc::Sender<()>,
    ) -> Self {
        let name = options.name.clone();
        Self {
            options,
            ledger,
            stats,
            force_tx,
            name,
        }
    }
}
