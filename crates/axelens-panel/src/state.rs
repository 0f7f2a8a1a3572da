//! Panel shared state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};

use axelens_browser::AuditDriver;
use axelens_core::config::Config;
use axelens_core::report::ReportList;

/// Shared panel state accessible from all connections and handlers.
pub struct PanelState {
    pub config: Arc<Config>,
    pub driver: Arc<dyn AuditDriver>,
    pub reports: RwLock<ReportList>,
    pub connections: RwLock<HashMap<String, ConnectionState>>,
    pub report_version: AtomicU64,
}

/// Per-connection state.
pub struct ConnectionState {
    pub conn_id: String,
    pub event_tx: mpsc::UnboundedSender<String>,
}

impl PanelState {
    pub fn new(config: Arc<Config>, driver: Arc<dyn AuditDriver>) -> Self {
        Self {
            config,
            driver,
            reports: RwLock::new(ReportList::new()),
            connections: RwLock::new(HashMap::new()),
            report_version: AtomicU64::new(1),
        }
    }

    pub fn bump_report_version(&self) -> u64 {
        self.report_version.fetch_add(1, Ordering::SeqCst) + 1
    }
}
