//! AxeLens panel wire protocol.
//!
//! All panel communication uses JSON-over-WebSocket with three frame types:
//! Request, Response, and Event.

use serde::{Deserialize, Serialize};

use crate::report::ReportSummary;

/// Protocol version implemented by this panel.
pub const PROTOCOL_VERSION: u32 = 1;

/// A panel wire frame, the top-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PanelFrame {
    /// Client -> Server request.
    #[serde(rename = "req")]
    Request {
        id: String,
        method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<serde_json::Value>,
    },

    /// Server -> Client response.
    #[serde(rename = "res")]
    Response {
        id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorShape>,
    },

    /// Server -> Client event broadcast.
    #[serde(rename = "event")]
    Event {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        report_version: Option<u64>,
    },
}

/// Error shape returned in response frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Browser session status as reported by the audit driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Whether a browser and page pair is currently alive.
    pub live: bool,
    /// URL the page last navigated to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Server hello payload, sent as the first event on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloOk {
    pub protocol: u32,
    pub server: ServerInfo,
    pub features: Features,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub version: String,
    pub conn_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features {
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

/// Current panel state mirrored to a connecting client so it can
/// repopulate its report list and detail pane without replaying events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub report_version: u64,
    pub reports: Vec<ReportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_id: Option<u64>,
    /// Violations of the selected report, pretty-printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub session: SessionStatus,
}
