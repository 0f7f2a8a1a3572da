//! Event broadcasting to all connected panel clients.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use axelens_core::protocol::{PanelFrame, SessionStatus};

use crate::state::PanelState;

/// Broadcast an event to all connected clients.
pub async fn broadcast_event(
    state: &Arc<PanelState>,
    event: &str,
    payload: Option<serde_json::Value>,
) {
    let frame = PanelFrame::Event {
        event: event.to_string(),
        payload,
        seq: None,
        report_version: Some(state.report_version.load(Ordering::SeqCst)),
    };

    let msg = match serde_json::to_string(&frame) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(%e, "Failed to serialize event");
            return;
        }
    };

    let connections = state.connections.read().await;
    let mut sent = 0;
    for conn in connections.values() {
        if conn.event_tx.send(msg.clone()).is_ok() {
            sent += 1;
        }
    }
    debug!(event, sent, "Broadcast event");
}

/// Forward browser session updates to all clients.
///
/// The browser side sends a status on this channel when Chrome disconnects
/// out from under the session. Runs until the sender is dropped.
pub async fn forward_session_events(
    state: Arc<PanelState>,
    mut rx: mpsc::UnboundedReceiver<SessionStatus>,
) {
    while let Some(status) = rx.recv().await {
        if !status.live {
            warn!("Browser session ended");
        }
        let payload = serde_json::to_value(&status).ok();
        broadcast_event(&state, "session.changed", payload).await;
    }
}
