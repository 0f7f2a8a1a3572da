//! WebSocket connection lifecycle: handshake, read and write loops.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use axelens_core::protocol::{
    ErrorShape, Features, HelloOk, PROTOCOL_VERSION, PanelFrame, ServerInfo, Snapshot,
};

use crate::methods::dispatch_method;
use crate::state::{ConnectionState, PanelState};

/// Handle a new WebSocket connection.
pub async fn handle_ws_connection(state: Arc<PanelState>, ws: WebSocket) {
    let conn_id = Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "New panel connection");

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Create event channel for this connection
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<String>();

    {
        let mut connections = state.connections.write().await;
        connections.insert(
            conn_id.clone(),
            ConnectionState {
                conn_id: conn_id.clone(),
                event_tx: event_tx.clone(),
            },
        );
    }

    // Send hello with a snapshot so the client can repopulate its
    // report list without replaying events.
    let hello = build_hello(&state, &conn_id).await;
    let hello_frame = PanelFrame::Event {
        event: "hello".into(),
        payload: serde_json::to_value(&hello).ok(),
        seq: Some(0),
        report_version: None,
    };

    if let Ok(msg) = serde_json::to_string(&hello_frame) {
        if ws_tx.send(Message::Text(msg.into())).await.is_err() {
            cleanup_connection(&state, &conn_id).await;
            return;
        }
    }

    // Spawn event sender task
    let send_task = tokio::spawn(async move {
        while let Some(msg) = event_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Main read loop
    while let Some(msg_result) = ws_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let text = text.to_string();
                match serde_json::from_str::<PanelFrame>(&text) {
                    Ok(PanelFrame::Request { id, method, params }) => {
                        let response = dispatch_method(&state, &id, &method, params).await;
                        if let Ok(response_json) = serde_json::to_string(&response) {
                            let _ = event_tx.send(response_json);
                        }
                    }
                    Ok(_) => {
                        debug!("Received non-request frame, ignoring");
                    }
                    Err(e) => {
                        warn!(%e, "Invalid frame received");
                        let error_frame = PanelFrame::Response {
                            id: "unknown".into(),
                            ok: false,
                            payload: None,
                            error: Some(ErrorShape {
                                code: "parse_error".into(),
                                message: format!("Invalid frame: {e}"),
                                details: None,
                            }),
                        };
                        if let Ok(msg) = serde_json::to_string(&error_frame) {
                            let _ = event_tx.send(msg);
                        }
                    }
                }
            }
            Ok(Message::Ping(_)) => {
                // Axum handles ping/pong automatically
            }
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn_id, "Client requested close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    send_task.abort();
    cleanup_connection(&state, &conn_id).await;
    info!(conn_id = %conn_id, "Panel connection closed");
}

/// Build the hello payload for a new connection.
async fn build_hello(state: &Arc<PanelState>, conn_id: &str) -> HelloOk {
    let (reports, selected_id, detail) = {
        let reports = state.reports.read().await;
        (reports.snapshot(), reports.selected_id(), reports.detail())
    };
    let session = state.driver.status().await;

    HelloOk {
        protocol: PROTOCOL_VERSION,
        server: ServerInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            conn_id: conn_id.to_string(),
        },
        features: Features {
            methods: vec![
                "launch".into(),
                "audit.run".into(),
                "reports.list".into(),
                "reports.get".into(),
                "reports.select".into(),
                "reports.unselect".into(),
                "session.status".into(),
                "session.close".into(),
            ],
            events: vec![
                "report".into(),
                "reports.changed".into(),
                "session.changed".into(),
            ],
        },
        snapshot: Snapshot {
            report_version: state.report_version.load(Ordering::SeqCst),
            reports,
            selected_id,
            detail,
            session,
        },
    }
}

async fn cleanup_connection(state: &Arc<PanelState>, conn_id: &str) {
    let mut connections = state.connections.write().await;
    connections.remove(conn_id);
}
