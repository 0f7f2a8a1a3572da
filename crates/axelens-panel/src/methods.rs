//! Panel method handlers.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use axelens_core::error::AxeLensError;
use axelens_core::protocol::{ErrorShape, PanelFrame};

use crate::events::broadcast_event;
use crate::state::PanelState;

/// Dispatch a method request and return the response frame.
pub async fn dispatch_method(
    state: &Arc<PanelState>,
    request_id: &str,
    method: &str,
    params: Option<serde_json::Value>,
) -> PanelFrame {
    debug!(method, "Dispatching method");

    match method {
        "launch" => handle_launch(state, request_id, params).await,
        "audit.run" => handle_audit_run(state, request_id).await,
        "reports.list" => handle_reports_list(state, request_id).await,
        "reports.get" => handle_reports_get(state, request_id, params).await,
        "reports.select" => handle_reports_select(state, request_id, params).await,
        "reports.unselect" => handle_reports_unselect(state, request_id).await,
        "session.status" => handle_session_status(state, request_id).await,
        "session.close" => handle_session_close(state, request_id).await,
        _ => error_response(
            request_id,
            "method_not_found",
            &format!("Unknown method: {method}"),
        ),
    }
}

// ============================================================
// Session methods
// ============================================================

async fn handle_launch(
    state: &Arc<PanelState>,
    request_id: &str,
    params: Option<serde_json::Value>,
) -> PanelFrame {
    let params = params.unwrap_or_default();
    let url = match params.get("url").and_then(|v| v.as_str()) {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => {
            return error_response(
                request_id,
                "invalid_params",
                "Expected non-empty string 'url' parameter",
            );
        }
    };

    info!(url, "Launch requested");
    match state.driver.launch(&url).await {
        Ok(session) => {
            broadcast_event(
                state,
                "session.changed",
                serde_json::to_value(&session).ok(),
            )
            .await;
            ok_response(request_id, json!({ "session": session }))
        }
        Err(e) => error_response(request_id, error_code(&e), &e.to_string()),
    }
}

async fn handle_session_status(state: &Arc<PanelState>, request_id: &str) -> PanelFrame {
    let session = state.driver.status().await;
    ok_response(request_id, json!({ "session": session }))
}

async fn handle_session_close(state: &Arc<PanelState>, request_id: &str) -> PanelFrame {
    match state.driver.close().await {
        Ok(()) => {
            let session = state.driver.status().await;
            broadcast_event(
                state,
                "session.changed",
                serde_json::to_value(&session).ok(),
            )
            .await;
            ok_response(request_id, json!({ "session": session }))
        }
        Err(e) => error_response(request_id, error_code(&e), &e.to_string()),
    }
}

// ============================================================
// Audit methods
// ============================================================

async fn handle_audit_run(state: &Arc<PanelState>, request_id: &str) -> PanelFrame {
    let session = state.driver.status().await;

    let results = match state.driver.run_audit().await {
        Ok(results) => results,
        Err(e) => return error_response(request_id, error_code(&e), &e.to_string()),
    };

    let fallback_url = session.url.unwrap_or_default();

    let (report, detail) = {
        let mut reports = state.reports.write().await;
        let report = reports.append(&fallback_url, results).clone();
        let detail = reports.detail();
        state.bump_report_version();
        (report, detail)
    };

    info!(
        report_id = report.id,
        url = %report.url,
        violations = report.violations.len(),
        "Report appended"
    );

    broadcast_event(
        state,
        "report",
        Some(json!({ "report": report, "detail": detail })),
    )
    .await;

    ok_response(request_id, json!({ "report": report.summary() }))
}

// ============================================================
// Report methods
// ============================================================

async fn handle_reports_list(state: &Arc<PanelState>, request_id: &str) -> PanelFrame {
    let reports = state.reports.read().await;
    ok_response(
        request_id,
        json!({
            "reports": reports.snapshot(),
            "selected_id": reports.selected_id(),
        }),
    )
}

async fn handle_reports_get(
    state: &Arc<PanelState>,
    request_id: &str,
    params: Option<serde_json::Value>,
) -> PanelFrame {
    let params = params.unwrap_or_default();
    let Some(id) = params.get("id").and_then(|v| v.as_u64()) else {
        return error_response(request_id, "invalid_params", "Expected numeric 'id' parameter");
    };

    let reports = state.reports.read().await;
    match reports.get(id) {
        Some(report) => ok_response(request_id, json!({ "report": report })),
        None => error_response(request_id, "not_found", &format!("No report with id {id}")),
    }
}

async fn handle_reports_select(
    state: &Arc<PanelState>,
    request_id: &str,
    params: Option<serde_json::Value>,
) -> PanelFrame {
    let params = params.unwrap_or_default();
    let Some(id) = params.get("id").and_then(|v| v.as_u64()) else {
        return error_response(request_id, "invalid_params", "Expected numeric 'id' parameter");
    };

    let detail = {
        let mut reports = state.reports.write().await;
        if !reports.select(id) {
            return error_response(request_id, "not_found", &format!("No report with id {id}"));
        }
        reports.detail()
    };
    state.bump_report_version();

    let payload = json!({ "selected_id": id, "detail": detail });
    broadcast_event(state, "reports.changed", Some(payload.clone())).await;
    ok_response(request_id, payload)
}

async fn handle_reports_unselect(state: &Arc<PanelState>, request_id: &str) -> PanelFrame {
    {
        let mut reports = state.reports.write().await;
        reports.unselect();
    }
    state.bump_report_version();

    let payload = json!({ "selected_id": null, "detail": null });
    broadcast_event(state, "reports.changed", Some(payload.clone())).await;
    ok_response(request_id, payload)
}

// ============================================================
// Helpers
// ============================================================

/// Map a driver error to a wire error code.
fn error_code(err: &AxeLensError) -> &'static str {
    match err {
        AxeLensError::Browser(_) => "browser_unavailable",
        AxeLensError::Audit(_) => "audit_failed",
        _ => "internal_error",
    }
}

fn ok_response(id: &str, payload: serde_json::Value) -> PanelFrame {
    PanelFrame::Response {
        id: id.to_string(),
        ok: true,
        payload: Some(payload),
        error: None,
    }
}

fn error_response(id: &str, code: &str, message: &str) -> PanelFrame {
    PanelFrame::Response {
        id: id.to_string(),
        ok: false,
        payload: None,
        error: Some(ErrorShape {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use axelens_browser::AuditDriver;
    use axelens_core::config::Config;
    use axelens_core::error::Result;
    use axelens_core::protocol::SessionStatus;
    use axelens_core::report::AxeResults;

    /// Driver stub: launch records the URL, audits return a canned result.
    struct StubDriver {
        url: Mutex<Option<String>>,
    }

    impl StubDriver {
        fn new() -> Self {
            Self {
                url: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl AuditDriver for StubDriver {
        async fn launch(&self, url: &str) -> Result<SessionStatus> {
            *self.url.lock().await = Some(url.to_string());
            Ok(SessionStatus {
                live: true,
                url: Some(url.to_string()),
            })
        }

        async fn run_audit(&self) -> Result<AxeResults> {
            let Some(url) = self.url.lock().await.clone() else {
                return Err(AxeLensError::Browser(
                    "no active browser session; launch a URL first".into(),
                ));
            };
            Ok(serde_json::from_value(json!({
                "url": url,
                "violations": [{
                    "id": "image-alt",
                    "impact": "critical",
                    "description": "Ensure <img> elements have alternative text",
                    "help": "Images must have alternative text",
                    "tags": ["wcag2a"],
                    "nodes": [{"html": "<img src=\"hero.png\">", "target": ["img"]}]
                }],
                "passes": [],
                "inapplicable": []
            }))
            .unwrap())
        }

        async fn status(&self) -> SessionStatus {
            let url = self.url.lock().await.clone();
            SessionStatus {
                live: url.is_some(),
                url,
            }
        }

        async fn close(&self) -> Result<()> {
            *self.url.lock().await = None;
            Ok(())
        }
    }

    fn make_state() -> Arc<PanelState> {
        Arc::new(PanelState::new(
            Arc::new(Config::default()),
            Arc::new(StubDriver::new()),
        ))
    }

    fn payload_of(frame: PanelFrame) -> serde_json::Value {
        match frame {
            PanelFrame::Response {
                ok, payload, error, ..
            } => {
                assert!(ok, "expected ok response, got error: {error:?}");
                payload.unwrap_or_default()
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    fn error_of(frame: PanelFrame) -> ErrorShape {
        match frame {
            PanelFrame::Response { ok, error, .. } => {
                assert!(!ok, "expected error response");
                error.expect("error response without error shape")
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_launch_requires_url() {
        let state = make_state();

        let frame = dispatch_method(&state, "r1", "launch", None).await;
        assert_eq!(error_of(frame).code, "invalid_params");

        let frame = dispatch_method(&state, "r2", "launch", Some(json!({"url": "  "}))).await;
        assert_eq!(error_of(frame).code, "invalid_params");
    }

    #[tokio::test]
    async fn test_launch_reports_live_session() {
        let state = make_state();
        let frame = dispatch_method(
            &state,
            "r1",
            "launch",
            Some(json!({"url": "https://start.spring.io"})),
        )
        .await;
        let payload = payload_of(frame);
        assert_eq!(payload["session"]["live"], true);
        assert_eq!(payload["session"]["url"], "https://start.spring.io");
    }

    #[tokio::test]
    async fn test_audit_before_launch_is_browser_unavailable() {
        let state = make_state();
        let err = error_of(dispatch_method(&state, "r1", "audit.run", None).await);
        assert_eq!(err.code, "browser_unavailable");
        assert!(err.message.contains("launch"));
    }

    #[tokio::test]
    async fn test_each_audit_appends_one_report_in_order() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;

        let first = payload_of(dispatch_method(&state, "a1", "audit.run", None).await);
        assert_eq!(first["report"]["id"], 1);

        let second = payload_of(dispatch_method(&state, "a2", "audit.run", None).await);
        assert_eq!(second["report"]["id"], 2);

        let list = payload_of(dispatch_method(&state, "ls", "reports.list", None).await);
        let reports = list["reports"].as_array().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0]["id"], 1);
        assert_eq!(reports[1]["id"], 2);
        // The newest report is auto-selected.
        assert_eq!(list["selected_id"], 2);
    }

    #[tokio::test]
    async fn test_select_returns_violation_detail() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;
        dispatch_method(&state, "a", "audit.run", None).await;

        let payload = payload_of(
            dispatch_method(&state, "s", "reports.select", Some(json!({"id": 1}))).await,
        );
        assert_eq!(payload["selected_id"], 1);
        assert!(payload["detail"].as_str().unwrap().contains("image-alt"));
    }

    #[tokio::test]
    async fn test_unselect_clears_detail() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;
        dispatch_method(&state, "a", "audit.run", None).await;

        let payload = payload_of(dispatch_method(&state, "u", "reports.unselect", None).await);
        assert!(payload["selected_id"].is_null());
        assert!(payload["detail"].is_null());

        let list = payload_of(dispatch_method(&state, "ls", "reports.list", None).await);
        assert!(list["selected_id"].is_null());
    }

    #[tokio::test]
    async fn test_select_unknown_report_not_found() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;
        dispatch_method(&state, "a", "audit.run", None).await;

        let err = error_of(
            dispatch_method(&state, "s", "reports.select", Some(json!({"id": 99}))).await,
        );
        assert_eq!(err.code, "not_found");

        // The existing selection is untouched.
        let list = payload_of(dispatch_method(&state, "ls", "reports.list", None).await);
        assert_eq!(list["selected_id"], 1);
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_invalid_params() {
        // A JSON string like "3" is rejected the same way a missing id is,
        // and the message covers both shapes.
        let state = make_state();

        let err = error_of(
            dispatch_method(&state, "s", "reports.select", Some(json!({"id": "3"}))).await,
        );
        assert_eq!(err.code, "invalid_params");
        assert!(err.message.contains("numeric"));

        let err =
            error_of(dispatch_method(&state, "g", "reports.get", Some(json!({"id": "3"}))).await);
        assert_eq!(err.code, "invalid_params");
        assert!(err.message.contains("numeric"));
    }

    #[tokio::test]
    async fn test_reports_get() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;
        dispatch_method(&state, "a", "audit.run", None).await;

        let payload =
            payload_of(dispatch_method(&state, "g", "reports.get", Some(json!({"id": 1}))).await);
        assert_eq!(payload["report"]["url"], "https://a.example");
        assert_eq!(payload["report"]["violations"].as_array().unwrap().len(), 1);

        let err =
            error_of(dispatch_method(&state, "g2", "reports.get", Some(json!({"id": 7}))).await);
        assert_eq!(err.code, "not_found");

        let err = error_of(dispatch_method(&state, "g3", "reports.get", None).await);
        assert_eq!(err.code, "invalid_params");
    }

    #[tokio::test]
    async fn test_session_status_and_close() {
        let state = make_state();

        let payload = payload_of(dispatch_method(&state, "s1", "session.status", None).await);
        assert_eq!(payload["session"]["live"], false);

        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;
        let payload = payload_of(dispatch_method(&state, "s2", "session.status", None).await);
        assert_eq!(payload["session"]["live"], true);

        let payload = payload_of(dispatch_method(&state, "c", "session.close", None).await);
        assert_eq!(payload["session"]["live"], false);

        // With the session gone, the next audit fails until a new launch.
        let err = error_of(dispatch_method(&state, "a", "audit.run", None).await);
        assert_eq!(err.code, "browser_unavailable");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let state = make_state();
        let err = error_of(dispatch_method(&state, "x", "nonexistent.method", None).await);
        assert_eq!(err.code, "method_not_found");
        assert!(err.message.contains("nonexistent.method"));
    }

    #[tokio::test]
    async fn test_audit_bumps_report_version() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;

        let before = state.report_version.load(std::sync::atomic::Ordering::SeqCst);
        dispatch_method(&state, "a", "audit.run", None).await;
        let after = state.report_version.load(std::sync::atomic::Ordering::SeqCst);
        assert_eq!(after, before + 1);
    }

    #[tokio::test]
    async fn test_report_carries_audited_url() {
        let state = make_state();
        dispatch_method(
            &state,
            "l",
            "launch",
            Some(json!({"url": "https://a.example"})),
        )
        .await;

        let payload = payload_of(dispatch_method(&state, "a", "audit.run", None).await);
        assert_eq!(payload["report"]["url"], "https://a.example");
    }
}
