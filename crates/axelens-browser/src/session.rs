//! Chrome session management over CDP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use axelens_core::config::Config;
use axelens_core::error::{AxeLensError, Result};
use axelens_core::protocol::SessionStatus;
use axelens_core::report::AxeResults;

use crate::AuditDriver;
use crate::detect::detect_chrome;
use crate::script::resolve_axe_source;

/// An active browser plus the page being audited.
struct SessionState {
    browser: Browser,
    page: Page,
    handler_handle: JoinHandle<()>,
}

/// Lazily launched Chrome session hosting one audited page.
///
/// The browser process starts on the first `launch` and is torn down on
/// `close` or when Chrome disconnects. A disconnect clears the stored
/// handles, so the next `launch` starts a fresh browser.
pub struct BrowserSession {
    config: Arc<Config>,
    state: Arc<Mutex<Option<SessionState>>>,
    events: Option<UnboundedSender<SessionStatus>>,
}

impl BrowserSession {
    /// Create a session. No browser process is started yet.
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(None)),
            events: None,
        }
    }

    /// Register a channel that receives a status update when Chrome
    /// disconnects out from under the session.
    pub fn with_events(mut self, events: UnboundedSender<SessionStatus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Navigate to `url`, starting Chrome and opening a page first if no
    /// session is live. The axe-core bundle is injected after navigation
    /// so an audit can run against the loaded document.
    pub async fn launch(&self, url: &str) -> Result<SessionStatus> {
        let mut guard = self.state.lock().await;

        if guard.is_none() {
            *guard = Some(self.start_browser().await?);
        }

        if let Err(e) = navigate_and_inject(guard.as_ref(), &self.config, url).await {
            if !is_connection_closed(&e) {
                return Err(e);
            }
            // Chrome died under us without the watcher having cleared the
            // state yet. Start fresh and retry once.
            warn!(error = %e, "Browser connection lost, relaunching");
            if let Some(old) = guard.take() {
                shutdown_state(old).await;
            }
            *guard = Some(self.start_browser().await?);
            navigate_and_inject(guard.as_ref(), &self.config, url).await?;
        }

        let current = match guard.as_ref() {
            Some(state) => state.page.url().await.ok().flatten(),
            None => None,
        };

        info!(url, "Browser launched");
        Ok(SessionStatus {
            live: true,
            url: current.or_else(|| Some(url.to_string())),
        })
    }

    /// Run axe against the live page.
    ///
    /// The bundle is normally injected at launch, but a hand-navigated
    /// page loses it; in that case it is re-injected and the run retried
    /// once. Fails when no session is active.
    pub async fn run_audit(&self) -> Result<AxeResults> {
        let guard = self.state.lock().await;
        let Some(state) = guard.as_ref() else {
            return Err(AxeLensError::Browser(
                "no active browser session; launch a URL first".into(),
            ));
        };

        let results = match evaluate_audit(state, &self.config).await {
            Ok(results) => results,
            Err(e) if e.to_string().contains("axe is not defined") => {
                debug!("axe-core missing from page, re-injecting");
                let source = resolve_axe_source(&self.config).await?;
                state.page.evaluate(source).await.map_err(|e| {
                    AxeLensError::Audit(format!("axe-core injection failed: {e}"))
                })?;
                evaluate_audit(state, &self.config).await?
            }
            Err(e) => return Err(e),
        };

        debug!(
            violations = results.violations.len(),
            url = results.url.as_deref().unwrap_or(""),
            "Audit complete"
        );
        Ok(results)
    }

    /// Current session status: whether a browser is live and the page URL.
    pub async fn status(&self) -> SessionStatus {
        let guard = self.state.lock().await;
        match guard.as_ref() {
            Some(state) => SessionStatus {
                live: true,
                url: state.page.url().await.ok().flatten(),
            },
            None => SessionStatus::default(),
        }
    }

    /// Shut down Chrome and clear the session.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.take() {
            info!("Closing browser session");
            shutdown_state(state).await;
        }
        Ok(())
    }

    /// Launch Chrome with the configured window, viewport, and binary.
    async fn start_browser(&self) -> Result<SessionState> {
        let Some(chrome) = self.config.chrome_path().or_else(detect_chrome) else {
            return Err(AxeLensError::Browser(
                "no Chrome or Chromium binary found; set browser.chrome_path or AXELENS_CHROME"
                    .into(),
            ));
        };

        let (win_w, win_h) = self.config.window_size();
        let (vp_w, vp_h) = self.config.viewport_size();

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .window_size(win_w, win_h)
            .viewport(Viewport {
                width: vp_w,
                height: vp_h,
                ..Default::default()
            })
            .request_timeout(Duration::from_millis(self.config.nav_timeout_ms()))
            .chrome_executable(&chrome);

        if !self.config.headless() {
            builder = builder.with_head();
        }

        let browser_config = builder.build().map_err(AxeLensError::Browser)?;

        info!(
            chrome = %chrome.display(),
            headless = self.config.headless(),
            "Launching Chrome"
        );

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AxeLensError::Browser(format!("failed to launch Chrome: {e}")))?;

        let handler_handle =
            spawn_disconnect_watcher(handler, Arc::clone(&self.state), self.events.clone());

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AxeLensError::Browser(format!("failed to open page: {e}")))?;

        Ok(SessionState {
            browser,
            page,
            handler_handle,
        })
    }
}

#[async_trait]
impl AuditDriver for BrowserSession {
    async fn launch(&self, url: &str) -> Result<SessionStatus> {
        BrowserSession::launch(self, url).await
    }

    async fn run_audit(&self) -> Result<AxeResults> {
        BrowserSession::run_audit(self).await
    }

    async fn status(&self) -> SessionStatus {
        BrowserSession::status(self).await
    }

    async fn close(&self) -> Result<()> {
        BrowserSession::close(self).await
    }
}

/// Drive the CDP event stream and clear the session when it ends.
///
/// The stream ending means Chrome disconnected: it crashed, the user
/// closed the window, or `close` shut it down. Clearing the stored state
/// makes the next `launch` start a fresh browser.
fn spawn_disconnect_watcher<S, E, T>(
    mut handler: S,
    state: Arc<Mutex<Option<T>>>,
    events: Option<UnboundedSender<SessionStatus>>,
) -> JoinHandle<()>
where
    S: Stream<Item = std::result::Result<(), E>> + Unpin + Send + 'static,
    E: Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }

        let mut guard = state.lock().await;
        if guard.take().is_some() {
            warn!("Browser disconnected, session cleared");
            if let Some(tx) = &events {
                let _ = tx.send(SessionStatus::default());
            }
        }
    })
}

/// Evaluate the audit expression in the page and parse what it resolves to.
async fn evaluate_audit(state: &SessionState, config: &Config) -> Result<AxeResults> {
    let params = EvaluateParams::builder()
        .expression(audit_expression(&config.run_tags()))
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(AxeLensError::Audit)?;

    state
        .page
        .evaluate(params)
        .await
        .map_err(|e| AxeLensError::Audit(format!("audit run failed: {e}")))?
        .into_value()
        .map_err(|e| AxeLensError::Audit(format!("could not parse axe results: {e}")))
}

async fn navigate_and_inject(
    state: Option<&SessionState>,
    config: &Config,
    url: &str,
) -> Result<()> {
    let Some(state) = state else {
        return Err(AxeLensError::Browser("no browser session".into()));
    };

    debug!(url, "Navigating");
    state
        .page
        .goto(url)
        .await
        .map_err(|e| AxeLensError::Browser(format!("navigation to '{url}' failed: {e}")))?;
    let _ = state.page.wait_for_navigation().await;

    let source = resolve_axe_source(config).await?;
    state
        .page
        .evaluate(source)
        .await
        .map_err(|e| AxeLensError::Browser(format!("axe-core injection failed: {e}")))?;

    Ok(())
}

async fn shutdown_state(mut state: SessionState) {
    // The watcher leaves its stream loop the moment the connection dies
    // and then blocks on the state lock. Abort it first: left running it
    // would clear whichever session replaces this one. With the handler
    // gone a CDP close cannot be delivered, so kill the process directly.
    state.handler_handle.abort();
    if let Some(Err(e)) = state.browser.kill().await {
        debug!(error = %e, "Error killing browser process");
    }
}

/// True when an error means the CDP connection itself is gone.
fn is_connection_closed(err: &AxeLensError) -> bool {
    let msg = err.to_string();
    msg.contains("AlreadyClosed") || msg.contains("ConnectionClosed")
}

/// Build the JS expression that runs axe in the page.
///
/// `tags` maps to axe's `runOnly` option; an empty list runs every rule.
fn audit_expression(tags: &[String]) -> String {
    let options = if tags.is_empty() {
        "{}".to_string()
    } else {
        let values = serde_json::to_string(tags).unwrap_or_else(|_| "[]".into());
        format!(r#"{{ runOnly: {{ type: "tag", values: {values} }} }}"#)
    };
    format!("(async () => {{ return await axe.run(document, {options}); }})()")
}
