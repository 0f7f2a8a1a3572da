//! Chrome automation for accessibility audits.
//!
//! Launches Chrome over CDP, navigates to the page under audit, injects
//! the axe-core bundle, and runs audits in the page. The session is lazy:
//! no browser process starts until the first launch.

pub mod detect;
pub mod script;
pub mod session;

use async_trait::async_trait;

use axelens_core::error::Result;
use axelens_core::protocol::SessionStatus;
use axelens_core::report::AxeResults;

pub use session::BrowserSession;

/// Seam between the panel and the browser.
///
/// The panel dispatches methods against this trait so tests can run with
/// a stub instead of a real Chrome process.
#[async_trait]
pub trait AuditDriver: Send + Sync {
    /// Navigate to a URL, starting the browser first when none is live.
    async fn launch(&self, url: &str) -> Result<SessionStatus>;

    /// Run axe against the currently loaded page.
    async fn run_audit(&self) -> Result<AxeResults>;

    /// Whether a session is live and which URL it is on.
    async fn status(&self) -> SessionStatus;

    /// Shut down the browser, clearing the session.
    async fn close(&self) -> Result<()>;
}
