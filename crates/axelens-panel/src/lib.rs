//! AxeLens panel server.
//!
//! Serves the report UI and a WebSocket endpoint that drives the audit
//! browser: launch a URL, run audits, browse the collected reports.

pub mod connection;
pub mod events;
pub mod methods;
pub mod server;
pub mod state;

pub use server::start_panel;
pub use state::PanelState;
