//! axe-core bundle resolution.
//!
//! The bundle comes from `audit.script_path` when configured, otherwise
//! from a cached copy under the data dir, downloaded from jsDelivr on
//! first use.

use std::path::PathBuf;

use tracing::{debug, info};

use axelens_core::config::{Config, data_dir};
use axelens_core::error::{AxeLensError, Result};

/// Pinned axe-core release served by jsDelivr.
pub const AXE_CORE_URL: &str = "https://cdn.jsdelivr.net/npm/axe-core@4.10.2/axe.min.js";

/// Where the downloaded bundle is cached.
pub fn cache_path() -> PathBuf {
    data_dir().join("axe-core.min.js")
}

/// Load the axe-core source to inject into the audited page.
pub async fn resolve_axe_source(config: &Config) -> Result<String> {
    resolve_with(config.audit_script_path(), cache_path()).await
}

async fn resolve_with(script_path: Option<PathBuf>, cache: PathBuf) -> Result<String> {
    if let Some(path) = script_path {
        debug!(path = %path.display(), "Loading axe-core from configured path");
        return std::fs::read_to_string(&path).map_err(|e| {
            AxeLensError::Audit(format!(
                "could not read axe-core bundle at {}: {e}",
                path.display()
            ))
        });
    }

    if cache.exists() {
        debug!(path = %cache.display(), "Loading axe-core from cache");
        return std::fs::read_to_string(&cache).map_err(AxeLensError::Io);
    }

    info!(url = AXE_CORE_URL, "Downloading axe-core");
    let source = download_axe().await?;

    if let Some(parent) = cache.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = std::fs::write(&cache, &source) {
        debug!(error = %e, "Could not cache axe-core bundle");
    }

    Ok(source)
}

async fn download_axe() -> Result<String> {
    let response = reqwest::get(AXE_CORE_URL)
        .await
        .map_err(|e| AxeLensError::Audit(format!("axe-core download failed: {e}")))?;

    if !response.status().is_success() {
        return Err(AxeLensError::Audit(format!(
            "axe-core download failed: HTTP {}",
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| AxeLensError::Audit(format!("axe-core download failed: {e}")))
}
