//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level AxeLens configuration.
///
/// Loaded from `~/.axelens/config.json` (JSON5, so comments and trailing
/// commas are fine). Every section is optional; accessors fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Panel WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    8790
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to a Chrome/Chromium binary (auto-detected if omitted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,

    /// Run without a visible window (default: false, so the audited page
    /// stays inspectable next to the panel).
    #[serde(default)]
    pub headless: bool,

    /// Browser window size.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Page viewport size.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Navigation/CDP request timeout in ms (default: 30000).
    #[serde(default = "default_nav_timeout")]
    pub nav_timeout_ms: u64,
}

fn default_window_width() -> u32 {
    1600
}

fn default_window_height() -> u32 {
    940
}

fn default_viewport_width() -> u32 {
    1600
}

fn default_viewport_height() -> u32 {
    900
}

fn default_nav_timeout() -> u64 {
    30_000
}

/// Audit script configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Path to a local axe-core bundle. When omitted, the script is cached
    /// under the data dir and downloaded on first use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,

    /// Rule tags passed to `axe.run` via `runOnly` (default: wcag2a, wcag2aa).
    /// An empty list runs every axe rule.
    #[serde(default = "default_run_tags")]
    pub run_tags: Vec<String>,
}

fn default_run_tags() -> Vec<String> {
    vec!["wcag2a".into(), "wcag2aa".into()]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "pretty" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "axelens_panel=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::AxeLensError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::AxeLensError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Resolve the config file path: `$AXELENS_CONFIG_PATH` or
    /// `<data dir>/config.json`.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("AXELENS_CONFIG_PATH") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        data_dir().join("config.json")
    }

    /// Panel port.
    pub fn panel_port(&self) -> u16 {
        self.panel.as_ref().map(|p| p.port).unwrap_or(8790)
    }

    /// Panel bind address. Defaults to loopback; the panel carries no auth.
    pub fn panel_bind(&self) -> String {
        self.panel
            .as_ref()
            .and_then(|p| p.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    /// Whether the browser runs headless.
    pub fn headless(&self) -> bool {
        self.browser.as_ref().map(|b| b.headless).unwrap_or(false)
    }

    /// Browser window size (width, height).
    pub fn window_size(&self) -> (u32, u32) {
        self.browser
            .as_ref()
            .map(|b| (b.window_width, b.window_height))
            .unwrap_or((1600, 940))
    }

    /// Page viewport size (width, height).
    pub fn viewport_size(&self) -> (u32, u32) {
        self.browser
            .as_ref()
            .map(|b| (b.viewport_width, b.viewport_height))
            .unwrap_or((1600, 900))
    }

    /// Navigation/CDP request timeout in ms.
    pub fn nav_timeout_ms(&self) -> u64 {
        self.browser
            .as_ref()
            .map(|b| b.nav_timeout_ms)
            .unwrap_or(30_000)
    }

    /// Configured Chrome binary path, tilde-expanded.
    pub fn chrome_path(&self) -> Option<PathBuf> {
        self.browser
            .as_ref()
            .and_then(|b| b.chrome_path.as_ref())
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
    }

    /// Configured axe-core bundle path, tilde-expanded.
    pub fn audit_script_path(&self) -> Option<PathBuf> {
        self.audit
            .as_ref()
            .and_then(|a| a.script_path.as_ref())
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
    }

    /// Rule tags for `axe.run`'s `runOnly` option.
    pub fn run_tags(&self) -> Vec<String> {
        self.audit
            .as_ref()
            .map(|a| a.run_tags.clone())
            .unwrap_or_else(default_run_tags)
    }

    /// Log format ("pretty" or "json").
    pub fn log_format(&self) -> String {
        self.logging
            .as_ref()
            .map(|l| l.format.clone())
            .unwrap_or_else(default_log_format)
    }

    /// Configured base log level, if any.
    pub fn log_level(&self) -> Option<String> {
        self.logging.as_ref().and_then(|l| l.level.clone())
    }

    /// Per-crate log filter directives.
    pub fn log_filters(&self) -> Vec<String> {
        self.logging
            .as_ref()
            .map(|l| l.filters.clone())
            .unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "panel.port", "audit.run_tags").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Set a config value by dotted path.
    pub fn set_path(&mut self, path: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| anyhow::anyhow!("Config serialization error: {e}"))?;

        let segments: Vec<&str> = path.split('.').collect();
        if segments.is_empty() {
            return Err(anyhow::anyhow!("Empty path"));
        }

        // Navigate to the parent of the target key
        let mut current = &mut json;
        for segment in &segments[..segments.len() - 1] {
            if current.get(segment).is_none() {
                current[segment] = serde_json::json!({});
            }
            current = current.get_mut(segment).unwrap();
        }

        // Set the value
        let last = segments.last().unwrap();
        current[last] = value;

        // Deserialize back
        *self = serde_json::from_value(json)
            .map_err(|e| anyhow::anyhow!("Config deserialization error: {e}"))?;
        Ok(())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(panel) = &self.panel {
            if panel.port == 0 {
                errors.push("Panel port cannot be 0".to_string());
            }
        }

        if let Some(path) = self.chrome_path() {
            if !path.exists() {
                errors.push(format!(
                    "Chrome binary not found: {}",
                    path.display()
                ));
            }
        }

        if let Some(path) = self.audit_script_path() {
            if !path.exists() {
                errors.push(format!(
                    "axe-core script not found: {}",
                    path.display()
                ));
            }
        }

        if self.run_tags().is_empty() {
            warnings.push(
                "No audit run_tags configured; audits will run every axe rule".to_string(),
            );
        }

        let (win_w, win_h) = self.window_size();
        let (vp_w, vp_h) = self.viewport_size();
        if vp_w > win_w || vp_h > win_h {
            warnings.push(format!(
                "Viewport {vp_w}x{vp_h} is larger than the browser window {win_w}x{win_h}"
            ));
        }

        (warnings, errors)
    }

    /// Save config to a file, creating its directory if needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for AxeLens data: `$AXELENS_DATA_DIR` or `~/.axelens/`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AXELENS_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".axelens")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_AXL_BIND", "0.0.0.0") };
        let input = r#"{"bind": "${TEST_AXL_BIND}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("0.0.0.0"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_AXL_BIND") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_AXL_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.panel_port(), 8790);
        assert_eq!(config.panel_bind(), "127.0.0.1");
        assert!(!config.headless());
        assert_eq!(config.window_size(), (1600, 940));
        assert_eq!(config.viewport_size(), (1600, 900));
        assert_eq!(config.nav_timeout_ms(), 30_000);
        assert_eq!(config.run_tags(), vec!["wcag2a", "wcag2aa"]);
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // local dev setup
                panel: { port: 9100 },
                browser: { headless: true, window_width: 1280, window_height: 800 },
                audit: { run_tags: ["wcag21aa"] },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.panel_port(), 9100);
        assert!(config.headless());
        assert_eq!(config.window_size(), (1280, 800));
        // Unset browser fields fall back to serde defaults.
        assert_eq!(config.viewport_size(), (1600, 900));
        assert_eq!(config.run_tags(), vec!["wcag21aa"]);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/axelens/config.json")).unwrap();
        assert_eq!(config.panel_port(), 8790);
    }

    #[test]
    fn test_logging_config_defaults() {
        // Deserialize an empty logging config to get the serde defaults
        let json_str = r#"{ "logging": {} }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "pretty");
        assert!(logging.level.is_none());
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_logging_config_json_deser() {
        let json_str = r#"{
            "logging": {
                "format": "json",
                "level": "debug",
                "filters": ["axelens_panel=trace"]
            }
        }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        assert_eq!(config.log_format(), "json");
        assert_eq!(config.log_level().as_deref(), Some("debug"));
        assert_eq!(config.log_filters(), vec!["axelens_panel=trace"]);
    }

    #[test]
    fn test_get_path() {
        let config: Config = json5::from_str(r#"{ panel: { port: 9000 } }"#).unwrap();
        assert_eq!(
            config.get_path("panel.port"),
            Some(serde_json::json!(9000))
        );
        assert_eq!(config.get_path("panel.nope"), None);
    }

    #[test]
    fn test_set_path_roundtrip() {
        let mut config = Config::default();
        config
            .set_path("browser.headless", serde_json::json!(true))
            .unwrap();
        assert!(config.headless());
        assert_eq!(
            config.get_path("browser.headless"),
            Some(serde_json::json!(true))
        );
    }

    #[test]
    fn test_validate_port_zero_errors() {
        let config: Config = json5::from_str(r#"{ panel: { port: 0 } }"#).unwrap();
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("port")),
            "Expected a port error, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_missing_chrome_path_errors() {
        let config: Config = json5::from_str(
            r#"{ browser: { chrome_path: "/nonexistent/path/chrome" } }"#,
        )
        .unwrap();
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("Chrome")),
            "Expected an error about the Chrome binary, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_empty_run_tags_warns() {
        let config: Config = json5::from_str(r#"{ audit: { run_tags: [] } }"#).unwrap();
        let (warnings, errors) = config.validate();
        assert!(errors.is_empty());
        assert!(
            warnings.iter().any(|w| w.contains("run_tags")),
            "Expected a run_tags warning, got: {warnings:?}"
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config
            .set_path("panel.port", serde_json::json!(9200))
            .unwrap();
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.panel_port(), 9200);
    }

    #[test]
    fn test_save_creates_missing_directory() {
        // `config set` is often the first command run on a machine, before
        // anything has created the data dir.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh").join("config.json");

        let mut config = Config::default();
        config
            .set_path("browser.headless", serde_json::json!(true))
            .unwrap();
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert!(reloaded.headless());
    }
}
