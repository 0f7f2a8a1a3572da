use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use axelens_browser::{AuditDriver, BrowserSession};
use axelens_core::config::Config;
use axelens_panel::events::forward_session_events;
use axelens_panel::{PanelState, start_panel};

#[derive(Parser)]
#[command(
    name = "axelens",
    about = "Accessibility audit panel — drive Chrome, run axe-core, inspect reports",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the report panel server
    Panel {
        /// Port to listen on (default: 8790)
        #[arg(long)]
        port: Option<u16>,

        /// Bind address (default: 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,

        /// Serve only the WebSocket API, without the report UI
        #[arg(long)]
        no_ui: bool,
    },

    /// Audit a single URL and print the results
    Audit {
        /// URL to audit
        url: String,

        /// Print the full axe results as JSON
        #[arg(long)]
        json: bool,

        /// Run Chrome headless even if the config says otherwise
        #[arg(long)]
        headless: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system status
    Status,

    /// Diagnose common issues
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::config_path);

    let config = Config::load(&config_path)?;

    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Panel { port, bind, no_ui } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.set_path("panel.bind", serde_json::Value::String(bind))?;
            }
            let port = port.unwrap_or_else(|| config.panel_port());
            let config = Arc::new(config);

            let (session_tx, session_rx) = mpsc::unbounded_channel();
            let session = BrowserSession::new(config.clone()).with_events(session_tx);
            let driver: Arc<dyn AuditDriver> = Arc::new(session);

            let state = Arc::new(PanelState::new(config, driver));
            tokio::spawn(forward_session_events(state.clone(), session_rx));

            tracing::info!("Starting AxeLens panel on port {port}");
            start_panel(state, port, !no_ui).await?;
        }
        Commands::Audit { url, json, headless } => {
            let mut config = config;
            if headless {
                config.set_path("browser.headless", serde_json::Value::Bool(true))?;
            }
            run_one_shot_audit(Arc::new(config), &url, json).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("Key not found: {key}");
                    std::process::exit(1);
                }
            },
            ConfigAction::Set { key, value } => {
                let mut config = config;
                // Bare words become strings; anything JSON-shaped is parsed as JSON
                let value = serde_json::from_str(&value)
                    .unwrap_or(serde_json::Value::String(value));
                config.set_path(&key, value)?;
                config.save(&config_path)?;
                println!("Updated {key}");
            }
        },
        Commands::Status => {
            println!("AxeLens v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Data dir: {}", axelens_core::config::data_dir().display());
            println!("Panel port: {}", config.panel_port());
            match config
                .chrome_path()
                .or_else(axelens_browser::detect::detect_chrome)
            {
                Some(path) => println!("Chrome: {}", path.display()),
                None => println!("Chrome: not found"),
            }
            match config.audit_script_path() {
                Some(path) => println!("axe-core: {}", path.display()),
                None => println!("axe-core: {} (cached on first use)", axelens_browser::script::AXE_CORE_URL),
            }
        }
        Commands::Doctor => {
            run_doctor(&config);
        }
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) {
    let mut directives = vec![if verbose {
        "debug".to_string()
    } else {
        config.log_level().unwrap_or_else(|| "info".to_string())
    }];
    directives.extend(config.log_filters());
    let fallback = directives.join(",");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    if config.log_format() == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Launch, audit once, print, and shut the browser down.
async fn run_one_shot_audit(config: Arc<Config>, url: &str, json: bool) -> anyhow::Result<()> {
    let session = BrowserSession::new(config);

    tracing::info!(url, "Launching browser");
    session.launch(url).await?;

    let results = session.run_audit().await?;
    session.close().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("Audited: {}", results.url.as_deref().unwrap_or(url));
    println!("Violations: {}", results.violations.len());
    for violation in &results.violations {
        let impact = violation.impact.as_deref().unwrap_or("unknown");
        println!(
            "  [{}] {} ({} nodes): {}",
            impact,
            violation.id,
            violation.nodes.len(),
            violation.help
        );
    }
    if let Some(passes) = &results.passes {
        println!("Passes: {}", passes.len());
    }
    if let Some(inapplicable) = &results.inapplicable {
        println!("Inapplicable: {}", inapplicable.len());
    }

    if results.violations.is_empty() {
        Ok(())
    } else {
        std::process::exit(2);
    }
}

fn run_doctor(config: &Config) {
    let mut problems = 0;

    match config
        .chrome_path()
        .or_else(axelens_browser::detect::detect_chrome)
    {
        Some(path) => println!("ok: Chrome found at {}", path.display()),
        None => {
            println!("fail: no Chrome or Chromium binary found; set browser.chrome_path or AXELENS_CHROME");
            problems += 1;
        }
    }

    let (warnings, errors) = config.validate();
    for warning in &warnings {
        println!("warn: {warning}");
    }
    for error in &errors {
        println!("fail: {error}");
        problems += 1;
    }

    if axelens_browser::script::cache_path().exists() {
        println!("ok: axe-core bundle cached");
    } else {
        println!("note: axe-core bundle not cached yet, will download on first audit");
    }

    if problems == 0 {
        println!("All checks passed");
    } else {
        println!("{problems} problem(s) found");
        std::process::exit(1);
    }
}
