//! Command-line interface for otelscope.
//!
//! Run `otelscope` to receive OTLP on the standard ports and browse the
//! collected signals at <http://127.0.0.1:8080>.

use crate::core::{config::ConfigBuilder, Config, Result, ScopeError};
use crate::receiver::OtlpReceiver;
use crate::storage::Store;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// In-memory OTLP receiver for inspecting traces, logs and metrics
#[derive(Parser, Debug, Default)]
#[command(name = "otelscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// OTLP/gRPC port, 0 disables [default: 4317]
    #[arg(long = "grpc", env = "OTELSCOPE_GRPC_PORT")]
    pub grpc_port: Option<u16>,

    /// OTLP/HTTP port, 0 disables [default: 4318]
    #[arg(long = "http", env = "OTELSCOPE_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Port for the web UI and read API [default: 8080]
    #[arg(long = "ui", env = "OTELSCOPE_UI_PORT")]
    pub ui_port: Option<u16>,

    /// Print every received record to stdout
    #[arg(short, long, env = "OTELSCOPE_VERBOSE")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, env = "OTELSCOPE_DEBUG")]
    pub debug: bool,

    /// Directory holding the web UI assets [default: static]
    #[arg(long, env = "OTELSCOPE_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Configuration file path (default: ~/.config/otelscope/config.yaml)
    #[arg(short, long, env = "OTELSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("otelscope").join("config.yaml"))
                .filter(|p| p.exists()),
        };

        if let Some(path) = config_path {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    builder = builder.from_yaml(&content)?;
                    tracing::info!("Loaded configuration from {:?}", path);
                },
                Err(e) if self.config.is_some() => {
                    return Err(ScopeError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                },
                Err(e) => {
                    tracing::debug!("Ignoring config file {:?}: {}", path, e);
                },
            }
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(port) = self.grpc_port {
            builder = builder.grpc_port(port);
        }
        if let Some(port) = self.http_port {
            builder = builder.http_port(port);
        }
        if let Some(port) = self.ui_port {
            builder = builder.ui_port(port);
        }
        if let Some(dir) = &self.static_dir {
            builder = builder.static_dir(dir.clone());
        }
        if self.verbose {
            builder = builder.verbose(true);
        }
        builder.debug(self.debug).build()
    }

    /// Initialize logging to stderr.
    ///
    /// `RUST_LOG` takes precedence, then `--debug`, then
    /// `OTELSCOPE_LOG_LEVEL`, then `logging.level` from the config.
    pub fn init_logging(config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = log_level(config, std::env::var("OTELSCOPE_LOG_LEVEL").ok());
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.debug)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ScopeError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Filter directive for the log subscriber when `RUST_LOG` is unset.
fn log_level(config: &Config, env_level: Option<String>) -> String {
    if config.debug {
        return "debug".to_string();
    }
    env_level
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| config.logging.level.as_str().to_string())
}

/// Execute otelscope.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    Cli::init_logging(&config)?;
    tracing::debug!("Resolved configuration: {:?}", config);

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  gRPC port: {}", config.server.grpc_port);
        println!("  HTTP port: {}", config.server.http_port);
        println!("  UI port: {}", config.server.ui_port);
        println!("  Static dir: {}", config.ui.static_dir.display());
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal, stopping servers"),
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    run(config, shutdown_rx).await
}

/// Start every server for `config` and wait until all have stopped.
///
/// Servers stop once `true` is sent on `shutdown`. A bind failure is
/// returned before any request is served.
pub async fn run(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let store = Arc::new(Store::new(config.logging.verbose));

    let mut handles = OtlpReceiver::from_config(Arc::clone(&store), &config)
        .start(&shutdown)
        .await?;
    handles.extend(crate::api::start(store, &config, &shutdown).await?);

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Server task failed: {}", e);
        }
    }
    tracing::info!("All servers stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["otelscope"]).unwrap();
        assert_eq!(cli.grpc_port, None);
        assert!(!cli.verbose);
        assert!(!cli.check_config);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "otelscope",
            "--grpc",
            "0",
            "--http",
            "14318",
            "--ui",
            "18080",
            "--verbose",
            "--static-dir",
            "web",
        ])
        .unwrap();
        let config = cli.build_config_from_args(ConfigBuilder::new()).unwrap();
        assert_eq!(config.server.grpc_port, 0);
        assert_eq!(config.server.http_port, 14318);
        assert_eq!(config.server.ui_port, 18080);
        assert!(config.logging.verbose);
        assert_eq!(config.ui.static_dir, PathBuf::from("web"));
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let cli = Cli {
            http_port: Some(9999),
            ..Default::default()
        };
        let builder = ConfigBuilder::new()
            .from_yaml("server:\n  http_port: 5000\n  ui_port: 7000\n")
            .unwrap();
        let config = cli.build_config_from_args(builder).unwrap();
        assert_eq!(config.server.http_port, 9999);
        assert_eq!(config.server.ui_port, 7000);
    }

    #[test]
    fn test_conflicting_ports_rejected() {
        let cli = Cli {
            grpc_port: Some(8080),
            ..Default::default()
        };
        assert!(cli.build_config_from_args(ConfigBuilder::new()).is_err());
    }

    #[tokio::test]
    async fn test_missing_config_file_is_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/otelscope.yaml")),
            ..Default::default()
        };
        assert!(cli.load_config().await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  grpc_port: 0\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let config = cli.load_config().await.unwrap();
        assert_eq!(config.server.grpc_port, 0);
        assert_eq!(config.server.http_port, 4318);
    }

    #[test]
    fn test_log_level_precedence() {
        let yaml = ConfigBuilder::new()
            .from_yaml("logging:\n  level: warn\n")
            .unwrap();
        let config = Cli::default().build_config_from_args(yaml).unwrap();
        assert_eq!(log_level(&config, None), "warn");
        assert_eq!(log_level(&config, Some(String::new())), "warn");
        assert_eq!(log_level(&config, Some("error".into())), "error");

        let debug = Cli {
            debug: true,
            ..Default::default()
        };
        let config = debug.build_config_from_args(ConfigBuilder::new()).unwrap();
        assert!(config.debug);
        assert_eq!(log_level(&config, Some("error".into())), "debug");
        assert_eq!(log_level(&Config::default(), None), "info");
    }
}
