//! Configuration management for otelscope.
//!
//! Settings are resolved in order of precedence:
//! - CLI arguments and their environment variables
//! - YAML config file
//! - Defaults

use crate::core::{Result, ScopeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for otelscope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener ports
    pub server: ServerConfig,
    /// Web front-end configuration
    pub ui: UiConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// OTLP/gRPC port, 0 disables the receiver
    pub grpc_port: u16,
    /// OTLP/HTTP port, 0 disables the receiver
    pub http_port: u16,
    /// Port for the read API and static front-end
    pub ui_port: u16,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Directory served at `/`
    pub static_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Print every interned and ingested record to stdout
    pub verbose: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            grpc_port: 4317,
            http_port: 4318,
            ui_port: 8080,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            verbose: false,
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;

        if server.ui_port == 0 {
            return Err(ScopeError::config("ui_port must be greater than 0"));
        }

        let ports = [
            ("grpc", server.grpc_port),
            ("http", server.http_port),
            ("ui", server.ui_port),
        ];
        for (i, (name_a, a)) in ports.iter().enumerate() {
            for (name_b, b) in &ports[i + 1..] {
                if *a != 0 && a == b {
                    return Err(ScopeError::config(format!(
                        "{} and {} ports must be different: both set to {}",
                        name_a, name_b, a
                    )));
                }
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| ScopeError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set gRPC port
    pub fn grpc_port(mut self, port: u16) -> Self {
        self.config.server.grpc_port = port;
        self
    }

    /// Set HTTP port
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.server.http_port = port;
        self
    }

    /// Set UI port
    pub fn ui_port(mut self, port: u16) -> Self {
        self.config.server.ui_port = port;
        self
    }

    /// Set static asset directory
    pub fn static_dir(mut self, path: PathBuf) -> Self {
        self.config.ui.static_dir = path;
        self
    }

    /// Enable record dumps to stdout
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.logging.verbose = verbose;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
