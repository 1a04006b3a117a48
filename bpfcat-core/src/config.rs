//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/bpfcat/config.toml`, with
//! environment variables overriding the service endpoints so containerized
//! deployments can wire the analyzers without a config file.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/bpfcat/` (~/.config/bpfcat/)
//! - Data: `$XDG_DATA_HOME/bpfcat/` (~/.local/share/bpfcat/)
//! - State/Logs: `$XDG_STATE_HOME/bpfcat/` (~/.local/state/bpfcat/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// REST server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database location override
    #[serde(default)]
    pub database: DatabaseConfig,

    /// External analyzer service endpoints
    #[serde(default)]
    pub analyzers: AnalyzerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Default listing page size
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound for client-requested page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_page_size() -> u32 {
    25
}

fn default_max_page_size() -> u32 {
    100
}

/// Database location override
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Override path for the SQLite file; defaults to the XDG data dir
    pub path: Option<PathBuf>,
}

/// External analyzer service endpoints
///
/// Both analyzers are opaque HTTP collaborators; the only client-side knob
/// is the request timeout. There is deliberately no retry configuration:
/// a failed analyzer call fails the single request that issued it.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    /// GitHub metadata analyzer base URL
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// eBPF primitive analyzer base URL
    #[serde(default = "default_primitive_url")]
    pub primitive_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_analyzer_timeout")]
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            primitive_url: default_primitive_url(),
            timeout_secs: default_analyzer_timeout(),
        }
    }
}

fn default_metadata_url() -> String {
    "http://analyzer:8001".to_string()
}

fn default_primitive_url() -> String {
    "http://primitive-analyzer:8002".to_string()
}

fn default_analyzer_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path and apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides)
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply environment overrides for deployment wiring.
    ///
    /// Recognized variables: `BPFCAT_BIND_ADDR`, `BPFCAT_DATABASE_PATH`,
    /// `BPFCAT_ANALYZER_URL`, `BPFCAT_PRIMITIVE_ANALYZER_URL`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("BPFCAT_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("BPFCAT_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Ok(url) = std::env::var("BPFCAT_ANALYZER_URL") {
            self.analyzers.metadata_url = url;
        }
        if let Ok(url) = std::env::var("BPFCAT_PRIMITIVE_ANALYZER_URL") {
            self.analyzers.primitive_url = url;
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/bpfcat/config.toml` (~/.config/bpfcat/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("bpfcat").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/bpfcat/` (~/.local/share/bpfcat/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("bpfcat")
    }

    /// Returns the state directory path (for logs and the preference store)
    ///
    /// `$XDG_STATE_HOME/bpfcat/` (~/.local/state/bpfcat/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("bpfcat")
    }

    /// Returns the default database file path
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("catalog.db")
    }

    /// Returns the database path, honoring the config/env override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("bpfcat.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.server.page_size, 25);
        assert_eq!(config.server.max_page_size, 100);
        assert_eq!(config.analyzers.metadata_url, "http://analyzer:8001");
        assert_eq!(config.analyzers.timeout_secs, 30);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind_addr = "127.0.0.1:9000"
page_size = 10

[analyzers]
metadata_url = "http://localhost:8001"
primitive_url = "http://localhost:8002"
timeout_secs = 5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.server.page_size, 10);
        // Unset fields keep their defaults
        assert_eq!(config.server.max_page_size, 100);
        assert_eq!(config.analyzers.metadata_url, "http://localhost:8001");
        assert_eq!(config.analyzers.timeout_secs, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_resolved_database_path_override() {
        let mut config = Config::default();
        config.database.path = Some(PathBuf::from("/tmp/bpfcat-test.db"));
        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/bpfcat-test.db")
        );
    }
}
