//! # Configuration Management
//!
//! Centralized configuration for the POP3 server.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults, overridden by the command line
//!
//! ## Defaults
//! - Idle timeout of 10 minutes, the autologout floor of RFC 1939
//! - Command lines capped at 4 KiB so a misbehaving client cannot grow the
//!   reassembly buffer without bound

use crate::error::{Pop3Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Standard POP3 port
pub const DEFAULT_PORT: u16 = 110;

/// Maximum accepted command line length in bytes, terminator excluded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Inactivity period after which a session is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Grace period for open sessions once shutdown starts
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Greeting sent on accept
pub const DEFAULT_GREETING: &str = "POP3 server ready";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Pop3Config {
    /// Listener and maildrop settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Pop3Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| Pop3Error::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| Pop3Error::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| Pop3Error::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `POP3_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("POP3_PORT") {
            self.server.port = port
                .parse::<u16>()
                .map_err(|e| Pop3Error::ConfigError(format!("Invalid POP3_PORT '{port}': {e}")))?;
        }

        if let Ok(dir) = std::env::var("POP3_BASE_DIRECTORY") {
            self.server.base_directory = PathBuf::from(dir);
        }

        if let Ok(timeout) = std::env::var("POP3_IDLE_TIMEOUT_MS") {
            let millis = timeout.parse::<u64>().map_err(|e| {
                Pop3Error::ConfigError(format!("Invalid POP3_IDLE_TIMEOUT_MS '{timeout}': {e}"))
            })?;
            self.server.idle_timeout = Duration::from_millis(millis);
        }

        if let Ok(length) = std::env::var("POP3_MAX_LINE_LENGTH") {
            self.server.max_line_length = length.parse::<usize>().map_err(|e| {
                Pop3Error::ConfigError(format!("Invalid POP3_MAX_LINE_LENGTH '{length}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Pop3Error::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g. "0.0.0.0")
    pub bind_address: String,

    /// TCP port to listen on
    pub port: u16,

    /// Directory holding one maildrop subdirectory per user
    pub base_directory: PathBuf,

    /// Longest command line accepted before the line is discarded
    pub max_line_length: usize,

    /// Inactivity period before autologout
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// How long shutdown waits for open sessions to finish
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Text of the `+OK` greeting
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: DEFAULT_PORT,
            base_directory: PathBuf::from("maildrops"),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            greeting: String::from(DEFAULT_GREETING),
        }
    }
}

impl ServerConfig {
    /// Socket address built from `bind_address` and `port`
    pub fn listen_address(&self) -> Result<SocketAddr> {
        let ip = self.bind_address.parse::<IpAddr>().map_err(|e| {
            Pop3Error::ConfigError(format!("Invalid bind address '{}': {e}", self.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.bind_address.parse::<IpAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address: '{}' (expected an IP address such as '0.0.0.0')",
                self.bind_address
            ));
        }

        if self.port == 0 {
            errors.push("Port must be greater than 0".to_string());
        }

        if self.base_directory.as_os_str().is_empty() {
            errors.push("Base directory cannot be empty".to_string());
        } else if self.base_directory.exists() && !self.base_directory.is_dir() {
            errors.push(format!(
                "Base directory is not a directory: {}",
                self.base_directory.display()
            ));
        }

        if self.max_line_length < 64 {
            errors.push("Max line length too small (minimum: 64 bytes)".to_string());
        } else if self.max_line_length > 1024 * 1024 {
            errors.push(format!(
                "Max line length too large: {} bytes (maximum: 1 MB)",
                self.max_line_length
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 24 * 3600 {
            errors.push("Idle timeout too long (maximum: 24 hours)".to_string());
        }

        if self.shutdown_timeout.as_secs() > 300 {
            errors.push("Shutdown timeout too long (maximum: 5 minutes)".to_string());
        }

        if self.greeting.contains(['\r', '\n']) {
            errors.push("Greeting must be a single line".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("pop3d"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
