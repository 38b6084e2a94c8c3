//! # Configuration Management
//!
//! Centralized configuration for the ingest server.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variable overrides via `from_env()`
//! - Direct instantiation with defaults
//!
//! Process bootstrap (CLI flags, config discovery) lives outside this
//! crate; this module only defines the shape and validation of the
//! settings the core consumes.

use crate::core::checksum::ChecksumMode;
use crate::error::{AvlError, Result};
use crate::protocol::identity::IMEI_LEN;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Top-level configuration for the ingest server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IngestConfig {
    /// Listener and session settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl IngestConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| AvlError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| AvlError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| AvlError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("AVL_INGEST_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(timeout) = std::env::var("AVL_INGEST_IDLE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(cap) = std::env::var("AVL_INGEST_BUFFER_CAP_BYTES") {
            if let Ok(val) = cap.parse::<usize>() {
                config.server.buffer_cap_bytes = val;
            }
        }

        if let Ok(list) = std::env::var("AVL_INGEST_ALLOWED_IMEIS") {
            config.server.allowed_imeis = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means valid.
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
            Err(AvlError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener and per-session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:3030")
    pub address: String,

    /// Idle read timeout after which a silent device session is closed
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Per-device reassembly buffer cap in bytes
    pub buffer_cap_bytes: usize,

    /// IMEI allow-list; empty means every device is accepted
    #[serde(default)]
    pub allowed_imeis: Vec<String>,

    /// Which trailing-checksum algorithm, if any, to verify
    #[serde(default)]
    pub checksum_mode: ChecksumMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0:3030"),
            idle_timeout: timeout::DEFAULT_IDLE_TIMEOUT,
            buffer_cap_bytes: timeout::DEFAULT_BUFFER_CAP,
            allowed_imeis: Vec::new(),
            checksum_mode: ChecksumMode::Off,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Listen address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid listen address format: '{}' (expected format: '0.0.0.0:3030')",
                self.address
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        if self.buffer_cap_bytes < 1024 {
            errors.push("Buffer cap too small (minimum: 1 KB)".to_string());
        } else if self.buffer_cap_bytes > 100 * 1024 * 1024 {
            errors.push(format!(
                "Buffer cap too large: {} bytes (maximum recommended: 100 MB)",
                self.buffer_cap_bytes
            ));
        }

        for imei in &self.allowed_imeis {
            if imei.len() != IMEI_LEN || !imei.bytes().all(|b| b.is_ascii_digit()) {
                errors.push(format!(
                    "Allow-list entry '{imei}' is not a {IMEI_LEN}-digit IMEI"
                ));
            }
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        Vec::new()
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
