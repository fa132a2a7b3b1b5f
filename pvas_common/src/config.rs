//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all pvas applications.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pvas_common::config::{ConfigLoader, ConfigError, ServerConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ServerConfig::load(Path::new("server.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_MONITOR_QUEUE_SIZE, DEFAULT_SERVER_PROVIDER_NAME, MIN_MONITOR_QUEUE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared across all pvas applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "pvas-demo-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "pvas".to_string(),
        }
    }
}

/// One shared PV hosted by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PvConfig {
    /// PV name clients connect to.
    pub name: String,

    /// Initial scalar value the PV is opened with.
    #[serde(default)]
    pub initial: f64,

    /// Reject client puts.
    #[serde(default)]
    pub read_only: bool,
}

/// Server configuration (`server.toml`).
///
/// # TOML Example
///
/// ```toml
/// provider_name = "pvas"
/// debug_level = 0
/// monitor_queue_size = 4
///
/// [shared]
/// service_name = "pvas-demo"
///
/// [[pvs]]
/// name = "demo:counter"
/// initial = 0.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Common fields.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Name the static provider is registered under.
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    /// Diagnostic verbosity copied into every shared PV.
    #[serde(default)]
    pub debug_level: i32,

    /// Monitor queue depth used when a request does not specify one.
    #[serde(default = "default_monitor_queue_size")]
    pub monitor_queue_size: usize,

    /// Hosted PVs.
    #[serde(default)]
    pub pvs: Vec<PvConfig>,
}

fn default_provider_name() -> String {
    DEFAULT_SERVER_PROVIDER_NAME.to_string()
}

fn default_monitor_queue_size() -> usize {
    DEFAULT_MONITOR_QUEUE_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            provider_name: default_provider_name(),
            debug_level: 0,
            monitor_queue_size: default_monitor_queue_size(),
            pvs: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared` is invalid
    /// - `provider_name` is empty
    /// - `monitor_queue_size` is below the minimum
    /// - a PV name is empty or duplicated
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.provider_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider_name cannot be empty".to_string(),
            ));
        }
        if self.monitor_queue_size < MIN_MONITOR_QUEUE_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "monitor_queue_size {} below minimum {}",
                self.monitor_queue_size, MIN_MONITOR_QUEUE_SIZE
            )));
        }

        let mut seen = HashSet::new();
        for pv in &self.pvs {
            if pv.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "pv name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(pv.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate pv name '{}'",
                    pv.name
                )));
            }
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
