//! Configuration management for the toolwire server
//!
//! Handles environment variables, defaults and validation of the server
//! identity advertised during the `initialize` handshake.

use validator::Validate;

use crate::error::{ConfigError, Result};

/// Default MCP protocol version advertised to clients
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Default server name
pub const DEFAULT_SERVER_NAME: &str = "toolwire";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for the toolwire server
#[derive(Debug, Clone, Validate)]
pub struct Config {
    /// Server name reported in `serverInfo`
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    /// Server version reported in `serverInfo`
    #[validate(length(min = 1, max = 64))]
    pub version: String,

    /// Protocol version reported in the `initialize` result
    #[validate(length(min = 1, max = 32))]
    pub protocol_version: String,

    /// Log filter directive (e.g. `info`, `debug`, `toolwire=trace`)
    #[validate(length(min = 1))]
    pub log_level: String,
}

impl Config {
    /// Create a new configuration from the environment, falling back to defaults
    pub fn new() -> Result<Self> {
        let config = Self {
            name: env_or("TOOLWIRE_SERVER_NAME", DEFAULT_SERVER_NAME),
            version: env_or("TOOLWIRE_SERVER_VERSION", env!("CARGO_PKG_VERSION")),
            protocol_version: env_or("TOOLWIRE_PROTOCOL_VERSION", DEFAULT_PROTOCOL_VERSION),
            log_level: env_or("TOOLWIRE_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        };
        config.check()?;
        Ok(config)
    }

    /// Validate field constraints
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(ConfigError::from)?;
        Ok(())
    }

    /// Apply command-line overrides on top of this configuration
    pub fn with_overrides(
        mut self,
        name: Option<String>,
        version: Option<String>,
        protocol_version: Option<String>,
        log_level: Option<String>,
    ) -> Result<Self> {
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(version) = version {
            self.version = version;
        }
        if let Some(protocol_version) = protocol_version {
            self.protocol_version = protocol_version;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
        self.check()?;
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
