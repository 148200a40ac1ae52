// Gateway configuration
//
// Configuration comes from environment variables, with CLI flags applied on
// top by the binary. There is no configuration file.
//
// - ALLOW_COMMANDS / ALLOWED_COMMANDS: comma-separated allowlist
// - SHELL_GATEWAY_LOG_LEVEL, SHELL_GATEWAY_LOG_FORMAT
// - SHELL_GATEWAY_METRICS_ENABLED, SHELL_GATEWAY_METRICS_PORT

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::tools::AllowList;

pub const ALLOW_COMMANDS_VAR: &str = "ALLOW_COMMANDS";
pub const ALLOWED_COMMANDS_VAR: &str = "ALLOWED_COMMANDS";
pub const LOG_LEVEL_VAR: &str = "SHELL_GATEWAY_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "SHELL_GATEWAY_LOG_FORMAT";
pub const METRICS_ENABLED_VAR: &str = "SHELL_GATEWAY_METRICS_ENABLED";
pub const METRICS_PORT_VAR: &str = "SHELL_GATEWAY_METRICS_PORT";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Program names that may be executed
    pub allowed_commands: Vec<String>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve Prometheus metrics
    pub enabled: bool,

    /// Port for metrics server
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unparseable numeric or boolean values keep their defaults. Level and
    /// format strings are taken as given and checked by [`Config::validate`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let allowed: Vec<String> = [ALLOW_COMMANDS_VAR, ALLOWED_COMMANDS_VAR]
            .iter()
            .filter_map(|key| lookup(*key))
            .flat_map(|value| {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .collect();
        config.allowed_commands = AllowList::new(allowed).as_slice().to_vec();

        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            config.logging.level = level;
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            config.logging.format = format;
        }

        if let Some(enabled) = lookup(METRICS_ENABLED_VAR) {
            config.metrics.enabled = parse_flag(&enabled).unwrap_or(config.metrics.enabled);
        }
        if let Some(port) = lookup(METRICS_PORT_VAR) {
            if let Ok(port) = port.trim().parse::<u16>() {
                config.metrics.port = port;
            }
        }

        config
    }

    /// Replace the allowlist with a comma-separated list, as given on the command line
    pub fn override_allowed_commands(&mut self, list: &str) {
        self.allowed_commands = AllowList::parse(list).as_slice().to_vec();
    }

    /// The allowlist the gateway should enforce
    pub fn allowlist(&self) -> AllowList {
        AllowList::new(self.allowed_commands.iter().cloned())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
