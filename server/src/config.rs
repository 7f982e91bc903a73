//! Relay configuration.
//!
//! Loaded from a TOML file. Every section is optional; missing fields take
//! their defaults.

use io_kernel::KernelConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Relay configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listen address and relay behavior
    #[serde(default)]
    pub relay: RelayConfig,

    /// Selector and socket tuning, passed through to the kernel
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Admin endpoint serving health checks and metrics
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve `/health`, `/ready` and `/metrics`
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_address")]
    pub address: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

/// What the relay does with the bytes it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Send bytes back to the endpoint they came from.
    #[default]
    Echo,
    /// Send bytes to every other connected endpoint.
    Broadcast,
}

impl RelayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::Echo => "echo",
            RelayMode::Broadcast => "broadcast",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Address to accept connections on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// "echo" or "broadcast"
    #[serde(default)]
    pub mode: RelayMode,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            mode: RelayMode::default(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7000))
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-field output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line abbreviated output
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    /// RUST_LOG takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_true")]
    pub timestamps: bool,

    #[serde(default)]
    pub thread_names: bool,

    #[serde(default = "default_true")]
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            thread_names: false,
            target: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.kernel.read_buffer_size == 0 {
            return Err("kernel.read_buffer_size must be greater than zero".into());
        }

        if self.kernel.event_capacity == 0 {
            return Err("kernel.event_capacity must be greater than zero".into());
        }

        if self.kernel.poll_capacity == 0 {
            return Err("kernel.poll_capacity must be greater than zero".into());
        }

        if self.kernel.backlog <= 0 {
            return Err(format!("kernel.backlog ({}) must be positive", self.kernel.backlog).into());
        }

        if self.metrics.enabled && self.metrics.address == self.relay.listen {
            return Err(format!(
                "metrics.address ({}) must differ from relay.listen",
                self.metrics.address
            )
            .into());
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" | "off" => {}
            other => return Err(format!("invalid logging.level: '{other}'").into()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.relay.listen, default_listen());
        assert_eq!(config.relay.mode, RelayMode::Echo);
        assert_eq!(config.kernel.read_buffer_size, 8192);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.address, default_metrics_address());
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_read_buffer_rejected() {
        let config: Config = toml::from_str(
            r#"
            [kernel]
            read_buffer_size = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_on_relay_port_rejected() {
        let config: Config = toml::from_str(
            r#"
            [relay]
            listen = "127.0.0.1:7000"

            [metrics]
            address = "127.0.0.1:7000"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "loud"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
