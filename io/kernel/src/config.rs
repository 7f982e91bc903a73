//! Kernel and connector configuration.
//!
//! Both structs deserialize from TOML tables; every field has a default so an
//! empty table is valid.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for a [`Kernel`](crate::Kernel).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelConfig {
    /// Address to host on when `initialize` is not given one.
    /// Defaults to an ephemeral port on all interfaces.
    #[serde(default)]
    pub bind: Option<SocketAddr>,

    /// TCP listen backlog.
    #[serde(default = "default_backlog")]
    pub backlog: i32,

    /// Enable TCP_NODELAY on accepted connections.
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// Size of the scratch buffer reads land in before being copied into
    /// events.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Capacity of the bounded event queue drained by the owner.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Maximum readiness events handled per poll.
    #[serde(default = "default_poll_capacity")]
    pub poll_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            bind: None,
            backlog: default_backlog(),
            nodelay: default_nodelay(),
            read_buffer_size: default_read_buffer_size(),
            event_capacity: default_event_capacity(),
            poll_capacity: default_poll_capacity(),
        }
    }
}

impl KernelConfig {
    /// Address used when none is passed to `initialize`.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind.unwrap_or_else(default_bind)
    }
}

/// Configuration for a blocking [`Connector`](crate::Connector).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Connect timeout in milliseconds. Unset blocks for the OS default.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout in milliseconds. Unset blocks indefinitely.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// Write timeout in milliseconds. Unset blocks indefinitely.
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,

    /// Enable TCP_NODELAY.
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            nodelay: default_nodelay(),
        }
    }
}

impl ConnectorConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.write_timeout_ms)
    }
}

// std rejects zero-length socket timeouts, so 0 means "none".
fn non_zero_millis(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

fn default_backlog() -> i32 {
    1024
}

fn default_nodelay() -> bool {
    true
}

fn default_read_buffer_size() -> usize {
    8192
}

fn default_event_capacity() -> usize {
    65536
}

fn default_poll_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_defaults() {
        let config = KernelConfig::default();
        assert!(config.bind.is_none());
        assert_eq!(config.backlog, 1024);
        assert!(config.nodelay);
        assert_eq!(config.read_buffer_size, 8192);
        assert_eq!(config.event_capacity, 65536);
        assert_eq!(config.poll_capacity, 1024);
        assert_eq!(config.bind_addr(), "0.0.0.0:0".parse().unwrap());
    }

    #[test]
    fn test_connector_timeouts() {
        let config = ConnectorConfig {
            connect_timeout_ms: Some(250),
            read_timeout_ms: Some(0),
            write_timeout_ms: None,
            nodelay: false,
        };
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.write_timeout(), None);
    }
}
