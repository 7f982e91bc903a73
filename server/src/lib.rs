//! Relay server built on io-kernel.
//!
//! Accepts TCP connections on one selector thread and either echoes received
//! bytes back to their sender or fans them out to every other connection.

pub mod admin;
pub mod banner;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod relay;
pub mod signal;

pub use config::{Config, RelayMode};
