//! Relay metrics.

use metriken::{Counter, metric};

#[metric(
    name = "relay_messages",
    description = "DataReceived events handled by the relay"
)]
pub static MESSAGES: Counter = Counter::new();

#[metric(
    name = "relay_bytes_in",
    description = "Bytes received by the relay"
)]
pub static BYTES_IN: Counter = Counter::new();

#[metric(
    name = "relay_deliveries",
    description = "Per-endpoint sends queued by the relay"
)]
pub static DELIVERIES: Counter = Counter::new();

#[metric(
    name = "relay_errors",
    description = "Error events reported by the kernel"
)]
pub static ERRORS: Counter = Counter::new();
