//! Kernel metrics.

use metriken::{Counter, Gauge, metric};

#[metric(
    name = "kernel_endpoints_accepted",
    description = "Total number of connections accepted"
)]
pub static ENDPOINTS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "kernel_endpoints_removed",
    description = "Total number of endpoints torn down"
)]
pub static ENDPOINTS_REMOVED: Counter = Counter::new();

#[metric(
    name = "kernel_endpoints_active",
    description = "Number of currently registered endpoints"
)]
pub static ENDPOINTS_ACTIVE: Gauge = Gauge::new();

#[metric(
    name = "kernel_bytes_received",
    description = "Total bytes read from endpoints"
)]
pub static BYTES_RECEIVED: Counter = Counter::new();

#[metric(
    name = "kernel_bytes_sent",
    description = "Total bytes written to endpoints"
)]
pub static BYTES_SENT: Counter = Counter::new();

#[metric(
    name = "kernel_channel_errors",
    description = "Read or write failures isolated to a single endpoint"
)]
pub static CHANNEL_ERRORS: Counter = Counter::new();

#[metric(
    name = "kernel_broadcasts",
    description = "Total broadcast requests"
)]
pub static BROADCASTS: Counter = Counter::new();

#[metric(
    name = "kernel_wakeups",
    description = "Total explicit wakeups of the selector"
)]
pub static WAKEUPS: Counter = Counter::new();

#[metric(
    name = "kernel_events_dropped",
    description = "Events abandoned because the queue was full during shutdown"
)]
pub static EVENTS_DROPPED: Counter = Counter::new();
