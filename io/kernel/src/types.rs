//! Core types for the io-kernel transport.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Endpoint Types
// ============================================================================

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique endpoint identifier.
///
/// Ids are handed out from a global counter and are never reused for the
/// lifetime of the process, even across kernels. A reconnecting peer always
/// gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        Self(NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value.
    ///
    /// This is primarily useful for testing purposes.
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw u64 value of the endpoint ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint-{}", self.0)
    }
}

/// Close state of an endpoint.
///
/// Transitions are `Open -> ClosingAfterFlush -> Closed` or `Open -> Closed`.
/// Nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseState {
    #[default]
    Open,
    /// A close marker is queued; the loop closes the socket once it is
    /// reached.
    ClosingAfterFlush,
    Closed,
}

impl CloseState {
    pub fn is_open(&self) -> bool {
        matches!(self, CloseState::Open)
    }
}

// ============================================================================
// I/O Types
// ============================================================================

/// Outcome of a single non-fatal read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were read into the buffer (always > 0).
    Bytes(usize),
    /// The peer shut down its write half.
    Eof,
    /// Nothing available right now (non-blocking sockets only).
    WouldBlock,
}

// ============================================================================
// Kernel Types
// ============================================================================

/// Lifecycle of a kernel's selector loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum KernelState {
    #[default]
    Created,
    Running,
    Stopping,
    Terminated,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelState::Created => "created",
            KernelState::Running => "running",
            KernelState::Stopping => "stopping",
            KernelState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}
