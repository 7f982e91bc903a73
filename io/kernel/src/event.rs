//! Lifecycle and data events delivered to the kernel's owner.

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::types::EndpointId;
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;

/// Where an error reported through [`Event::Error`] happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    /// A single endpoint; only that endpoint is torn down.
    Endpoint(EndpointId),
    /// The accept socket. Fatal to the loop.
    Accept,
    /// The readiness primitive. Fatal to the loop.
    Selector,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorContext::Endpoint(id) => write!(f, "{id}"),
            ErrorContext::Accept => f.write_str("accept"),
            ErrorContext::Selector => f.write_str("selector"),
        }
    }
}

/// An event produced by the selector loop.
///
/// Events are queued, never delivered by callback, so a slow owner cannot
/// stall the multiplexer.
#[derive(Debug)]
pub enum Event {
    /// A connection was accepted and registered.
    EndpointAdded { endpoint: Endpoint },
    /// An endpoint left the registry. Emitted exactly once per endpoint.
    EndpointRemoved { id: EndpointId, remote: SocketAddr },
    /// Bytes arrived on an endpoint. Boundaries are whatever the OS handed
    /// back; no framing is implied.
    DataReceived { id: EndpointId, data: Bytes },
    /// An error was reported to the owner.
    Error { context: ErrorContext, error: Error },
}

impl Event {
    /// The endpoint this event concerns, if any.
    pub fn endpoint_id(&self) -> Option<EndpointId> {
        match self {
            Event::EndpointAdded { endpoint } => Some(endpoint.id()),
            Event::EndpointRemoved { id, .. } => Some(*id),
            Event::DataReceived { id, .. } => Some(*id),
            Event::Error {
                context: ErrorContext::Endpoint(id),
                ..
            } => Some(*id),
            Event::Error { .. } => None,
        }
    }
}
