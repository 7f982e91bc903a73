use crate::types::EndpointId;
use std::io;
use std::net::SocketAddr;

/// Errors returned by the kernel, its endpoints and the connector.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The accept socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// Accepting a connection failed. The accept socket is considered dead.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    /// The readiness primitive failed.
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),
    /// A read or write on a single endpoint failed.
    #[error("{id}: {source}")]
    ChannelIo {
        id: EndpointId,
        #[source]
        source: io::Error,
    },
    /// The endpoint no longer accepts sends.
    #[error("{0} is closed")]
    ClosedEndpoint(EndpointId),
    /// Connecting failed, or the connection was refused, reset or aborted.
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),
    /// The connector was already closed.
    #[error("connection closed")]
    ClosedConnection,
    /// A blocking connector call timed out.
    #[error("operation timed out")]
    Timeout,
    #[error("kernel already initialized")]
    AlreadyInitialized,
    #[error("kernel not initialized")]
    NotInitialized,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error ends the selector loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Bind { .. } | Error::Accept(_) | Error::Poll(_))
    }

    /// Classify an error from a blocking connector call.
    pub(crate) fn from_connector(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Error::Connection(e),
            _ => Error::Io(e),
        }
    }
}
