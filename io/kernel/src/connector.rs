//! Blocking client connection.
//!
//! For callers that dedicate a thread to one connection and do not need the
//! selector. Shares nothing with [`Kernel`](crate::Kernel).

use crate::config::ConnectorConfig;
use crate::error::Error;
use crate::types::ReadOutcome;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};

/// A blocking TCP connection.
///
/// All methods take `&self`, so one thread can block in [`read`] while
/// another writes or closes. Closing from another thread releases a blocked
/// reader with [`Error::ClosedConnection`].
///
/// [`read`]: Connector::read
#[derive(Debug)]
pub struct Connector {
    stream: TcpStream,
    remote: SocketAddr,
    local: SocketAddr,
    closed: AtomicBool,
}

impl Connector {
    /// Connect to `addr`.
    pub fn connect(addr: SocketAddr, config: &ConnectorConfig) -> Result<Self, Error> {
        let stream = match config.connect_timeout() {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(Error::from_connector)?;

        stream.set_nodelay(config.nodelay)?;
        stream.set_read_timeout(config.read_timeout())?;
        stream.set_write_timeout(config.write_timeout())?;

        let local = stream.local_addr()?;
        tracing::debug!(addr = %addr, local = %local, "connected");

        Ok(Self {
            stream,
            remote: addr,
            local,
            closed: AtomicBool::new(false),
        })
    }

    /// Block until bytes arrive or the peer closes.
    ///
    /// Returns [`ReadOutcome::Bytes`] or [`ReadOutcome::Eof`]; a read timeout
    /// surfaces as [`Error::Timeout`]. An empty `buf` returns `Bytes(0)`
    /// without touching the socket.
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome, Error> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(ReadOutcome::Bytes(0));
        }

        loop {
            let result = (&self.stream).read(buf);

            // A concurrent close shuts the socket down, which looks like EOF
            // or a reset from here.
            if self.is_closed() {
                return Err(Error::ClosedConnection);
            }

            return match result {
                Ok(0) => Ok(ReadOutcome::Eof),
                Ok(n) => Ok(ReadOutcome::Bytes(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(Error::from_connector(e)),
            };
        }
    }

    /// Write all of `data`, blocking until it has been handed to the OS.
    pub fn write(&self, data: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        (&self.stream).write_all(data).map_err(|e| {
            if self.is_closed() {
                Error::ClosedConnection
            } else {
                Error::from_connector(e)
            }
        })
    }

    /// Close the connection. Only the first call touches the socket.
    pub fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::debug!(addr = %self.remote, "closing connector");

        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The peer got there first.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Whether the connection is open and the socket still has a peer.
    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.stream.peer_addr().is_ok()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::ClosedConnection)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port nobody is listening on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let result = Connector::connect(addr, &ConnectorConfig::default());
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let connector = Connector::connect(addr, &ConnectorConfig::default()).unwrap();
        let (_peer, _) = listener.accept().unwrap();

        assert!(connector.is_connected());
        connector.close().unwrap();
        connector.close().unwrap();
        assert!(!connector.is_connected());

        let mut buf = [0u8; 8];
        assert!(matches!(
            connector.read(&mut buf),
            Err(Error::ClosedConnection)
        ));
        assert!(matches!(
            connector.write(b"late"),
            Err(Error::ClosedConnection)
        ));
    }
}
