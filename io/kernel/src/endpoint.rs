//! Endpoint handles.
//!
//! An [`Endpoint`] is a cheap, cloneable handle to one connection owned by
//! the selector loop. Any thread may send on it or close it; the socket
//! itself is only ever touched by the selector thread.

use crate::error::Error;
use crate::queue::OutboundQueue;
use crate::shared::Shared;
use crate::types::{CloseState, EndpointId};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<Inner>,
}

struct Inner {
    id: EndpointId,
    remote: SocketAddr,
    local: SocketAddr,
    queue: Mutex<OutboundQueue>,
    connected: AtomicBool,
    removed: AtomicBool,
    shared: Arc<Shared>,
}

impl Endpoint {
    pub(crate) fn new(
        id: EndpointId,
        remote: SocketAddr,
        local: SocketAddr,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                remote,
                local,
                queue: Mutex::new(OutboundQueue::new()),
                connected: AtomicBool::new(true),
                removed: AtomicBool::new(false),
                shared,
            }),
        }
    }

    pub fn id(&self) -> EndpointId {
        self.inner.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.remote
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local
    }

    /// Queue a copy of `data` for transmission.
    pub fn send(&self, data: &[u8]) -> Result<(), Error> {
        self.send_bytes(Bytes::copy_from_slice(data))
    }

    /// Queue `data` for transmission without copying it.
    ///
    /// Fails with [`Error::ClosedEndpoint`] once the endpoint has left the
    /// `Open` state; nothing is queued in that case.
    pub fn send_bytes(&self, data: Bytes) -> Result<(), Error> {
        if !self.enqueue(data) {
            return Err(Error::ClosedEndpoint(self.inner.id));
        }
        self.inner.shared.wake();
        Ok(())
    }

    /// Close the endpoint.
    ///
    /// With `flush_first`, everything queued so far is written before the
    /// socket closes. Without it, pending data is discarded and the selector
    /// tears the connection down on its next iteration. Closing a closed
    /// endpoint does nothing.
    pub fn close(&self, flush_first: bool) {
        if flush_first {
            if self.inner.queue.lock().close_after_flush() {
                tracing::debug!(id = %self.inner.id, "closing after flush");
                self.inner.shared.wake();
            }
            return;
        }

        let discarded = {
            let mut queue = self.inner.queue.lock();
            if queue.state() == CloseState::Closed {
                return;
            }
            queue.close_now()
        };
        tracing::debug!(id = %self.inner.id, discarded, "closing");
        self.inner.shared.request_close(self.inner.id);
    }

    /// Close immediately and block until the selector has torn the
    /// connection down.
    ///
    /// Must not be called from the selector thread.
    pub fn close_and_wait(&self) {
        self.close(false);
        self.inner.shared.wait_removed(self);
    }

    /// Whether the connection is still up, as last observed by the selector.
    ///
    /// Advisory only: a disconnect may be in flight.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CloseState {
        self.inner.queue.lock().state()
    }

    /// Frames still queued, including a pending close marker.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Data bytes still queued.
    pub fn pending_bytes(&self) -> usize {
        self.inner.queue.lock().pending_bytes()
    }

    // ---- crate internal ---------------------------------------------------

    /// Append without waking the selector. Used by broadcast, which wakes
    /// once for the whole fan-out.
    pub(crate) fn enqueue(&self, data: Bytes) -> bool {
        self.inner.queue.lock().push(data)
    }

    pub(crate) fn queue(&self) -> &Mutex<OutboundQueue> {
        &self.inner.queue
    }

    /// Called by the selector when the connection goes away.
    pub(crate) fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::Release);
        self.inner.queue.lock().close_now();
    }

    pub(crate) fn set_removed(&self) {
        self.inner.removed.store(true, Ordering::Release);
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::Acquire)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Endpoint {}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.inner.id)
            .field("remote", &self.inner.remote)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.inner.id, self.inner.remote)
    }
}
