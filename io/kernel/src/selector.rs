//! The selector loop.
//!
//! This is the only code that touches the poll registry, the accept socket
//! and the connection sockets. It runs on its own thread; everything else
//! talks to it through [`Shared`].
//!
//! Each connection is either read-interested or write-interested, never
//! both. While an endpoint has queued frames it is registered for
//! writability only, and goes back to readability once the queue drains.
//! Reads and writes on one socket therefore never interleave within an
//! iteration.

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::event::{ErrorContext, Event};
use crate::metrics::{
    BYTES_RECEIVED, BYTES_SENT, CHANNEL_ERRORS, ENDPOINTS_ACCEPTED, ENDPOINTS_ACTIVE,
    ENDPOINTS_REMOVED, EVENTS_DROPPED,
};
use crate::queue::Flush;
use crate::shared::{Command, Shared};
use crate::types::{EndpointId, KernelState, ReadOutcome};
use bytes::Bytes;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use mio::net::{TcpListener as MioTcpListener, TcpStream as MioTcpStream};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Token for the accept socket. Connection tokens are slab slots and stay
/// well below this.
pub(crate) const LISTENER_TOKEN: Token = Token(1 << 30);

/// Token for the cross-thread waker.
pub(crate) const WAKER_TOKEN: Token = Token((1 << 30) + 1);

/// How long a blocked event send waits before re-checking for shutdown.
const EMIT_SLICE: Duration = Duration::from_millis(50);

/// A registered connection.
struct Connection {
    stream: MioTcpStream,
    endpoint: Endpoint,
    interest: Interest,
}

/// Readiness reported for one token in one poll.
#[derive(Clone, Copy)]
struct Readiness {
    token: Token,
    readable: bool,
    writable: bool,
    error: bool,
}

pub(crate) struct SelectorLoop {
    poll: Poll,
    events: Events,
    listener: MioTcpListener,
    local_addr: SocketAddr,
    connections: Slab<Connection>,
    slots: HashMap<EndpointId, usize>,
    scratch: Vec<u8>,
    ready: Vec<Readiness>,
    nodelay: bool,
    shared: Arc<Shared>,
    commands: Receiver<Command>,
    event_tx: Sender<Event>,
    /// Events raised while an earlier one is still waiting for queue space.
    backlog: VecDeque<Event>,
    emitting: bool,
}

pub(crate) struct LoopParts {
    pub poll: Poll,
    pub listener: MioTcpListener,
    pub local_addr: SocketAddr,
    pub poll_capacity: usize,
    pub read_buffer_size: usize,
    pub nodelay: bool,
    pub shared: Arc<Shared>,
    pub commands: Receiver<Command>,
    pub event_tx: Sender<Event>,
}

impl SelectorLoop {
    pub(crate) fn new(parts: LoopParts) -> Self {
        Self {
            poll: parts.poll,
            events: Events::with_capacity(parts.poll_capacity.max(1)),
            listener: parts.listener,
            local_addr: parts.local_addr,
            connections: Slab::with_capacity(64),
            slots: HashMap::new(),
            scratch: vec![0; parts.read_buffer_size.max(1)],
            ready: Vec::with_capacity(parts.poll_capacity.max(1)),
            nodelay: parts.nodelay,
            shared: parts.shared,
            commands: parts.commands,
            event_tx: parts.event_tx,
            backlog: VecDeque::new(),
            emitting: false,
        }
    }

    /// Run until asked to stop or until a fatal error.
    pub(crate) fn run(mut self) -> Result<(), Error> {
        tracing::debug!(addr = %self.local_addr, "selector started");

        let result = self.run_inner();

        if let Err(e) = &result {
            tracing::error!(addr = %self.local_addr, error = %e, "selector failed");
        }

        self.shutdown();
        result
    }

    fn run_inner(&mut self) -> Result<(), Error> {
        while !self.shared.is_stopping() {
            self.process_commands();
            self.update_interest();

            if let Err(e) = self.poll.poll(&mut self.events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                if self.shared.is_stopping() {
                    return Ok(());
                }
                self.report(ErrorContext::Selector, Error::Poll(duplicate(&e)));
                return Err(Error::Poll(e));
            }

            self.ready.clear();
            self.ready.extend(self.events.iter().map(|e| Readiness {
                token: e.token(),
                readable: e.is_readable() || e.is_read_closed(),
                writable: e.is_writable() || e.is_write_closed(),
                error: e.is_error(),
            }));

            for i in 0..self.ready.len() {
                let readiness = self.ready[i];
                match readiness.token {
                    LISTENER_TOKEN => {
                        if let Err(e) = self.accept_pending() {
                            if self.shared.is_stopping() {
                                return Ok(());
                            }
                            self.report(ErrorContext::Accept, Error::Accept(duplicate(&e)));
                            return Err(Error::Accept(e));
                        }
                    }
                    // Commands are picked up at the top of the next iteration.
                    WAKER_TOKEN => {}
                    Token(slot) => self.ready_connection(slot, readiness),
                }
            }
        }

        Ok(())
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Close(id) => {
                    if let Some(&slot) = self.slots.get(&id) {
                        self.teardown(slot, None);
                    }
                }
            }
        }
    }

    /// Re-derive each connection's interest from its queue.
    fn update_interest(&mut self) {
        let mut failed = Vec::new();

        for (slot, conn) in self.connections.iter_mut() {
            let wanted = if conn.endpoint.queue().lock().has_pending() {
                Interest::WRITABLE
            } else {
                Interest::READABLE
            };

            if wanted == conn.interest {
                continue;
            }

            match self
                .poll
                .registry()
                .reregister(&mut conn.stream, Token(slot), wanted)
            {
                Ok(()) => conn.interest = wanted,
                Err(e) => failed.push((slot, e)),
            }
        }

        for (slot, e) in failed {
            self.teardown(slot, Some(e));
        }
    }

    fn ready_connection(&mut self, slot: usize, readiness: Readiness) {
        let Some(conn) = self.connections.get_mut(slot) else {
            return;
        };

        if readiness.error {
            match conn.stream.take_error() {
                Ok(Some(e)) | Err(e) => {
                    self.teardown(slot, Some(e));
                    return;
                }
                Ok(None) => {}
            }
        }

        if conn.interest == Interest::WRITABLE {
            if readiness.writable {
                self.write(slot);
            }
        } else if readiness.readable {
            self.read(slot);
        }
    }

    fn write(&mut self, slot: usize) {
        let Some(conn) = self.connections.get_mut(slot) else {
            return;
        };

        let result = conn.endpoint.queue().lock().write_to(&mut conn.stream);

        match result {
            Ok((flush, written)) => {
                BYTES_SENT.add(written as u64);
                if flush == Flush::CloseReached {
                    tracing::debug!(id = %conn.endpoint.id(), "flushed, closing");
                    self.teardown(slot, None);
                }
            }
            Err(e) => self.teardown(slot, Some(e)),
        }
    }

    /// Read until the socket would block. Edge-triggered readiness means a
    /// partial drain would never be reported again.
    fn read(&mut self, slot: usize) {
        loop {
            if self.shared.is_stopping() {
                return;
            }
            let Some(conn) = self.connections.get_mut(slot) else {
                return;
            };
            let id = conn.endpoint.id();

            match read_once(&mut conn.stream, &mut self.scratch) {
                Ok(ReadOutcome::Bytes(n)) => {
                    BYTES_RECEIVED.add(n as u64);
                    // The scratch buffer is reused; the event gets its own copy.
                    let data = Bytes::copy_from_slice(&self.scratch[..n]);
                    self.emit(Event::DataReceived { id, data });
                }
                Ok(ReadOutcome::Eof) => {
                    tracing::debug!(%id, "peer closed");
                    self.teardown(slot, None);
                    return;
                }
                Ok(ReadOutcome::WouldBlock) => return,
                Err(e) => {
                    self.teardown(slot, Some(e));
                    return;
                }
            }
        }
    }

    fn accept_pending(&mut self) -> io::Result<()> {
        loop {
            // A blocked emit may have returned because a stop arrived.
            if self.shared.is_stopping() {
                return Ok(());
            }

            match self.listener.accept() {
                Ok((stream, addr)) => self.register(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!(error = %e, "transient accept failure");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn register(&mut self, mut stream: MioTcpStream, remote: SocketAddr) {
        if self.nodelay
            && let Err(e) = stream.set_nodelay(true)
        {
            tracing::debug!(addr = %remote, error = %e, "failed to set TCP_NODELAY");
        }

        let local = stream.local_addr().unwrap_or(self.local_addr);
        let id = EndpointId::next();

        let entry = self.connections.vacant_entry();
        let slot = entry.key();

        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, Token(slot), Interest::READABLE)
        {
            tracing::warn!(%id, addr = %remote, error = %e, "failed to register connection");
            return;
        }

        let endpoint = Endpoint::new(id, remote, local, self.shared.clone());
        entry.insert(Connection {
            stream,
            endpoint: endpoint.clone(),
            interest: Interest::READABLE,
        });
        self.slots.insert(id, slot);
        self.shared.insert(endpoint.clone());

        ENDPOINTS_ACCEPTED.increment();
        ENDPOINTS_ACTIVE.increment();
        tracing::debug!(%id, addr = %remote, "endpoint added");

        self.emit(Event::EndpointAdded { endpoint });
    }

    /// Remove a connection from the registry and close it. Does nothing if
    /// the slot is already gone, so every endpoint is reported removed once.
    fn teardown(&mut self, slot: usize, error: Option<io::Error>) {
        let Some(mut conn) = self.connections.try_remove(slot) else {
            return;
        };
        let endpoint = conn.endpoint;
        let id = endpoint.id();
        self.slots.remove(&id);

        if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
            tracing::debug!(%id, error = %e, "deregister failed");
        }
        drop(conn.stream);

        endpoint.disconnect();
        self.shared.remove(id);
        self.shared.mark_removed(&endpoint);

        ENDPOINTS_REMOVED.increment();
        ENDPOINTS_ACTIVE.decrement();

        if let Some(e) = error {
            CHANNEL_ERRORS.increment();
            tracing::warn!(%id, addr = %endpoint.remote_addr(), error = %e, "endpoint error");
            self.report(
                ErrorContext::Endpoint(id),
                Error::ChannelIo { id, source: e },
            );
        }

        tracing::debug!(%id, remaining = self.connections.len(), "endpoint removed");
        self.emit(Event::EndpointRemoved {
            id,
            remote: endpoint.remote_addr(),
        });
    }

    fn shutdown(&mut self) {
        let slots: Vec<usize> = self.connections.iter().map(|(slot, _)| slot).collect();
        for slot in slots {
            self.teardown(slot, None);
        }

        if let Err(e) = self.poll.registry().deregister(&mut self.listener) {
            tracing::debug!(error = %e, "deregister listener failed");
        }

        self.shared.advance_state(KernelState::Terminated);
        tracing::debug!(addr = %self.local_addr, "selector stopped");
    }

    fn report(&mut self, context: ErrorContext, error: Error) {
        self.emit(Event::Error { context, error });
    }

    /// Hand an event to the owner.
    ///
    /// While the queue is full the loop keeps serving close commands, so an
    /// owner blocked in `close_and_wait` is released even though it is not
    /// draining. Events raised by those teardowns wait in `backlog` behind
    /// the stuck one. Once shutdown has been requested a full queue drops
    /// events instead of waiting.
    fn emit(&mut self, event: Event) {
        self.backlog.push_back(event);
        if self.emitting {
            return;
        }

        self.emitting = true;
        while let Some(mut event) = self.backlog.pop_front() {
            loop {
                if self.shared.is_stopping() {
                    if let Err(TrySendError::Full(_)) = self.event_tx.try_send(event) {
                        EVENTS_DROPPED.increment();
                    }
                    break;
                }

                match self.event_tx.send_timeout(event, EMIT_SLICE) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(e)) => {
                        event = e;
                        self.process_commands();
                    }
                    Err(SendTimeoutError::Disconnected(_)) => break,
                }
            }
        }
        self.emitting = false;
    }
}

/// `io::Error` is not `Clone`; fatal errors go both to the owner's event
/// queue and to the thread's return value.
fn duplicate(e: &io::Error) -> io::Error {
    match e.raw_os_error() {
        Some(code) => io::Error::from_raw_os_error(code),
        None => io::Error::new(e.kind(), e.to_string()),
    }
}

/// One read on a non-blocking stream, with disconnect made explicit.
fn read_once<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    loop {
        match stream.read(buf) {
            Ok(0) => return Ok(ReadOutcome::Eof),
            Ok(n) => return Ok(ReadOutcome::Bytes(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(ReadOutcome::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}
