//! The kernel: owner-facing control surface over the selector loop.

use crate::config::KernelConfig;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::event::Event;
use crate::metrics::BROADCASTS;
use crate::selector::{LISTENER_TOKEN, LoopParts, SelectorLoop, WAKER_TOKEN};
use crate::shared::{Command, Shared};
use crate::types::{EndpointId, KernelState};
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use mio::net::TcpListener as MioTcpListener;
use mio::{Interest, Poll, Waker};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A TCP kernel: accepts connections and multiplexes them on one thread.
///
/// The owner drives the kernel through [`initialize`](Kernel::initialize) and
/// [`terminate`](Kernel::terminate), drains [`Event`]s at its own pace, and
/// talks to individual connections through [`Endpoint`] handles.
///
/// # Example
///
/// ```no_run
/// use io_kernel::{Event, Kernel, KernelConfig};
///
/// let mut kernel = Kernel::new(KernelConfig::default())?;
/// let addr = kernel.initialize(Some("127.0.0.1:0".parse().unwrap()))?;
/// println!("hosting on {addr}");
///
/// while let Some(event) = kernel.recv_event() {
///     if let Event::DataReceived { id, data } = event {
///         if let Some(endpoint) = kernel.endpoint(id) {
///             endpoint.send_bytes(data)?;
///         }
///     }
/// }
/// # Ok::<(), io_kernel::Error>(())
/// ```
pub struct Kernel {
    config: KernelConfig,
    shared: Arc<Shared>,
    /// Moved into the selector thread by `initialize`.
    pending: Option<Pending>,
    event_rx: Receiver<Event>,
    local_addr: Option<SocketAddr>,
    thread: Option<JoinHandle<Result<(), Error>>>,
}

struct Pending {
    poll: Poll,
    commands: Receiver<Command>,
    event_tx: Sender<Event>,
}

impl Kernel {
    /// Create a kernel. Nothing is bound until [`initialize`](Kernel::initialize).
    pub fn new(config: KernelConfig) -> Result<Self, Error> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;
        let (command_tx, commands) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_capacity.max(1));

        Ok(Self {
            config,
            shared: Arc::new(Shared::new(waker, command_tx)),
            pending: Some(Pending {
                poll,
                commands,
                event_tx,
            }),
            event_rx,
            local_addr: None,
            thread: None,
        })
    }

    /// Bind the accept socket and start the selector thread.
    ///
    /// Uses `bind`, falling back to the configured address. Returns the
    /// address actually bound, which matters when port 0 was requested.
    pub fn initialize(&mut self, bind: Option<SocketAddr>) -> Result<SocketAddr, Error> {
        let Some(pending) = self.pending.take() else {
            return Err(Error::AlreadyInitialized);
        };

        let addr = bind.unwrap_or_else(|| self.config.bind_addr());

        let mut listener = match bind_listener(addr, self.config.backlog) {
            Ok(listener) => listener,
            Err(source) => {
                self.pending = Some(pending);
                return Err(Error::Bind { addr, source });
            }
        };

        let registered = pending
            .poll
            .registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .and_then(|()| listener.local_addr());
        let local_addr = match registered {
            Ok(local_addr) => local_addr,
            Err(source) => {
                self.pending = Some(pending);
                return Err(Error::Bind { addr, source });
            }
        };

        let selector = SelectorLoop::new(LoopParts {
            poll: pending.poll,
            listener,
            local_addr,
            poll_capacity: self.config.poll_capacity,
            read_buffer_size: self.config.read_buffer_size,
            nodelay: self.config.nodelay,
            shared: self.shared.clone(),
            commands: pending.commands,
            event_tx: pending.event_tx,
        });

        self.shared.advance_state(KernelState::Running);

        let thread = thread::Builder::new()
            .name(format!("selector@{local_addr}"))
            .spawn(move || selector.run());

        match thread {
            Ok(thread) => self.thread = Some(thread),
            Err(e) => {
                self.shared.advance_state(KernelState::Terminated);
                return Err(Error::Io(e));
            }
        }

        self.local_addr = Some(local_addr);
        tracing::debug!(addr = %local_addr, "hosting tcp kernel");

        Ok(local_addr)
    }

    /// Stop the selector thread and wait for it to exit.
    ///
    /// Every endpoint still connected is torn down and reported removed.
    /// Returns the fatal error that ended the loop early, if there was one.
    pub fn terminate(&mut self) -> Result<(), Error> {
        let Some(thread) = self.thread.take() else {
            return Err(Error::NotInitialized);
        };

        self.shared.request_stop();

        let result = thread
            .join()
            .unwrap_or_else(|_| Err(Error::Io(io::Error::other("selector thread panicked"))));

        // A panicking selector never reached its own shutdown.
        self.shared.advance_state(KernelState::Terminated);

        tracing::debug!(addr = ?self.local_addr, "kernel terminated");
        result
    }

    /// Queue `data` on every open endpoint accepted by `filter`.
    ///
    /// The bytes are shared, not copied; each endpoint keeps its own cursor.
    /// Wakes the selector once. Returns the number of endpoints the data was
    /// queued on. `filter` runs on a snapshot, outside the directory lock, so
    /// it may call back into the kernel.
    pub fn broadcast<F>(&self, filter: F, data: Bytes) -> usize
    where
        F: Fn(&Endpoint) -> bool,
    {
        BROADCASTS.increment();

        let count = self
            .endpoints()
            .iter()
            .filter(|endpoint| filter(*endpoint) && endpoint.enqueue(data.clone()))
            .count();

        if count > 0 {
            self.shared.wake();
        }
        count
    }

    /// Copy `data` once, then broadcast it.
    pub fn broadcast_copy<F>(&self, filter: F, data: &[u8]) -> usize
    where
        F: Fn(&Endpoint) -> bool,
    {
        self.broadcast(filter, Bytes::copy_from_slice(data))
    }

    /// A handle that asks the selector to stop from any thread.
    ///
    /// Stopping does not join the selector thread; the owner still calls
    /// [`terminate`](Kernel::terminate) to collect its result.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
        }
    }

    /// Look up a registered endpoint.
    pub fn endpoint(&self, id: EndpointId) -> Option<Endpoint> {
        self.shared.get(id)
    }

    /// Snapshot of the registered endpoints, in no particular order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.shared.snapshot()
    }

    pub fn endpoint_count(&self) -> usize {
        self.shared.len()
    }

    /// The bound accept address, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> KernelState {
        self.shared.state()
    }

    /// Block until the kernel reaches `state`. Returns `false` on timeout.
    pub fn wait_for_state(&self, state: KernelState, timeout: Option<Duration>) -> bool {
        self.shared.wait_for_state(state, timeout)
    }

    /// Block for the next event. Returns `None` once the selector has
    /// exited and every queued event has been taken.
    pub fn recv_event(&self) -> Option<Event> {
        self.event_rx.recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<Event> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_next_event(&self) -> Option<Event> {
        self.event_rx.try_recv().ok()
    }

    /// Whether any event is waiting.
    pub fn has_events(&self) -> bool {
        !self.event_rx.is_empty()
    }

    /// A handle on the event queue, for owners that drain it from another
    /// thread or select over several channels.
    pub fn events(&self) -> Receiver<Event> {
        self.event_rx.clone()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
}

/// Requests a stop of the selector loop. See [`Kernel::stop_handle`].
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.shared.request_stop();
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.terminate();
        }
    }
}

/// Create a non-blocking listener with SO_REUSEADDR and the given backlog.
fn bind_listener(addr: SocketAddr, backlog: i32) -> io::Result<MioTcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    let std_listener: std::net::TcpListener = socket.into();
    Ok(MioTcpListener::from_std(std_listener))
}
