//! State shared between the selector thread and producer threads.
//!
//! Nothing in here touches the poll registry. Producers reach the selector
//! only through the command channel and the waker.

use crate::endpoint::Endpoint;
use crate::metrics::WAKEUPS;
use crate::types::{EndpointId, KernelState};
use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A request for the selector thread.
#[derive(Debug)]
pub(crate) enum Command {
    /// Tear the endpoint down now, discarding unsent data.
    Close(EndpointId),
}

pub(crate) struct Shared {
    waker: mio::Waker,
    stop: AtomicBool,
    commands: Sender<Command>,
    /// Read-mostly view of the registry. Only the selector thread inserts or
    /// removes.
    directory: RwLock<HashMap<EndpointId, Endpoint>>,
    state: Mutex<KernelState>,
    /// Signalled on every state change and every endpoint teardown.
    changed: Condvar,
}

impl Shared {
    pub(crate) fn new(waker: mio::Waker, commands: Sender<Command>) -> Self {
        Self {
            waker,
            stop: AtomicBool::new(false),
            commands,
            directory: RwLock::new(HashMap::new()),
            state: Mutex::new(KernelState::Created),
            changed: Condvar::new(),
        }
    }

    /// Break the selector out of its poll so it re-derives interest.
    pub(crate) fn wake(&self) {
        WAKEUPS.increment();
        if let Err(e) = self.waker.wake() {
            tracing::warn!(error = %e, "failed to wake selector");
        }
    }

    pub(crate) fn request_close(&self, id: EndpointId) {
        // The receiver only goes away once the loop has exited, at which
        // point every endpoint has already been torn down.
        let _ = self.commands.send(Command::Close(id));
        self.wake();
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.advance_state(KernelState::Stopping);
        self.wake();
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    // ---- directory --------------------------------------------------------

    pub(crate) fn insert(&self, endpoint: Endpoint) {
        self.directory.write().insert(endpoint.id(), endpoint);
    }

    pub(crate) fn remove(&self, id: EndpointId) {
        self.directory.write().remove(&id);
    }

    pub(crate) fn get(&self, id: EndpointId) -> Option<Endpoint> {
        self.directory.read().get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.directory.read().len()
    }

    /// Clones of every registered endpoint. The read lock is released
    /// before the caller sees them.
    pub(crate) fn snapshot(&self) -> Vec<Endpoint> {
        self.directory.read().values().cloned().collect()
    }

    // ---- lifecycle --------------------------------------------------------

    pub(crate) fn state(&self) -> KernelState {
        *self.state.lock()
    }

    /// Move forward to `next`. Backward transitions are ignored.
    pub(crate) fn advance_state(&self, next: KernelState) {
        let mut state = self.state.lock();
        if next > *state {
            *state = next;
            self.changed.notify_all();
        }
    }

    /// Block until the state reaches `target` or the timeout expires.
    /// Returns whether the target was reached.
    pub(crate) fn wait_for_state(&self, target: KernelState, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while *state < target {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return *state >= target;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
        true
    }

    /// Flag an endpoint as removed and release anyone waiting on it.
    pub(crate) fn mark_removed(&self, endpoint: &Endpoint) {
        let _state = self.state.lock();
        endpoint.set_removed();
        self.changed.notify_all();
    }

    /// Block until the selector has torn `endpoint` down or has terminated.
    pub(crate) fn wait_removed(&self, endpoint: &Endpoint) {
        let mut state = self.state.lock();
        while !endpoint.is_removed() && *state != KernelState::Terminated {
            self.changed.wait(&mut state);
        }
    }
}
