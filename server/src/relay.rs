//! The relay event loop.
//!
//! Owns a [`Kernel`] and drains its event queue on the calling thread. In
//! echo mode received bytes go back to their sender; in broadcast mode they
//! go to every other open endpoint. The received buffer is handed to the
//! kernel as-is, so a broadcast shares one allocation across all receivers.

use crate::config::{Config, RelayMode};
use crate::metrics::{BYTES_IN, DELIVERIES, ERRORS, MESSAGES};
use bytes::Bytes;
use io_kernel::{EndpointId, Error, ErrorContext, Event, Kernel, KernelState, StopHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long to wait for an event before rechecking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Relay {
    kernel: Kernel,
    mode: RelayMode,
    local_addr: SocketAddr,
}

impl Relay {
    /// Bind the listen address and start the selector thread.
    pub fn start(config: &Config) -> Result<Self, Error> {
        let mut kernel = Kernel::new(config.kernel.clone())?;
        let local_addr = kernel.initialize(Some(config.relay.listen))?;

        tracing::info!(addr = %local_addr, mode = config.relay.mode.as_str(), "relay listening");

        Ok(Self {
            kernel,
            mode: config.relay.mode,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Stops the kernel from outside the relay loop; `run` then returns.
    pub fn stop_handle(&self) -> StopHandle {
        self.kernel.stop_handle()
    }

    /// Relay events until `shutdown` is raised or the kernel stops on its
    /// own, then terminate the kernel.
    ///
    /// Returns the fatal error that stopped the kernel, if any.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) -> Result<(), Error> {
        while !shutdown.load(Ordering::Relaxed) {
            if self.kernel.state() >= KernelState::Stopping {
                tracing::warn!("kernel stopped without a shutdown request");
                break;
            }

            if let Some(event) = self.kernel.next_event(POLL_INTERVAL) {
                self.handle(event);
            }
        }

        tracing::info!(addr = %self.local_addr, "relay shutting down");
        let result = self.kernel.terminate();

        // Drain what the shutdown produced so removals are logged, even when
        // the kernel died of a fatal error.
        while let Some(event) = self.kernel.try_next_event() {
            self.handle(event);
        }

        result
    }

    fn handle(&self, event: Event) {
        match event {
            Event::EndpointAdded { endpoint } => {
                tracing::debug!(endpoint = %endpoint, "endpoint added");
            }
            Event::EndpointRemoved { id, remote } => {
                tracing::debug!(%id, %remote, "endpoint removed");
            }
            Event::DataReceived { id, data } => {
                MESSAGES.increment();
                BYTES_IN.add(data.len() as u64);
                self.relay(id, data);
            }
            Event::Error { context, error } => {
                ERRORS.increment();
                match context {
                    ErrorContext::Endpoint(_) => {
                        tracing::debug!(%context, error = %error, "endpoint error");
                    }
                    ErrorContext::Accept | ErrorContext::Selector => {
                        tracing::error!(%context, error = %error, "kernel error");
                    }
                }
            }
        }
    }

    fn relay(&self, from: EndpointId, data: Bytes) {
        match self.mode {
            RelayMode::Echo => {
                // The endpoint may already be gone; its removal event follows.
                let Some(endpoint) = self.kernel.endpoint(from) else {
                    return;
                };
                match endpoint.send_bytes(data) {
                    Ok(()) => {
                        DELIVERIES.increment();
                    }
                    Err(e) => tracing::debug!(id = %from, error = %e, "echo dropped"),
                }
            }
            RelayMode::Broadcast => {
                let count = self.kernel.broadcast(|endpoint| endpoint.id() != from, data);
                DELIVERIES.add(count as u64);
                tracing::trace!(id = %from, count, "broadcast");
            }
        }
    }
}
