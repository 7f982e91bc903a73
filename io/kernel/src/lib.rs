//! io-kernel - Single-threaded TCP multiplexer.
//!
//! This crate accepts TCP connections and multiplexes reads and writes for
//! all of them on one selector thread (mio: epoll on Linux, kqueue on
//! macOS). Each connection is exposed as an [`Endpoint`] with its own
//! outbound queue that any thread may send on.
//!
//! # Architecture
//!
//! - **Kernel**: binds the accept socket, owns the selector thread, exposes
//!   broadcast and the event queue
//! - **Selector loop**: the only code that touches the poll registry or the
//!   sockets; switches each connection between read and write interest
//! - **Endpoint**: cloneable handle with a FIFO outbound queue and a
//!   close-state machine
//! - **Connector**: blocking single-connection client, independent of the
//!   kernel
//!
//! The kernel moves raw bytes only. Message framing, encryption and retry
//! belong to the layers above.
//!
//! # Quick Start
//!
//! ```no_run
//! use io_kernel::{Event, Kernel, KernelConfig};
//! use std::time::Duration;
//!
//! let mut kernel = Kernel::new(KernelConfig::default())?;
//! kernel.initialize(Some("127.0.0.1:7000".parse().unwrap()))?;
//!
//! loop {
//!     match kernel.next_event(Duration::from_millis(100)) {
//!         Some(Event::EndpointAdded { endpoint }) => {
//!             endpoint.send(b"welcome\r\n")?;
//!         }
//!         Some(Event::DataReceived { id, data }) => {
//!             println!("{id}: {} bytes", data.len());
//!         }
//!         Some(Event::EndpointRemoved { id, .. }) => {
//!             println!("{id} left");
//!         }
//!         Some(Event::Error { context, error }) => {
//!             eprintln!("{context}: {error}");
//!         }
//!         None => {}
//!     }
//! }
//! # Ok::<(), io_kernel::Error>(())
//! ```

mod config;
mod connector;
mod endpoint;
mod error;
mod event;
mod kernel;
mod queue;
mod selector;
mod shared;
mod types;

pub mod metrics;

pub use config::{ConnectorConfig, KernelConfig};
pub use connector::Connector;
pub use endpoint::Endpoint;
pub use error::Error;
pub use event::{ErrorContext, Event};
pub use kernel::{Kernel, StopHandle};
pub use queue::{Flush, Frame, OutboundQueue};
pub use types::{CloseState, EndpointId, KernelState, ReadOutcome};

// Re-export bytes for convenience
pub use bytes::Bytes;
