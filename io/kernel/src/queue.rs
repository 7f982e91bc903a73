//! Per-endpoint outbound queue.
//!
//! Producers on any thread append frames; only the selector thread consumes
//! them. The queue also carries the endpoint's [`CloseState`] so that the
//! state check and the append happen under the same lock: once a close
//! marker is queued, nothing can land behind it.

use crate::types::CloseState;
use bytes::{Buf, Bytes};
use std::collections::VecDeque;
use std::io::{self, Write};

/// One queued unit of outbound work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Bytes to transmit. Partial writes advance this buffer in place.
    Data(Bytes),
    /// Close the connection once everything ahead of this has been written.
    Close,
}

/// Result of draining a queue into a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Every data frame was written and the queue is empty.
    Drained,
    /// The socket stopped accepting bytes; data remains queued.
    Blocked,
    /// All data ahead of the close marker was written.
    CloseReached,
}

#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<Frame>,
    pending_bytes: usize,
    state: CloseState,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer. Returns `false` if the queue is no longer open.
    pub fn push(&mut self, data: Bytes) -> bool {
        if !self.state.is_open() {
            return false;
        }
        if data.is_empty() {
            return true;
        }
        self.pending_bytes += data.len();
        self.frames.push_back(Frame::Data(data));
        true
    }

    /// Queue the close marker. Returns `false` if the queue was not open.
    pub fn close_after_flush(&mut self) -> bool {
        if !self.state.is_open() {
            return false;
        }
        self.state = CloseState::ClosingAfterFlush;
        self.frames.push_back(Frame::Close);
        true
    }

    /// Move straight to `Closed`, discarding anything still queued.
    ///
    /// Returns the number of data bytes that were dropped.
    pub fn close_now(&mut self) -> usize {
        self.state = CloseState::Closed;
        self.frames.clear();
        std::mem::take(&mut self.pending_bytes)
    }

    pub fn state(&self) -> CloseState {
        self.state
    }

    pub fn has_pending(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Number of queued frames, including a close marker.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Data bytes not yet handed to the OS.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Write queued data until the writer would block, the queue empties, or
    /// the close marker is reached.
    ///
    /// Returns the outcome and the number of bytes written. The close marker
    /// is left in place; the caller owns teardown.
    pub fn write_to<W: Write>(&mut self, writer: &mut W) -> io::Result<(Flush, usize)> {
        let mut written = 0;

        loop {
            let buf = match self.frames.front_mut() {
                None => return Ok((Flush::Drained, written)),
                Some(Frame::Close) => return Ok((Flush::CloseReached, written)),
                Some(Frame::Data(buf)) => buf,
            };

            match writer.write(buf.chunk()) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => {
                    buf.advance(n);
                    written += n;
                    self.pending_bytes -= n;
                    if !buf.has_remaining() {
                        self.frames.pop_front();
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok((Flush::Blocked, written));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}
