// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! User-space staging buffers between the codec and the socket.

use std::{collections::VecDeque, io::IoSlice};

use bytes::{Buf, Bytes};

use crate::client::transport::{IoOutcome, Transport};

/// Initial (and usual) capacity of the inbound frame buffer.
pub const MAX_PACKET_LEN: usize = 4096;

/// Inbound frame assembly buffer.
///
/// `endp` counts bytes received so far, `getp` bytes already consumed
/// by header parsing. The buffer holds at most one frame: once that
/// frame is dispatched the caller resets both cursors. A frame whose
/// declared length exceeds the capacity triggers a grow that preserves
/// everything received so far, header bytes included.
pub struct ReadBuffer {
    data: Vec<u8>,
    endp: usize,
    getp: usize,
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self {
            data: vec![0; MAX_PACKET_LEN],
            endp: 0,
            getp: 0,
        }
    }

    #[inline]
    pub fn endp(&self) -> usize {
        self.endp
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes received so far.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.endp]
    }

    /// Mark `n` bytes as consumed by the parser.
    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.getp = (self.getp + n).min(self.endp);
    }

    /// Slice from the consumption cursor to `end`.
    #[inline]
    pub fn consumed_to(&self, end: usize) -> &[u8] {
        &self.data[self.getp..end]
    }

    /// Read from the socket until `want` bytes are buffered. Stops at
    /// the first short read; call again on the next readiness event.
    pub fn fill_from(&mut self, sock: &mut Transport, want: usize) -> IoOutcome {
        debug_assert!(want <= self.data.len());
        if self.endp >= want {
            return IoOutcome::Bytes(0);
        }
        match sock.read(&mut self.data[self.endp..want]) {
            IoOutcome::Bytes(n) => {
                self.endp += n;
                IoOutcome::Bytes(n)
            },
            other => other,
        }
    }

    /// Reallocate to hold a frame of `need` bytes, carrying over what
    /// has already been received.
    pub fn grow(&mut self, need: usize) {
        if need <= self.data.len() {
            return;
        }
        let mut bigger = vec![0; need];
        bigger[..self.endp].copy_from_slice(&self.data[..self.endp]);
        self.data = bigger;
    }

    /// Make room for the next frame. Capacity gained by [`grow`] is
    /// kept.
    ///
    /// [`grow`]: ReadBuffer::grow
    pub fn reset(&mut self) {
        self.endp = 0;
        self.getp = 0;
    }
}

/// Result of pushing bytes toward the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Everything pending hit the socket.
    Empty,
    /// A tail remains queued; arm write-readiness and drain later.
    Pending,
    /// The socket is no longer usable.
    Error,
}

/// FIFO of frames awaiting socket space.
///
/// Ordering across `enqueue` calls is preserved; a partially written
/// head chunk is advanced in place so no byte is sent twice.
#[derive(Default)]
pub struct WriteBuffer {
    backlog: VecDeque<Bytes>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    /// Queue a frame and immediately try to push everything pending
    /// with one gathered write.
    pub fn enqueue(&mut self, frame: Bytes, sock: &mut Transport) -> WriteStatus {
        self.backlog.push_back(frame);
        self.flush_available(sock)
    }

    /// Drain the backlog as far as the socket allows.
    pub fn flush_available(&mut self, sock: &mut Transport) -> WriteStatus {
        while !self.backlog.is_empty() {
            let outcome = {
                let slices: Vec<IoSlice<'_>> =
                    self.backlog.iter().map(|b| IoSlice::new(b)).collect();
                sock.writev(&slices)
            };
            match outcome {
                IoOutcome::Bytes(mut n) => {
                    while n > 0 {
                        let Some(front) = self.backlog.front_mut() else {
                            break;
                        };
                        if n >= front.len() {
                            n -= front.len();
                            self.backlog.pop_front();
                        } else {
                            front.advance(n);
                            n = 0;
                        }
                    }
                },
                IoOutcome::Again => return WriteStatus::Pending,
                IoOutcome::Closed => return WriteStatus::Error,
            }
        }
        WriteStatus::Empty
    }

    /// Throw away everything pending (connection teardown).
    pub fn clear(&mut self) {
        self.backlog.clear();
    }
}
