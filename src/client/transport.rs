// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Stream socket plumbing.
//!
//! One connected non-blocking stream per transport, UNIX-domain by
//! default or loopback TCP. Raw syscall results are folded into the
//! ternary [`IoOutcome`]: short reads and `EAGAIN` are ordinary here,
//! and every other error means the connection is gone.

use std::{
    io::{self, IoSlice, Read, Write},
    net::TcpStream,
    os::{
        fd::{AsRawFd, RawFd},
        unix::net::UnixStream,
    },
};

use tracing::debug;

use crate::cfg::config::Endpoint;

/// What a non-blocking read or write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome {
    /// Peer closed, or the socket errored; rebuild the connection.
    Closed,
    /// No progress possible right now; wait for readiness.
    Again,
    /// Moved this many bytes (`0 < n <= requested`).
    Bytes(usize),
}

enum Stream {
    Unix(UnixStream),
    Tcp(TcpStream),
}

pub struct Transport {
    stream: Stream,
}

impl Transport {
    /// Dial the endpoint and switch the resulting socket to
    /// non-blocking mode.
    pub fn connect(endpoint: &Endpoint) -> io::Result<Self> {
        let stream = match endpoint {
            Endpoint::Unix(path) => {
                let s = UnixStream::connect(path)?;
                s.set_nonblocking(true)?;
                Stream::Unix(s)
            },
            Endpoint::Tcp(addr) => {
                let s = TcpStream::connect(addr)?;
                s.set_nodelay(true)?;
                s.set_nonblocking(true)?;
                Stream::Tcp(s)
            },
        };
        Ok(Self { stream })
    }

    /// Wrap an already connected UNIX stream (socketpair-style tests).
    #[allow(dead_code)]
    pub(crate) fn from_unix(s: UnixStream) -> io::Result<Self> {
        s.set_nonblocking(true)?;
        Ok(Self {
            stream: Stream::Unix(s),
        })
    }

    pub fn raw_fd(&self) -> RawFd {
        match &self.stream {
            Stream::Unix(s) => s.as_raw_fd(),
            Stream::Tcp(s) => s.as_raw_fd(),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> IoOutcome {
        loop {
            let res = match &mut self.stream {
                Stream::Unix(s) => s.read(buf),
                Stream::Tcp(s) => s.read(buf),
            };
            return match res {
                Ok(0) => IoOutcome::Closed,
                Ok(n) => IoOutcome::Bytes(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => IoOutcome::Again,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("socket read failed: {e}");
                    IoOutcome::Closed
                },
            };
        }
    }

    pub fn writev(&mut self, bufs: &[IoSlice<'_>]) -> IoOutcome {
        loop {
            let res = match &mut self.stream {
                Stream::Unix(s) => s.write_vectored(bufs),
                Stream::Tcp(s) => s.write_vectored(bufs),
            };
            return match res {
                Ok(0) => IoOutcome::Closed,
                Ok(n) => IoOutcome::Bytes(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => IoOutcome::Again,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("socket write failed: {e}");
                    IoOutcome::Closed
                },
            };
        }
    }
}
