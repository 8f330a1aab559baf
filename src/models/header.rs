// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The fixed six-byte frame header.
//!
//! ```text
//! 0                   1                   2
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     length (u16, BE)  | 0xFF  | ver=2 |  command (u16, BE)
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `length` counts the whole frame, header included. The marker byte
//! sits where a protocol-version-1 server would have placed a route
//! type, so a mismatched peer is detected on the very first frame.
//! All integers on the wire are big-endian; the layout is packed bytes
//! with no alignment padding, which the zerocopy derives prove at
//! compile time.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use zerocopy::{
    BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16, Unaligned,
};

use crate::models::command::ZCommand;

/// Size of [`ZservHeader`] on the wire.
pub const HEADER_LEN: usize = 6;
/// Constant marker byte at offset 2.
pub const MARKER: u8 = 0xFF;
/// Protocol version this client speaks.
pub const VERSION: u8 = 2;

/// Violations of the framing contract. Any of these is fatal for the
/// connection that produced the bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short for header: {0} bytes")]
    Truncated(usize),
    #[error("bad marker byte 0x{0:02x}")]
    BadMarker(u8),
    #[error("unsupported protocol version {0}")]
    BadVersion(u8),
    #[error("length field {0} smaller than the header itself")]
    BadLength(u16),
    #[error("encoded frame of {0} bytes exceeds the u16 length field")]
    Oversize(usize),
}

/// Wire image of the frame header.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable,
    Unaligned,
)]
pub struct ZservHeader {
    pub length: U16<BigEndian>,
    pub marker: u8,
    pub version: u8,
    pub command: U16<BigEndian>,
}

impl ZservHeader {
    pub fn new(command: ZCommand) -> Self {
        Self {
            length: U16::new(0),
            marker: MARKER,
            version: VERSION,
            command: U16::new(command.as_u16()),
        }
    }

    /// Parse and validate the header at the front of `buf`.
    ///
    /// The command field is *not* validated here: unknown commands are a
    /// soft condition handled by the dispatcher, while a bad marker,
    /// version or length means the peer is not speaking this protocol.
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < HEADER_LEN {
            return Err(FrameError::Truncated(buf.len()));
        }
        let hdr = Self::read_from_bytes(&buf[..HEADER_LEN])
            .map_err(|_| FrameError::Truncated(buf.len()))?;
        if hdr.marker != MARKER {
            return Err(FrameError::BadMarker(hdr.marker));
        }
        if hdr.version != VERSION {
            return Err(FrameError::BadVersion(hdr.version));
        }
        if (hdr.length.get() as usize) < HEADER_LEN {
            return Err(FrameError::BadLength(hdr.length.get()));
        }
        Ok(hdr)
    }

    #[inline]
    pub fn frame_len(&self) -> usize {
        self.length.get() as usize
    }
}

/// Accumulates one outbound frame: header first, body appended through
/// [`FrameBuilder::body_mut`], length patched into offset 0 by
/// [`FrameBuilder::finish`] once the body size is known.
pub struct FrameBuilder {
    buf: BytesMut,
}

impl FrameBuilder {
    pub fn new(command: ZCommand) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_slice(ZservHeader::new(command).as_bytes());
        Self { buf }
    }

    /// The buffer positioned after the header; append body bytes here
    /// with the big-endian `BufMut` putters.
    #[inline]
    pub fn body_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Patch the final frame length into the first two bytes and freeze.
    pub fn finish(mut self) -> Result<Bytes, FrameError> {
        let total = self.buf.len();
        let Ok(total_u16) = u16::try_from(total) else {
            return Err(FrameError::Oversize(total));
        };
        self.buf[0..2].copy_from_slice(&total_u16.to_be_bytes());
        Ok(self.buf.freeze())
    }
}

/// Shorthand for the bodyless frames (INTERFACE_ADD, ROUTER_ID_ADD, the
/// default-redistribution pair).
pub fn empty_frame(command: ZCommand) -> Bytes {
    let mut header = ZservHeader::new(command);
    header.length = U16::new(HEADER_LEN as u16);
    Bytes::copy_from_slice(header.as_bytes())
}
