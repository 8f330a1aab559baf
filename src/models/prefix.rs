// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Prefix model shared by the route encoders and the inbound decoders.
//!
//! On the wire a prefix travels as `prefix_len:u8` followed by exactly
//! `psize(prefix_len)` address bytes; the address family is either
//! implied by the command or carried as a separate byte.

use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::{Result, bail};
use bytes::Buf;

/// Wire value for an IPv4 address family byte.
pub const AF_INET: u8 = 2;
/// Wire value for an IPv6 address family byte.
pub const AF_INET6: u8 = 10;

/// Number of address bytes needed to carry `prefix_len` bits.
#[inline]
pub const fn psize(prefix_len: u8) -> usize {
    (prefix_len as usize + 7) / 8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Prefix {
    pub addr: Ipv4Addr,
    pub len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Prefix {
    pub addr: Ipv6Addr,
    pub len: u8,
}

/// A family-tagged prefix, used where the wire carries an explicit
/// family byte (router-id updates, interface addresses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    V4(Ipv4Prefix),
    V6(Ipv6Prefix),
}

impl Ipv4Prefix {
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self> {
        if len > 32 {
            bail!("IPv4 prefix length {len} out of range");
        }
        Ok(Self { addr, len })
    }
}

impl Ipv6Prefix {
    pub fn new(addr: Ipv6Addr, len: u8) -> Result<Self> {
        if len > 128 {
            bail!("IPv6 prefix length {len} out of range");
        }
        Ok(Self { addr, len })
    }
}

/// Read `psize(len)` truncated IPv4 address bytes.
pub fn get_ipv4_truncated(buf: &mut impl Buf, len: u8) -> Result<Ipv4Addr> {
    let n = psize(len);
    if buf.remaining() < n {
        bail!("prefix truncated: need {n} bytes, have {}", buf.remaining());
    }
    let mut octets = [0u8; 4];
    buf.copy_to_slice(&mut octets[..n]);
    Ok(Ipv4Addr::from(octets))
}

/// Read `psize(len)` truncated IPv6 address bytes.
pub fn get_ipv6_truncated(buf: &mut impl Buf, len: u8) -> Result<Ipv6Addr> {
    let n = psize(len);
    if buf.remaining() < n {
        bail!("prefix truncated: need {n} bytes, have {}", buf.remaining());
    }
    let mut octets = [0u8; 16];
    buf.copy_to_slice(&mut octets[..n]);
    Ok(Ipv6Addr::from(octets))
}

/// Read a full fixed-width address for the given family byte.
pub fn get_addr_by_family(buf: &mut impl Buf, family: u8) -> Result<std::net::IpAddr> {
    match family {
        AF_INET => {
            if buf.remaining() < 4 {
                bail!("IPv4 address truncated");
            }
            let mut o = [0u8; 4];
            buf.copy_to_slice(&mut o);
            Ok(std::net::IpAddr::V4(Ipv4Addr::from(o)))
        },
        AF_INET6 => {
            if buf.remaining() < 16 {
                bail!("IPv6 address truncated");
            }
            let mut o = [0u8; 16];
            buf.copy_to_slice(&mut o);
            Ok(std::net::IpAddr::V6(Ipv6Addr::from(o)))
        },
        other => bail!("unknown address family {other}"),
    }
}
