// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Synchronous nexthop/import lookup frames.
//!
//! These are used by lookup-mode clients that own the socket and do
//! their own send/receive (see `ZClient::start_lookup`); the regular
//! dispatcher never sees them.

use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::{Result, ensure};
use bytes::{Buf, BufMut, Bytes};

use crate::models::{
    command::ZCommand,
    header::{FrameBuilder, FrameError},
    route::Nexthop,
};

/// Encode the body of IPV4_NEXTHOP_LOOKUP / IPV4_IMPORT_LOOKUP.
pub fn encode_ipv4_lookup(cmd: ZCommand, addr: Ipv4Addr) -> Result<Bytes, FrameError> {
    let mut fb = FrameBuilder::new(cmd);
    fb.body_mut().put_slice(&addr.octets());
    fb.finish()
}

/// Encode the body of IPV6_NEXTHOP_LOOKUP / IPV6_IMPORT_LOOKUP.
pub fn encode_ipv6_lookup(cmd: ZCommand, addr: Ipv6Addr) -> Result<Bytes, FrameError> {
    let mut fb = FrameBuilder::new(cmd);
    fb.body_mut().put_slice(&addr.octets());
    fb.finish()
}

/// A lookup reply: the queried address echoed back, the route metric,
/// and the resolved nexthop set (empty when unreachable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupReply<A> {
    pub addr: A,
    pub metric: u32,
    pub nexthops: Vec<Nexthop>,
}

impl LookupReply<Ipv4Addr> {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        ensure!(buf.remaining() >= 9, "lookup reply truncated");
        let mut o = [0u8; 4];
        buf.copy_to_slice(&mut o);
        decode_tail(&mut buf, Ipv4Addr::from(o))
    }
}

impl LookupReply<Ipv6Addr> {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        ensure!(buf.remaining() >= 21, "lookup reply truncated");
        let mut o = [0u8; 16];
        buf.copy_to_slice(&mut o);
        decode_tail(&mut buf, Ipv6Addr::from(o))
    }
}

fn decode_tail<A>(buf: &mut impl Buf, addr: A) -> Result<LookupReply<A>> {
    let metric = buf.get_u32();
    let count = buf.get_u8();
    let mut nexthops = Vec::with_capacity(count as usize);
    for _ in 0..count {
        nexthops.push(Nexthop::decode(buf)?);
    }
    Ok(LookupReply {
        addr,
        metric,
        nexthops,
    })
}
