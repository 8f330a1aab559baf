// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! ROUTER_ID_UPDATE notification body.

use anyhow::{Result, bail, ensure};
use bytes::Buf;

use crate::models::prefix::{
    AF_INET, AF_INET6, Ipv4Prefix, Ipv6Prefix, Prefix, get_ipv4_truncated,
    get_ipv6_truncated,
};

/// Decode `family:u8, address:[blen(family)], prefixlen:u8`.
///
/// Unlike the truncated route prefixes, the address here is always the
/// family's full width; the prefix length follows it.
pub fn decode_router_id(payload: &[u8]) -> Result<Prefix> {
    let mut buf = payload;
    ensure!(buf.remaining() >= 1, "router-id body truncated");
    match buf.get_u8() {
        AF_INET => {
            let addr = get_ipv4_truncated(&mut buf, 32)?;
            ensure!(buf.remaining() >= 1, "router-id prefix length truncated");
            let len = buf.get_u8();
            ensure!(len <= 32, "router-id prefix length {len} out of range");
            Ok(Prefix::V4(Ipv4Prefix { addr, len }))
        },
        AF_INET6 => {
            let addr = get_ipv6_truncated(&mut buf, 128)?;
            ensure!(buf.remaining() >= 1, "router-id prefix length truncated");
            let len = buf.get_u8();
            ensure!(len <= 128, "router-id prefix length {len} out of range");
            Ok(Prefix::V6(Ipv6Prefix { addr, len }))
        },
        other => bail!("router-id update with unknown family {other}"),
    }
}
