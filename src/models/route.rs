// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Route install/withdraw message bodies.
//!
//! The body layout is conditional: `message` is a bitset announcing
//! which optional sections follow the prefix. Everything is big-endian
//! and packed; see the field-by-field walk in the encoders below.

use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::{Result, bail, ensure};
use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes};

use crate::{
    cfg::enums::RouteType,
    models::{
        command::ZCommand,
        header::{FrameBuilder, FrameError},
        prefix::{Ipv4Prefix, Ipv6Prefix, get_ipv4_truncated, get_ipv6_truncated},
    },
};

bitflags! {
    /// Per-route server flags (the `zebra_flags` byte).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RouteFlags: u8 {
        const INTERNAL  = 0x01;
        const SELFROUTE = 0x02;
        const BLACKHOLE = 0x04;
        const IBGP      = 0x08;
        const SELECTED  = 0x10;
        const CHANGED   = 0x20;
        const STATIC    = 0x40;
        const REJECT    = 0x80;
    }
}

bitflags! {
    /// Announces which optional body sections are present.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ApiMessage: u8 {
        const NEXTHOP  = 0x01;
        const IFINDEX  = 0x02;
        const DISTANCE = 0x04;
        const METRIC   = 0x08;
    }
}

/// Subsequent address-family identifier selecting the route sub-table.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Safi {
    #[default]
    Unicast = 1,
    Multicast = 2,
}

impl Safi {
    #[inline]
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Unicast),
            2 => Some(Self::Multicast),
            _ => None,
        }
    }
}

/// Wire tags for nexthop entries.
pub const NEXTHOP_IFINDEX: u8 = 1;
pub const NEXTHOP_IFNAME: u8 = 2;
pub const NEXTHOP_IPV4: u8 = 3;
pub const NEXTHOP_IPV4_IFINDEX: u8 = 4;
pub const NEXTHOP_IPV4_IFNAME: u8 = 5;
pub const NEXTHOP_IPV6: u8 = 6;
pub const NEXTHOP_IPV6_IFINDEX: u8 = 7;
pub const NEXTHOP_IPV6_IFNAME: u8 = 8;
pub const NEXTHOP_BLACKHOLE: u8 = 9;

/// A decoded forwarding target, as seen in lookup replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nexthop {
    Ifindex(u32),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Blackhole,
}

impl Nexthop {
    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self> {
        ensure!(buf.remaining() >= 1, "nexthop entry truncated");
        let tag = buf.get_u8();
        Ok(match tag {
            NEXTHOP_IFINDEX => {
                ensure!(buf.remaining() >= 4, "nexthop ifindex truncated");
                Self::Ifindex(buf.get_u32())
            },
            NEXTHOP_IPV4 => {
                ensure!(buf.remaining() >= 4, "nexthop address truncated");
                let mut o = [0u8; 4];
                buf.copy_to_slice(&mut o);
                Self::Ipv4(Ipv4Addr::from(o))
            },
            NEXTHOP_IPV6 => {
                ensure!(buf.remaining() >= 16, "nexthop address truncated");
                let mut o = [0u8; 16];
                buf.copy_to_slice(&mut o);
                Self::Ipv6(Ipv6Addr::from(o))
            },
            NEXTHOP_BLACKHOLE => Self::Blackhole,
            other => bail!("unknown nexthop tag {other}"),
        })
    }
}

/// IPv4 route attributes as handed to `route_ipv4`.
///
/// `distance` and `metric` travel only when the matching [`ApiMessage`]
/// bit is set; callers leave them zero otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ipv4Route {
    pub route_type: RouteType,
    pub flags: RouteFlags,
    pub message: ApiMessage,
    pub safi: Safi,
    pub nexthops: Vec<Ipv4Addr>,
    pub ifindices: Vec<u32>,
    pub distance: u8,
    pub metric: u32,
}

impl Ipv4Route {
    pub fn encode(&self, cmd: ZCommand, prefix: &Ipv4Prefix) -> Result<Bytes, FrameError> {
        let mut fb = FrameBuilder::new(cmd);
        let b = fb.body_mut();
        b.put_u8(self.route_type.as_u8());
        b.put_u8(self.flags.bits());
        b.put_u8(self.message.bits());
        b.put_u16(self.safi as u16);
        b.put_u8(prefix.len);
        b.put_slice(&prefix.addr.octets()[..crate::models::prefix::psize(prefix.len)]);

        if self.message.contains(ApiMessage::NEXTHOP) {
            if self.flags.contains(RouteFlags::BLACKHOLE) {
                // A blackhole route carries a single sentinel entry and
                // no address bytes.
                b.put_u8(1);
                b.put_u8(NEXTHOP_BLACKHOLE);
            } else {
                b.put_u8((self.nexthops.len() + self.ifindices.len()) as u8);
                for nh in &self.nexthops {
                    b.put_u8(NEXTHOP_IPV4);
                    b.put_slice(&nh.octets());
                }
                for ifindex in &self.ifindices {
                    b.put_u8(NEXTHOP_IFINDEX);
                    b.put_u32(*ifindex);
                }
            }
        }
        if self.message.contains(ApiMessage::DISTANCE) {
            b.put_u8(self.distance);
        }
        if self.message.contains(ApiMessage::METRIC) {
            b.put_u32(self.metric);
        }
        fb.finish()
    }

    /// Decode a body produced by [`Ipv4Route::encode`]; also the shape
    /// the server pushes for redistributed IPv4 routes.
    pub fn decode(payload: &[u8]) -> Result<(Ipv4Prefix, Self)> {
        let mut buf = payload;
        ensure!(buf.remaining() >= 6, "route body truncated");
        let route_type = RouteType::from_u8(buf.get_u8())
            .ok_or_else(|| anyhow::anyhow!("unknown route type"))?;
        let flags = RouteFlags::from_bits_retain(buf.get_u8());
        let message = ApiMessage::from_bits_retain(buf.get_u8());
        let safi_raw = buf.get_u16();
        let safi = Safi::from_u16(safi_raw)
            .ok_or_else(|| anyhow::anyhow!("unknown SAFI {safi_raw}"))?;
        let plen = buf.get_u8();
        ensure!(plen <= 32, "IPv4 prefix length {plen} out of range");
        let addr = get_ipv4_truncated(&mut buf, plen)?;
        let prefix = Ipv4Prefix { addr, len: plen };

        let mut route = Self {
            route_type,
            flags,
            message,
            safi,
            ..Default::default()
        };
        if message.contains(ApiMessage::NEXTHOP) {
            ensure!(buf.remaining() >= 1, "nexthop count truncated");
            let count = buf.get_u8();
            for _ in 0..count {
                match Nexthop::decode(&mut buf)? {
                    Nexthop::Ipv4(a) => route.nexthops.push(a),
                    Nexthop::Ifindex(i) => route.ifindices.push(i),
                    Nexthop::Blackhole => {},
                    Nexthop::Ipv6(_) => bail!("IPv6 nexthop in IPv4 route"),
                }
            }
        }
        if message.contains(ApiMessage::DISTANCE) {
            ensure!(buf.remaining() >= 1, "distance truncated");
            route.distance = buf.get_u8();
        }
        if message.contains(ApiMessage::METRIC) {
            ensure!(buf.remaining() >= 4, "metric truncated");
            route.metric = buf.get_u32();
        }
        Ok((prefix, route))
    }
}

/// IPv6 route attributes; identical structure with 16-byte addresses
/// and no blackhole shortcut.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ipv6Route {
    pub route_type: RouteType,
    pub flags: RouteFlags,
    pub message: ApiMessage,
    pub safi: Safi,
    pub nexthops: Vec<Ipv6Addr>,
    pub ifindices: Vec<u32>,
    pub distance: u8,
    pub metric: u32,
}

impl Ipv6Route {
    pub fn encode(&self, cmd: ZCommand, prefix: &Ipv6Prefix) -> Result<Bytes, FrameError> {
        let mut fb = FrameBuilder::new(cmd);
        let b = fb.body_mut();
        b.put_u8(self.route_type.as_u8());
        b.put_u8(self.flags.bits());
        b.put_u8(self.message.bits());
        b.put_u16(self.safi as u16);
        b.put_u8(prefix.len);
        b.put_slice(&prefix.addr.octets()[..crate::models::prefix::psize(prefix.len)]);

        if self.message.contains(ApiMessage::NEXTHOP) {
            b.put_u8((self.nexthops.len() + self.ifindices.len()) as u8);
            for nh in &self.nexthops {
                b.put_u8(NEXTHOP_IPV6);
                b.put_slice(&nh.octets());
            }
            for ifindex in &self.ifindices {
                b.put_u8(NEXTHOP_IFINDEX);
                b.put_u32(*ifindex);
            }
        }
        if self.message.contains(ApiMessage::DISTANCE) {
            b.put_u8(self.distance);
        }
        if self.message.contains(ApiMessage::METRIC) {
            b.put_u32(self.metric);
        }
        fb.finish()
    }

    pub fn decode(payload: &[u8]) -> Result<(Ipv6Prefix, Self)> {
        let mut buf = payload;
        ensure!(buf.remaining() >= 6, "route body truncated");
        let route_type = RouteType::from_u8(buf.get_u8())
            .ok_or_else(|| anyhow::anyhow!("unknown route type"))?;
        let flags = RouteFlags::from_bits_retain(buf.get_u8());
        let message = ApiMessage::from_bits_retain(buf.get_u8());
        let safi_raw = buf.get_u16();
        let safi = Safi::from_u16(safi_raw)
            .ok_or_else(|| anyhow::anyhow!("unknown SAFI {safi_raw}"))?;
        let plen = buf.get_u8();
        ensure!(plen <= 128, "IPv6 prefix length {plen} out of range");
        let addr = get_ipv6_truncated(&mut buf, plen)?;
        let prefix = Ipv6Prefix { addr, len: plen };

        let mut route = Self {
            route_type,
            flags,
            message,
            safi,
            ..Default::default()
        };
        if message.contains(ApiMessage::NEXTHOP) {
            ensure!(buf.remaining() >= 1, "nexthop count truncated");
            let count = buf.get_u8();
            for _ in 0..count {
                match Nexthop::decode(&mut buf)? {
                    Nexthop::Ipv6(a) => route.nexthops.push(a),
                    Nexthop::Ifindex(i) => route.ifindices.push(i),
                    Nexthop::Blackhole => {},
                    Nexthop::Ipv4(_) => bail!("IPv4 nexthop in IPv6 route"),
                }
            }
        }
        if message.contains(ApiMessage::DISTANCE) {
            ensure!(buf.remaining() >= 1, "distance truncated");
            route.distance = buf.get_u8();
        }
        if message.contains(ApiMessage::METRIC) {
            ensure!(buf.remaining() >= 4, "metric truncated");
            route.metric = buf.get_u32();
        }
        Ok((prefix, route))
    }
}
