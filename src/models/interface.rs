// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Decoders for the interface event notifications the server pushes:
//! INTERFACE_ADD / DELETE / UP / DOWN and the address add/delete pair.
//!
//! The client never originates these bodies; it only subscribes with a
//! bodyless INTERFACE_ADD and parses what comes back for its handlers.

use std::net::IpAddr;

use anyhow::{Result, ensure};
use bitflags::bitflags;
use bytes::Buf;

use crate::{cfg::enums::HwAddrFormat, models::prefix::get_addr_by_family};

/// Fixed width of the NUL-padded interface name field.
pub const INTERFACE_NAME_LEN: usize = 20;
/// Upper bound accepted for a length-prefixed hardware address.
pub const HW_ADDR_MAX: usize = 20;

bitflags! {
    /// Server-side interface status bits (distinct from the kernel
    /// IFF_* flag word, which travels separately as `flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IfStatus: u8 {
        const ACTIVE         = 0x01;
        const SUB            = 0x02;
        const LINKDETECTION  = 0x04;
    }
}

bitflags! {
    /// Flags on a connected-address notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConnectedFlags: u8 {
        const SECONDARY = 0x01;
        const PEER      = 0x02;
    }
}

/// Decoded INTERFACE_ADD / UP / DOWN / DELETE body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceUpdate {
    pub name: String,
    pub ifindex: u32,
    pub status: IfStatus,
    pub flags: u64,
    pub metric: u32,
    pub mtu: u32,
    pub mtu6: u32,
    pub bandwidth: u32,
    /// Link-layer address; empty for the state-change commands, which
    /// do not carry one.
    pub hw_addr: Vec<u8>,
}

impl InterfaceUpdate {
    /// Decode an INTERFACE_ADD body, including the trailing link-layer
    /// address in the configured wire format.
    pub fn decode_add(payload: &[u8], format: HwAddrFormat) -> Result<Self> {
        let mut buf = payload;
        let mut update = Self::decode_fixed(&mut buf)?;
        update.hw_addr = match format {
            HwAddrFormat::LengthPrefixed => {
                ensure!(buf.remaining() >= 4, "hardware address length truncated");
                let len = buf.get_u32() as usize;
                ensure!(len <= HW_ADDR_MAX, "hardware address of {len} bytes too long");
                ensure!(buf.remaining() >= len, "hardware address truncated");
                let mut hw = vec![0u8; len];
                buf.copy_to_slice(&mut hw);
                hw
            },
            // Opaque link-level sockaddr blob; its size is whatever the
            // server was compiled with, and it is the last field.
            HwAddrFormat::SockaddrDl => buf.copy_to_bytes(buf.remaining()).to_vec(),
        };
        Ok(update)
    }

    /// Decode an INTERFACE_UP / DOWN / DELETE body (no link-layer
    /// address on the wire).
    pub fn decode_state(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        Self::decode_fixed(&mut buf)
    }

    fn decode_fixed(buf: &mut impl Buf) -> Result<Self> {
        ensure!(
            buf.remaining() >= INTERFACE_NAME_LEN + 4 + 1 + 8 + 4 * 4,
            "interface body truncated"
        );
        let mut name_raw = [0u8; INTERFACE_NAME_LEN];
        buf.copy_to_slice(&mut name_raw);
        let name_end = name_raw.iter().position(|&b| b == 0).unwrap_or(INTERFACE_NAME_LEN);
        let name = String::from_utf8_lossy(&name_raw[..name_end]).into_owned();

        Ok(Self {
            name,
            ifindex: buf.get_u32(),
            status: IfStatus::from_bits_retain(buf.get_u8()),
            flags: buf.get_u64(),
            metric: buf.get_u32(),
            mtu: buf.get_u32(),
            mtu6: buf.get_u32(),
            bandwidth: buf.get_u32(),
            hw_addr: Vec::new(),
        })
    }
}

/// Decoded INTERFACE_ADDRESS_ADD / DELETE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub ifindex: u32,
    pub flags: ConnectedFlags,
    pub addr: IpAddr,
    pub prefix_len: u8,
    /// Peer or broadcast address. All-zero bytes on the wire mean "no
    /// destination" and decode to `None`.
    pub destination: Option<IpAddr>,
}

impl InterfaceAddress {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        ensure!(buf.remaining() >= 6, "interface address body truncated");
        let ifindex = buf.get_u32();
        let flags = ConnectedFlags::from_bits_retain(buf.get_u8());
        let family = buf.get_u8();
        let addr = get_addr_by_family(&mut buf, family)?;
        ensure!(buf.remaining() >= 1, "prefix length truncated");
        let prefix_len = buf.get_u8();
        let destination = get_addr_by_family(&mut buf, family)?;
        let destination = if ip_is_unspecified(&destination) {
            None
        } else {
            Some(destination)
        };
        Ok(Self {
            ifindex,
            flags,
            addr,
            prefix_len,
            destination,
        })
    }
}

fn ip_is_unspecified(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(a) => a.is_unspecified(),
        IpAddr::V6(a) => a.is_unspecified(),
    }
}
