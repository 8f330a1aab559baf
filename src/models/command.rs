// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command codes carried in the two-byte `command` field of every frame.
//!
//! The numbering is part of the wire contract with the server and must
//! never be reordered. Codes the client does not know are *not* an
//! error: the dispatcher drops such frames silently so that an older
//! client keeps working against a newer server.

use std::convert::TryFrom;

use thiserror::Error;

/// All commands understood by this client, requests and notifications
/// alike.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZCommand {
    InterfaceAdd = 1,
    InterfaceDelete = 2,
    InterfaceAddressAdd = 3,
    InterfaceAddressDelete = 4,
    InterfaceUp = 5,
    InterfaceDown = 6,
    Ipv4RouteAdd = 7,
    Ipv4RouteDelete = 8,
    Ipv6RouteAdd = 9,
    Ipv6RouteDelete = 10,
    RedistributeAdd = 11,
    RedistributeDelete = 12,
    RedistributeDefaultAdd = 13,
    RedistributeDefaultDelete = 14,
    Ipv4NexthopLookup = 15,
    Ipv6NexthopLookup = 16,
    Ipv4ImportLookup = 17,
    Ipv6ImportLookup = 18,
    InterfaceRename = 19,
    RouterIdAdd = 20,
    RouterIdDelete = 21,
    RouterIdUpdate = 22,
    Hello = 23,
}

impl ZCommand {
    #[inline]
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => Self::InterfaceAdd,
            2 => Self::InterfaceDelete,
            3 => Self::InterfaceAddressAdd,
            4 => Self::InterfaceAddressDelete,
            5 => Self::InterfaceUp,
            6 => Self::InterfaceDown,
            7 => Self::Ipv4RouteAdd,
            8 => Self::Ipv4RouteDelete,
            9 => Self::Ipv6RouteAdd,
            10 => Self::Ipv6RouteDelete,
            11 => Self::RedistributeAdd,
            12 => Self::RedistributeDelete,
            13 => Self::RedistributeDefaultAdd,
            14 => Self::RedistributeDefaultDelete,
            15 => Self::Ipv4NexthopLookup,
            16 => Self::Ipv6NexthopLookup,
            17 => Self::Ipv4ImportLookup,
            18 => Self::Ipv6ImportLookup,
            19 => Self::InterfaceRename,
            20 => Self::RouterIdAdd,
            21 => Self::RouterIdDelete,
            22 => Self::RouterIdUpdate,
            23 => Self::Hello,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Returned when the command field holds a code this client has no
/// definition for.
#[derive(Debug, Error)]
#[error("unknown command code: {0}")]
pub struct UnknownCommand(pub u16);

impl TryFrom<u16> for ZCommand {
    type Error = UnknownCommand;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Self::from_u16(v).ok_or(UnknownCommand(v))
    }
}
