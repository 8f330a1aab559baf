// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Route origin identifiers, shared between configuration and the wire
/// (one byte there).
///
/// A daemon names its own type through `RouteType`; the same values key
/// the redistribution subscription table.
#[repr(u8)]
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteType {
    #[default]
    #[serde(rename = "system", alias = "System", alias = "SYSTEM")]
    System = 0,
    #[serde(rename = "kernel", alias = "Kernel", alias = "KERNEL")]
    Kernel = 1,
    #[serde(rename = "connected", alias = "Connected", alias = "CONNECTED")]
    Connect = 2,
    #[serde(rename = "static", alias = "Static", alias = "STATIC")]
    Static = 3,
    #[serde(rename = "rip", alias = "Rip", alias = "RIP")]
    Rip = 4,
    #[serde(rename = "ripng", alias = "Ripng", alias = "RIPNG")]
    Ripng = 5,
    #[serde(rename = "ospf", alias = "Ospf", alias = "OSPF")]
    Ospf = 6,
    #[serde(rename = "ospf6", alias = "Ospf6", alias = "OSPF6")]
    Ospf6 = 7,
    #[serde(rename = "isis", alias = "Isis", alias = "ISIS")]
    Isis = 8,
    #[serde(rename = "bgp", alias = "Bgp", alias = "BGP")]
    Bgp = 9,
    #[serde(rename = "pim", alias = "Pim", alias = "PIM")]
    Pim = 10,
    #[serde(rename = "hsls", alias = "Hsls", alias = "HSLS")]
    Hsls = 11,
    #[serde(rename = "olsr", alias = "Olsr", alias = "OLSR")]
    Olsr = 12,
    #[serde(rename = "babel", alias = "Babel", alias = "BABEL")]
    Babel = 13,
}

impl RouteType {
    /// Number of route-type slots in the subscription table.
    pub const MAX: usize = 14;

    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::System,
            1 => Self::Kernel,
            2 => Self::Connect,
            3 => Self::Static,
            4 => Self::Rip,
            5 => Self::Ripng,
            6 => Self::Ospf,
            7 => Self::Ospf6,
            8 => Self::Isis,
            9 => Self::Bgp,
            10 => Self::Pim,
            11 => Self::Hsls,
            12 => Self::Olsr,
            13 => Self::Babel,
            _ => return None,
        })
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteType::System => "system",
            RouteType::Kernel => "kernel",
            RouteType::Connect => "connected",
            RouteType::Static => "static",
            RouteType::Rip => "rip",
            RouteType::Ripng => "ripng",
            RouteType::Ospf => "ospf",
            RouteType::Ospf6 => "ospf6",
            RouteType::Isis => "isis",
            RouteType::Bgp => "bgp",
            RouteType::Pim => "pim",
            RouteType::Hsls => "hsls",
            RouteType::Olsr => "olsr",
            RouteType::Babel => "babel",
        })
    }
}

/// Wire format of the link-layer address trailing an INTERFACE_ADD.
///
/// The frame is not self-describing here: which encoding is on the wire
/// depends on how the server was built, so the choice has to come from
/// configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HwAddrFormat {
    #[default]
    #[serde(rename = "length-prefixed", alias = "LengthPrefixed")]
    LengthPrefixed,
    #[serde(rename = "sockaddr-dl", alias = "SockaddrDl")]
    SockaddrDl,
}

impl fmt::Display for HwAddrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HwAddrFormat::LengthPrefixed => "length-prefixed",
            HwAddrFormat::SockaddrDl => "sockaddr-dl",
        })
    }
}
