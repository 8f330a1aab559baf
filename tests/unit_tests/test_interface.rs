// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use anyhow::Result;
use bytes::{BufMut, BytesMut};
use zserv_client_rs::{
    cfg::enums::HwAddrFormat,
    models::{
        interface::{ConnectedFlags, IfStatus, InterfaceAddress, InterfaceUpdate},
        prefix::{AF_INET, AF_INET6, Ipv4Prefix, Prefix},
        router_id::decode_router_id,
    },
};

fn put_interface_fixed(buf: &mut BytesMut, name: &str, ifindex: u32) {
    let mut name_field = [0u8; 20];
    name_field[..name.len()].copy_from_slice(name.as_bytes());
    buf.put_slice(&name_field);
    buf.put_u32(ifindex);
    buf.put_u8(IfStatus::ACTIVE.bits());
    buf.put_u64(0x0000_0000_0001_1043); // kernel flag word
    buf.put_u32(1); // metric
    buf.put_u32(1500); // mtu
    buf.put_u32(1480); // mtu6
    buf.put_u32(10_000); // bandwidth
}

#[test]
fn interface_add_with_length_prefixed_hw_addr() -> Result<()> {
    let mut buf = BytesMut::new();
    put_interface_fixed(&mut buf, "eth0", 3);
    buf.put_u32(6);
    buf.put_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);

    let update = InterfaceUpdate::decode_add(&buf, HwAddrFormat::LengthPrefixed)?;
    assert_eq!(update.name, "eth0");
    assert_eq!(update.ifindex, 3);
    assert_eq!(update.status, IfStatus::ACTIVE);
    assert_eq!(update.flags, 0x0000_0000_0001_1043);
    assert_eq!(update.metric, 1);
    assert_eq!(update.mtu, 1500);
    assert_eq!(update.mtu6, 1480);
    assert_eq!(update.bandwidth, 10_000);
    assert_eq!(update.hw_addr, vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);
    Ok(())
}

#[test]
fn interface_add_with_sockaddr_dl_blob() -> Result<()> {
    let mut buf = BytesMut::new();
    put_interface_fixed(&mut buf, "em0", 1);
    let blob = [0x14u8; 20];
    buf.put_slice(&blob);

    let update = InterfaceUpdate::decode_add(&buf, HwAddrFormat::SockaddrDl)?;
    assert_eq!(update.name, "em0");
    assert_eq!(update.hw_addr, blob.to_vec());
    Ok(())
}

#[test]
fn interface_state_change_has_no_hw_addr() -> Result<()> {
    let mut buf = BytesMut::new();
    put_interface_fixed(&mut buf, "ppp0", 9);

    let update = InterfaceUpdate::decode_state(&buf)?;
    assert_eq!(update.name, "ppp0");
    assert_eq!(update.ifindex, 9);
    assert!(update.hw_addr.is_empty());
    Ok(())
}

#[test]
fn interface_decode_rejects_truncated_body() {
    let mut buf = BytesMut::new();
    put_interface_fixed(&mut buf, "eth1", 4);
    assert!(InterfaceUpdate::decode_state(&buf[..30]).is_err());
}

#[test]
fn interface_address_with_destination() -> Result<()> {
    let mut buf = BytesMut::new();
    buf.put_u32(2);
    buf.put_u8(ConnectedFlags::PEER.bits());
    buf.put_u8(AF_INET);
    buf.put_slice(&Ipv4Addr::new(10, 0, 0, 1).octets());
    buf.put_u8(30);
    buf.put_slice(&Ipv4Addr::new(10, 0, 0, 2).octets());

    let conn = InterfaceAddress::decode(&buf)?;
    assert_eq!(conn.ifindex, 2);
    assert_eq!(conn.flags, ConnectedFlags::PEER);
    assert_eq!(conn.addr, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(conn.prefix_len, 30);
    assert_eq!(conn.destination, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
    Ok(())
}

/// An all-zero destination means "no destination" and must decode to
/// `None`.
#[test]
fn interface_address_elides_zero_destination() -> Result<()> {
    let mut buf = BytesMut::new();
    buf.put_u32(5);
    buf.put_u8(0);
    buf.put_u8(AF_INET6);
    buf.put_slice(&"2001:db8::1".parse::<Ipv6Addr>()?.octets());
    buf.put_u8(64);
    buf.put_slice(&[0u8; 16]);

    let conn = InterfaceAddress::decode(&buf)?;
    assert_eq!(conn.addr, IpAddr::V6("2001:db8::1".parse()?));
    assert_eq!(conn.prefix_len, 64);
    assert_eq!(conn.destination, None);
    Ok(())
}

#[test]
fn router_id_update_decodes_both_families() -> Result<()> {
    let mut buf = BytesMut::new();
    buf.put_u8(AF_INET);
    buf.put_slice(&Ipv4Addr::new(192, 0, 2, 1).octets());
    buf.put_u8(32);
    assert_eq!(
        decode_router_id(&buf)?,
        Prefix::V4(Ipv4Prefix::new(Ipv4Addr::new(192, 0, 2, 1), 32)?)
    );

    let mut buf = BytesMut::new();
    buf.put_u8(AF_INET6);
    buf.put_slice(&"2001:db8::99".parse::<Ipv6Addr>()?.octets());
    buf.put_u8(128);
    let Prefix::V6(p6) = decode_router_id(&buf)? else {
        panic!("expected an IPv6 router id");
    };
    assert_eq!(p6.addr, "2001:db8::99".parse::<Ipv6Addr>()?);
    assert_eq!(p6.len, 128);
    Ok(())
}

#[test]
fn router_id_update_rejects_unknown_family() {
    let buf = [42u8, 0, 0, 0, 0, 0];
    assert!(decode_router_id(&buf).is_err());
}
