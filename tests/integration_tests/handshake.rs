// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::rc::Rc;

use zserv_client_rs::{
    cfg::{config::ClientConfig, enums::RouteType},
    client::{RedistOp, ZClient},
    models::command::ZCommand,
    reactor::nexus::Nexus,
};

use crate::integration_tests::common::{TestServer, drive, parse_frames, settle};

const HELLO: u16 = ZCommand::Hello as u16;
const ROUTER_ID_ADD: u16 = ZCommand::RouterIdAdd as u16;
const INTERFACE_ADD: u16 = ZCommand::InterfaceAdd as u16;
const REDISTRIBUTE_ADD: u16 = ZCommand::RedistributeAdd as u16;
const REDISTRIBUTE_DEFAULT_ADD: u16 = ZCommand::RedistributeDefaultAdd as u16;

fn client_for(server: &TestServer) -> ZClient {
    let mut cfg = ClientConfig::new(Some(RouteType::Bgp));
    cfg.serv_path_set(&server.path);
    assert!(cfg.serv_path.is_some(), "listener path must validate");
    ZClient::new(cfg, None)
}

/// Fresh start against an accepting server: HELLO with the client's
/// route type, then the router-id and interface subscriptions, in that
/// order and with these exact bytes.
#[test]
fn fresh_start_sends_hello_router_id_interface() {
    let mut server = TestServer::bind("fresh");
    let client = client_for(&server);
    let reactor = client.reactor();

    client.start();
    drive(&*reactor, &mut server, |s| s.rx_len() >= 19);

    assert!(client.is_connected());
    assert_eq!(client.fail_count(), 0);
    let raw = server.take_rx();
    assert_eq!(&raw[..7], &[0x00, 0x07, 0xFF, 0x02, 0x00, 0x17, 0x09]);
    assert_eq!(
        parse_frames(&raw),
        vec![
            (HELLO, vec![9]),
            (ROUTER_ID_ADD, vec![]),
            (INTERFACE_ADD, vec![]),
        ]
    );
}

/// After a reconnect the redistribution table is replayed: every
/// subscribed type except the client's own, ascending, exactly once.
#[test]
fn reconnect_replays_subscriptions() {
    let mut server = TestServer::bind("replay");
    let client = client_for(&server);
    let reactor = client.reactor();

    client.start();
    drive(&*reactor, &mut server, |s| s.rx_len() >= 19);
    server.take_rx();

    client
        .redistribute(RedistOp::Add, RouteType::Ripng)
        .expect("subscribe ripng");
    client
        .redistribute(RedistOp::Add, RouteType::Connect)
        .expect("subscribe connected");
    client
        .redistribute_default(RedistOp::Add)
        .expect("subscribe default route");
    drive(&*reactor, &mut server, |s| s.rx_len() >= 7 + 7 + 6);
    assert_eq!(
        parse_frames(&server.take_rx()),
        vec![
            (REDISTRIBUTE_ADD, vec![RouteType::Ripng as u8]),
            (REDISTRIBUTE_ADD, vec![RouteType::Connect as u8]),
            (REDISTRIBUTE_DEFAULT_ADD, vec![]),
        ]
    );

    // Connection goes away; on the next session the subscriptions come
    // back by themselves, ascending this time, and never the client's
    // own route type.
    client.stop();
    server.drop_conn();
    assert!(!client.is_connected());

    client.start();
    drive(&*reactor, &mut server, |s| s.rx_len() >= 19 + 7 + 7 + 6);
    settle(&*reactor, &mut server);
    assert_eq!(
        parse_frames(&server.take_rx()),
        vec![
            (HELLO, vec![9]),
            (ROUTER_ID_ADD, vec![]),
            (INTERFACE_ADD, vec![]),
            (REDISTRIBUTE_ADD, vec![RouteType::Connect as u8]),
            (REDISTRIBUTE_ADD, vec![RouteType::Ripng as u8]),
            (REDISTRIBUTE_DEFAULT_ADD, vec![]),
        ]
    );
}

/// Double subscribe sends one message; unsubscribing something never
/// subscribed, or touching the client's own type, sends nothing.
#[test]
fn subscriptions_are_idempotent_on_the_wire() {
    let mut server = TestServer::bind("idempotent");
    let client = client_for(&server);
    let reactor = client.reactor();

    client.start();
    drive(&*reactor, &mut server, |s| s.rx_len() >= 19);
    server.take_rx();

    client
        .redistribute(RedistOp::Add, RouteType::Connect)
        .expect("first subscribe");
    client
        .redistribute(RedistOp::Add, RouteType::Connect)
        .expect("second subscribe is local");
    client
        .redistribute(RedistOp::Delete, RouteType::Static)
        .expect("delete of unsubscribed type is local");
    client
        .redistribute(RedistOp::Add, RouteType::Bgp)
        .expect("own type never goes on the wire");

    drive(&*reactor, &mut server, |s| s.rx_len() >= 7);
    settle(&*reactor, &mut server);
    assert_eq!(
        parse_frames(&server.take_rx()),
        vec![(REDISTRIBUTE_ADD, vec![RouteType::Connect as u8])]
    );
}

/// Lookup mode connects without any handshake and leaves the socket to
/// the caller, who drives a synchronous request/reply on it.
#[test]
fn lookup_mode_skips_handshake_and_owns_the_socket() {
    use std::{io::IoSlice, net::Ipv4Addr, time::Instant};

    use zserv_client_rs::{
        client::transport::IoOutcome,
        models::lookup::{LookupReply, encode_ipv4_lookup},
        models::route::{NEXTHOP_IPV4, Nexthop},
    };

    let mut server = TestServer::bind("lookup");
    let client = client_for(&server);
    let reactor = client.reactor();

    client.start_lookup();
    drive(&*reactor, &mut server, |s| s.connected());
    settle(&*reactor, &mut server);
    assert!(client.is_connected());
    assert_eq!(server.rx_len(), 0, "lookup sessions send no handshake");

    let query = Ipv4Addr::new(198, 51, 100, 7);
    let request =
        encode_ipv4_lookup(ZCommand::Ipv4NexthopLookup, query).expect("encode lookup");
    let wrote = client
        .with_transport(|t| t.writev(&[IoSlice::new(&request)]))
        .expect("transport available");
    assert_eq!(wrote, IoOutcome::Bytes(request.len()));
    drive(&*reactor, &mut server, |s| s.rx_len() >= request.len());
    assert_eq!(
        parse_frames(&server.take_rx()),
        vec![(
            ZCommand::Ipv4NexthopLookup as u16,
            query.octets().to_vec()
        )]
    );

    // Reply: queried address, metric 20, one IPv4 nexthop.
    let mut reply = vec![0x00, 0x14, 0xFF, 0x02, 0x00, 0x0F];
    reply.extend_from_slice(&query.octets());
    reply.extend_from_slice(&20u32.to_be_bytes());
    reply.push(1);
    reply.push(NEXTHOP_IPV4);
    reply.extend_from_slice(&Ipv4Addr::new(10, 0, 0, 1).octets());
    server.send(&reply);

    // No dispatcher in this mode: the caller reads the socket itself.
    let mut got = Vec::new();
    let deadline = Instant::now() + std::time::Duration::from_secs(2);
    while got.len() < reply.len() {
        assert!(Instant::now() < deadline, "lookup reply never arrived");
        client
            .with_transport(|t| {
                let mut buf = [0u8; 64];
                if let IoOutcome::Bytes(n) = t.read(&mut buf) {
                    got.extend_from_slice(&buf[..n]);
                }
            })
            .expect("transport available");
    }
    let decoded = LookupReply::<Ipv4Addr>::decode(&got[6..]).expect("decode reply");
    assert_eq!(decoded.addr, query);
    assert_eq!(decoded.metric, 20);
    assert_eq!(decoded.nexthops, vec![Nexthop::Ipv4(Ipv4Addr::new(10, 0, 0, 1))]);
}

/// The same handshake and dispatch flow on the polling back-end.
#[test]
fn handshake_runs_on_the_polling_backend() {
    let mut server = TestServer::bind("nexus");
    let mut cfg = ClientConfig::new(Some(RouteType::Bgp));
    cfg.serv_path_set(&server.path);
    let nexus = Rc::new(Nexus::new().expect("nexus"));
    let client = ZClient::new(cfg, Some(nexus.clone()));

    client.start();
    drive(&*nexus, &mut server, |s| s.rx_len() >= 19);
    assert_eq!(
        parse_frames(&server.take_rx()),
        vec![
            (HELLO, vec![9]),
            (ROUTER_ID_ADD, vec![]),
            (INTERFACE_ADD, vec![]),
        ]
    );

    // Inbound dispatch works over the same back-end.
    let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    client.register_handler(ZCommand::RouterIdUpdate, move |_client, cmd, payload| {
        record.borrow_mut().push((cmd, payload.len()));
    });
    // ROUTER_ID_UPDATE: family 2, 192.0.2.1/32.
    server.send(&[0x00, 0x0C, 0xFF, 0x02, 0x00, 0x16, 0x02, 192, 0, 2, 1, 32]);
    drive(&*nexus, &mut server, |_| !seen.borrow().is_empty());
    assert_eq!(*seen.borrow(), vec![(ZCommand::RouterIdUpdate, 6)]);
}
