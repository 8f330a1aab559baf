// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{rc::Rc, time::Duration};

use zserv_client_rs::{
    cfg::{config::ClientConfig, enums::RouteType},
    client::{RedistOp, State, ZClient},
};

use crate::integration_tests::common::{RecordingReactor, unique_sock_path};

fn unreachable_client(tag: &str) -> (Rc<RecordingReactor>, ZClient) {
    let reactor = Rc::new(RecordingReactor::new());
    let mut cfg = ClientConfig::new(Some(RouteType::Bgp));
    // Point straight at a path nobody listens on; the checked setter
    // would reject it, which is exactly the situation of a server that
    // died after validation.
    cfg.serv_path = Some(unique_sock_path(tag));
    let client = ZClient::new(cfg, Some(reactor.clone()));
    (reactor, client)
}

/// Retry delays follow the failure count: 10 s below three failures,
/// 60 s up to ten, nothing at all afterwards.
#[test]
fn backoff_schedule_follows_failure_count() {
    let (reactor, client) = unreachable_client("backoff");

    client.start();
    assert_eq!(client.state(), State::Scheduled);
    assert_eq!(reactor.pending_events(), 1);
    assert!(reactor.fire_next_event()); // attempt #1 fails

    let mut delays = Vec::new();
    for _ in 1..10 {
        assert_eq!(reactor.pending_timers(), 1, "exactly one retry pending");
        delays.push(reactor.fire_next_timer().expect("retry timer"));
    }

    let expected: Vec<Duration> = (1..10)
        .map(|failures| {
            if failures < 3 {
                Duration::from_secs(10)
            } else {
                Duration::from_secs(60)
            }
        })
        .collect();
    assert_eq!(delays, expected);

    // Tenth failure: the machine goes dormant.
    assert_eq!(client.fail_count(), 10);
    assert_eq!(client.state(), State::Failing);
    assert_eq!(reactor.pending_timers(), 0);
    assert_eq!(reactor.pending_events(), 0);
}

/// A dormant handle still takes subscription bookkeeping without any
/// I/O, and only an explicit restart re-enters the machine.
#[test]
fn dormant_handle_requires_explicit_restart() {
    let (reactor, client) = unreachable_client("dormant");

    client.start();
    reactor.fire_next_event();
    for _ in 1..10 {
        reactor.fire_next_timer();
    }
    assert_eq!(client.fail_count(), 10);

    client
        .redistribute(RedistOp::Add, RouteType::Rip)
        .expect("bookkeeping without a socket");
    assert_eq!(reactor.pending_timers(), 0);
    assert_eq!(reactor.pending_events(), 0);

    client.restart();
    assert_eq!(client.fail_count(), 0);
    assert_eq!(client.state(), State::Scheduled);
    assert_eq!(reactor.pending_events(), 1);
}

/// Scheduling a connect while one is already armed does nothing.
#[test]
fn connect_scheduling_is_idempotent() {
    let (reactor, client) = unreachable_client("idem");

    client.start();
    client.start();
    assert_eq!(reactor.pending_events(), 1);
}

/// Stop cancels the pending retry but keeps the failure count.
#[test]
fn stop_cancels_retry_and_keeps_counters() {
    let (reactor, client) = unreachable_client("stop");

    client.start();
    reactor.fire_next_event();
    assert_eq!(client.fail_count(), 1);
    assert_eq!(reactor.pending_timers(), 1);

    client.stop();
    assert_eq!(client.state(), State::Disabled);
    assert_eq!(reactor.pending_timers(), 0);
    assert_eq!(client.fail_count(), 1, "stop leaves counters untouched");
}
