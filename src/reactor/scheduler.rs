// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The generic callback scheduler back-end.
//!
//! Four primitives — immediate events, timers, per-descriptor read and
//! write thunks — each held in its own list. The descriptor set is
//! rebuilt for every `poll(2)` call rather than kept registered in the
//! kernel; with the handful of descriptors a control client owns this
//! is cheaper than it looks and keeps the bookkeeping trivial.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap, VecDeque},
    os::fd::RawFd,
    time::{Duration, Instant},
};

use tracing::warn;

use crate::reactor::{Callback, Reactor, Token};

#[derive(Default)]
struct Lists {
    next_token: u64,
    events: VecDeque<(Token, Callback)>,
    timers: BTreeMap<(Instant, Token), Callback>,
    reads: HashMap<RawFd, (Token, Callback)>,
    writes: HashMap<RawFd, (Token, Callback)>,
}

impl Lists {
    fn next_token(&mut self) -> Token {
        self.next_token += 1;
        Token(self.next_token)
    }
}

#[derive(Default)]
pub struct Scheduler {
    lists: RefCell<Lists>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reactor for Scheduler {
    fn arm_event(&self, cb: Callback) -> Token {
        let mut lists = self.lists.borrow_mut();
        let token = lists.next_token();
        lists.events.push_back((token, cb));
        token
    }

    fn arm_timer_at(&self, deadline: Instant, cb: Callback) -> Token {
        let mut lists = self.lists.borrow_mut();
        let token = lists.next_token();
        lists.timers.insert((deadline, token), cb);
        token
    }

    fn arm_read(&self, fd: RawFd, cb: Callback) -> Token {
        let mut lists = self.lists.borrow_mut();
        let token = lists.next_token();
        lists.reads.insert(fd, (token, cb));
        token
    }

    fn arm_write(&self, fd: RawFd, cb: Callback) -> Token {
        let mut lists = self.lists.borrow_mut();
        let token = lists.next_token();
        lists.writes.insert(fd, (token, cb));
        token
    }

    fn disarm(&self, token: Token) {
        let mut lists = self.lists.borrow_mut();
        lists.events.retain(|(t, _)| *t != token);
        if let Some(key) = lists.timers.keys().find(|(_, t)| *t == token).copied() {
            lists.timers.remove(&key);
        }
        lists.reads.retain(|_, (t, _)| *t != token);
        lists.writes.retain(|_, (t, _)| *t != token);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn poll_once(&self, max_wait: Option<Duration>) -> usize {
        let (mut pollfds, timeout_ms) = {
            let lists = self.lists.borrow();

            let mut interest: HashMap<RawFd, i16> = HashMap::new();
            for fd in lists.reads.keys() {
                *interest.entry(*fd).or_insert(0) |= libc::POLLIN;
            }
            for fd in lists.writes.keys() {
                *interest.entry(*fd).or_insert(0) |= libc::POLLOUT;
            }
            let pollfds: Vec<libc::pollfd> = interest
                .into_iter()
                .map(|(fd, events)| libc::pollfd {
                    fd,
                    events,
                    revents: 0,
                })
                .collect();

            let timeout_ms = if lists.events.is_empty() {
                let until_timer = lists
                    .timers
                    .keys()
                    .next()
                    .map(|(deadline, _)| deadline.saturating_duration_since(Instant::now()));
                match shorter(until_timer, max_wait) {
                    Some(d) => i32::try_from(d.as_millis()).unwrap_or(i32::MAX),
                    // Nothing armed anywhere and no wait bound: sleeping
                    // here would never wake up.
                    None if pollfds.is_empty() && lists.timers.is_empty() => return 0,
                    None => -1,
                }
            } else {
                0
            };
            (pollfds, timeout_ms)
        };

        if !pollfds.is_empty() || timeout_ms != 0 {
            let rc = unsafe {
                libc::poll(
                    pollfds.as_mut_ptr(),
                    pollfds.len() as libc::nfds_t,
                    timeout_ms,
                )
            };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::Interrupted {
                    warn!("poll failed: {err}");
                }
            }
        }

        let mut due: Vec<Callback> = Vec::new();
        {
            let mut lists = self.lists.borrow_mut();

            // Only the events queued before this pass: a callback that
            // re-queues runs on the next tick, not in a tight loop here.
            for _ in 0..lists.events.len() {
                if let Some((_, cb)) = lists.events.pop_front() {
                    due.push(cb);
                }
            }

            let now = Instant::now();
            while let Some(key) = lists
                .timers
                .keys()
                .next()
                .copied()
                .filter(|(deadline, _)| *deadline <= now)
            {
                if let Some(cb) = lists.timers.remove(&key) {
                    due.push(cb);
                }
            }

            for pfd in &pollfds {
                if pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0
                    && let Some((_, cb)) = lists.reads.remove(&pfd.fd)
                {
                    due.push(cb);
                }
                if pfd.revents & (libc::POLLOUT | libc::POLLERR) != 0
                    && let Some((_, cb)) = lists.writes.remove(&pfd.fd)
                {
                    due.push(cb);
                }
            }
        }

        let ran = due.len();
        for cb in due {
            cb();
        }
        ran
    }
}

fn shorter(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
