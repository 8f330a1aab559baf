// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The polling-reactor back-end.
//!
//! Descriptors stay registered with the kernel poller for as long as
//! any interest is armed; arming and disarming only flip the read/write
//! interest bits on the existing registration. Timers live in a small
//! ordered wheel keyed by monotonic deadline and bound the poll
//! timeout.
//!
//! Re-registration on every interest change is deliberate: the poller
//! delivers edge-style notifications, and an interest update re-arms
//! the edge so a descriptor that is already ready fires again.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    io,
    os::fd::RawFd,
    time::{Duration, Instant},
};

use mio::{Events, Interest, Poll, Token as MioToken, unix::SourceFd};
use tracing::{debug, warn};

use crate::reactor::{Callback, Reactor, Token};

#[derive(Default)]
struct PollFile {
    read: Option<(Token, Callback)>,
    write: Option<(Token, Callback)>,
    registered: Option<Interest>,
}

impl PollFile {
    fn desired_interest(&self) -> Option<Interest> {
        match (self.read.is_some(), self.write.is_some()) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

struct Wheel {
    next_token: u64,
    files: HashMap<RawFd, PollFile>,
    timers: BTreeMap<(Instant, Token), Callback>,
}

pub struct Nexus {
    poll: RefCell<Poll>,
    events: RefCell<Events>,
    wheel: RefCell<Wheel>,
}

impl Nexus {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: RefCell::new(Poll::new()?),
            events: RefCell::new(Events::with_capacity(64)),
            wheel: RefCell::new(Wheel {
                next_token: 0,
                files: HashMap::new(),
                timers: BTreeMap::new(),
            }),
        })
    }

    fn alloc_token(wheel: &mut Wheel) -> Token {
        wheel.next_token += 1;
        Token(wheel.next_token)
    }

    /// Sync the kernel registration of `fd` with the armed callbacks,
    /// dropping the file entry once nothing is armed on it.
    fn sync_registration(&self, wheel: &mut Wheel, fd: RawFd) {
        let Some(file) = wheel.files.get_mut(&fd) else {
            return;
        };
        let desired = file.desired_interest();
        let poll = self.poll.borrow();
        let registry = poll.registry();
        let outcome = match (file.registered, desired) {
            (None, Some(interest)) => {
                registry.register(&mut SourceFd(&fd), MioToken(fd as usize), interest)
            },
            // Re-register even when the bits did not change; see the
            // module note on edge re-arming.
            (Some(_), Some(interest)) => {
                registry.reregister(&mut SourceFd(&fd), MioToken(fd as usize), interest)
            },
            (Some(_), None) => registry.deregister(&mut SourceFd(&fd)),
            (None, None) => Ok(()),
        };
        if let Err(e) = outcome {
            debug!(fd, "poll registration update failed: {e}");
        }
        file.registered = desired;
        if desired.is_none() {
            wheel.files.remove(&fd);
        }
    }
}

impl Reactor for Nexus {
    fn arm_timer_at(&self, deadline: Instant, cb: Callback) -> Token {
        let mut wheel = self.wheel.borrow_mut();
        let token = Self::alloc_token(&mut wheel);
        wheel.timers.insert((deadline, token), cb);
        token
    }

    fn arm_read(&self, fd: RawFd, cb: Callback) -> Token {
        let mut wheel = self.wheel.borrow_mut();
        let token = Self::alloc_token(&mut wheel);
        wheel.files.entry(fd).or_default().read = Some((token, cb));
        self.sync_registration(&mut wheel, fd);
        token
    }

    fn arm_write(&self, fd: RawFd, cb: Callback) -> Token {
        let mut wheel = self.wheel.borrow_mut();
        let token = Self::alloc_token(&mut wheel);
        wheel.files.entry(fd).or_default().write = Some((token, cb));
        self.sync_registration(&mut wheel, fd);
        token
    }

    fn disarm(&self, token: Token) {
        let mut wheel = self.wheel.borrow_mut();
        if let Some(key) = wheel.timers.keys().find(|(_, t)| *t == token).copied() {
            wheel.timers.remove(&key);
            return;
        }
        let mut touched = None;
        for (fd, file) in wheel.files.iter_mut() {
            if file.read.as_ref().is_some_and(|(t, _)| *t == token) {
                file.read = None;
                touched = Some(*fd);
                break;
            }
            if file.write.as_ref().is_some_and(|(t, _)| *t == token) {
                file.write = None;
                touched = Some(*fd);
                break;
            }
        }
        if let Some(fd) = touched {
            self.sync_registration(&mut wheel, fd);
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn poll_once(&self, max_wait: Option<Duration>) -> usize {
        let timeout = {
            let wheel = self.wheel.borrow();
            let until_timer = wheel
                .timers
                .keys()
                .next()
                .map(|(deadline, _)| deadline.saturating_duration_since(Instant::now()));
            match (until_timer, max_wait) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => {
                    if wheel.files.is_empty() {
                        return 0;
                    }
                    None
                },
            }
        };

        let mut ready_fds: Vec<(RawFd, bool, bool)> = Vec::new();
        {
            let mut poll = self.poll.borrow_mut();
            let mut events = self.events.borrow_mut();
            if let Err(e) = poll.poll(&mut events, timeout) {
                if e.kind() != io::ErrorKind::Interrupted {
                    warn!("poll failed: {e}");
                }
            }
            for ev in events.iter() {
                let readable = ev.is_readable() || ev.is_read_closed() || ev.is_error();
                let writable = ev.is_writable() || ev.is_write_closed() || ev.is_error();
                ready_fds.push((ev.token().0 as RawFd, readable, writable));
            }
        }

        let mut due: Vec<Callback> = Vec::new();
        {
            let mut wheel = self.wheel.borrow_mut();

            let now = Instant::now();
            while let Some(key) = wheel
                .timers
                .keys()
                .next()
                .copied()
                .filter(|(deadline, _)| *deadline <= now)
            {
                if let Some(cb) = wheel.timers.remove(&key) {
                    due.push(cb);
                }
            }

            for (fd, readable, writable) in ready_fds {
                let Some(file) = wheel.files.get_mut(&fd) else {
                    continue;
                };
                if readable && let Some((_, cb)) = file.read.take() {
                    due.push(cb);
                }
                if writable && let Some((_, cb)) = file.write.take() {
                    due.push(cb);
                }
                self.sync_registration(&mut wheel, fd);
            }
        }

        let ran = due.len();
        for cb in due {
            cb();
        }
        ran
    }
}
