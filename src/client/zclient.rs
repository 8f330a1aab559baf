// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client handle: connection lifecycle, inbound dispatch, and the
//! outbound request API.
//!
//! A [`ZClient`] is a cheap-clone wrapper over a reference-counted
//! core. Every callback armed with the reactor captures a clone, so
//! for as long as any registration is outstanding the reactor itself
//! keeps the core alive; there is no way to free a handle out from
//! under a pending callback.
//!
//! All of it is single-threaded and cooperative: callbacks, timers and
//! the embedder's own calls share one executor thread, and no callback
//! does more than one frame of work before yielding.

use std::{cell::RefCell, rc::Rc, time::Duration};

use bytes::{BufMut, Bytes};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    cfg::{config::ClientConfig, enums::RouteType},
    client::{
        buffer::{ReadBuffer, WriteBuffer, WriteStatus},
        transport::{IoOutcome, Transport},
    },
    handlers::HandlerTable,
    models::{
        command::ZCommand,
        header::{FrameBuilder, FrameError, HEADER_LEN, ZservHeader, empty_frame},
        prefix::{Ipv4Prefix, Ipv6Prefix},
        route::{Ipv4Route, Ipv6Route},
    },
    reactor::{Reactor, Token, scheduler::Scheduler},
};

/// Retry delay while failures are still fresh.
pub const CONNECT_RETRY_SHORT: Duration = Duration::from_secs(10);
/// Retry delay once failures look persistent.
pub const CONNECT_RETRY_LONG: Duration = Duration::from_secs(60);
/// Failure count at which the long delay kicks in.
pub const FAIL_THRESHOLD_LONG: u32 = 3;
/// Failure count at which the client stops retrying altogether.
pub const FAIL_CAP: u32 = 10;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is not connected")]
    NotConnected,
    #[error("connection failed while sending")]
    Transport,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disabled,
    Scheduled,
    Connecting,
    Connected,
    Failing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedistOp {
    Add,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCmd {
    Add,
    Delete,
}

/// How the connection is used once it is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    /// Handshake on connect, dispatcher armed: the normal daemon
    /// session.
    Full,
    /// Bare socket for synchronous lookup callers; no handshake, no
    /// read arm.
    Lookup,
}

struct Core {
    config: ClientConfig,
    enabled: bool,
    state: State,
    session: SessionKind,
    sock: Option<Transport>,
    ibuf: ReadBuffer,
    obuf: WriteBuffer,
    fail: u32,
    /// Subscription table; the slot for the client's own route type is
    /// pinned on for the life of the handle.
    redist: [bool; RouteType::MAX],
    default_information: bool,
    t_connect: Option<Token>,
    t_read: Option<Token>,
    t_write: Option<Token>,
}

#[derive(Clone)]
pub struct ZClient {
    core: Rc<RefCell<Core>>,
    handlers: Rc<RefCell<HandlerTable>>,
    reactor: Rc<dyn Reactor>,
}

impl ZClient {
    /// Build a handle. `reactor: None` selects the built-in callback
    /// scheduler; pass a shared [`crate::reactor::nexus::Nexus`] (or
    /// anything else implementing [`Reactor`]) to run on the
    /// embedder's poll loop instead.
    pub fn new(config: ClientConfig, reactor: Option<Rc<dyn Reactor>>) -> Self {
        let reactor = reactor.unwrap_or_else(|| Rc::new(Scheduler::new()));
        let mut redist = [false; RouteType::MAX];
        if let Some(own) = config.route_type {
            redist[own as usize] = true;
        }
        Self {
            core: Rc::new(RefCell::new(Core {
                config,
                enabled: false,
                state: State::Disabled,
                session: SessionKind::Full,
                sock: None,
                ibuf: ReadBuffer::new(),
                obuf: WriteBuffer::new(),
                fail: 0,
                redist,
                default_information: false,
                t_connect: None,
                t_read: None,
                t_write: None,
            })),
            handlers: Rc::new(RefCell::new(HandlerTable::new())),
            reactor,
        }
    }

    /// The reactor this handle runs on; the embedder drives it with
    /// `poll_once` unless it supplied its own.
    pub fn reactor(&self) -> Rc<dyn Reactor> {
        Rc::clone(&self.reactor)
    }

    /// Shared access to the handler table, for bulk registration.
    pub fn handlers(&self) -> Rc<RefCell<HandlerTable>> {
        Rc::clone(&self.handlers)
    }

    pub fn register_handler<F>(&self, command: ZCommand, handler: F)
    where
        F: FnMut(&ZClient, ZCommand, Bytes) + 'static,
    {
        self.handlers.borrow_mut().register(command, handler);
    }

    /// Enable the client and schedule the first connect attempt.
    pub fn start(&self) {
        self.start_session(SessionKind::Full);
    }

    /// Enable in lookup mode: connect without handshake or dispatcher;
    /// the caller drives the socket through [`ZClient::with_transport`].
    pub fn start_lookup(&self) {
        self.start_session(SessionKind::Lookup);
    }

    fn start_session(&self, session: SessionKind) {
        let mut core = self.core.borrow_mut();
        core.enabled = true;
        core.session = session;
        core.fail = 0;
        self.schedule_connect(&mut core);
    }

    /// Drop any current connection and go back to `Scheduled`, clearing
    /// the failure count. This is the only way back from the dormant
    /// state after [`FAIL_CAP`] consecutive failures.
    pub fn restart(&self) {
        let mut core = self.core.borrow_mut();
        self.teardown(&mut core);
        core.enabled = true;
        core.fail = 0;
        self.schedule_connect(&mut core);
    }

    /// Disable the client: close the socket, cancel every pending
    /// event, keep counters and subscriptions. `start` brings it back.
    pub fn stop(&self) {
        let mut core = self.core.borrow_mut();
        core.enabled = false;
        self.teardown(&mut core);
        core.state = State::Disabled;
    }

    pub fn state(&self) -> State {
        self.core.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        let core = self.core.borrow();
        core.state == State::Connected && core.sock.is_some()
    }

    pub fn fail_count(&self) -> u32 {
        self.core.borrow().fail
    }

    /// Borrow the connected socket, for lookup-mode callers that do
    /// their own synchronous send/receive. `None` when not connected.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut Transport) -> R) -> Option<R> {
        let mut core = self.core.borrow_mut();
        core.sock.as_mut().map(f)
    }

    // ── Outbound request API ────────────────────────────────────────

    /// Subscribe to (or drop) redistribution of `route_type`.
    ///
    /// Bookkeeping is idempotent and survives reconnects: the wire
    /// message goes out now when the socket is up, and again after
    /// every reconnect handshake. The client's own route type is never
    /// requested back.
    pub fn redistribute(
        &self,
        op: RedistOp,
        route_type: RouteType,
    ) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        if Some(route_type) == core.config.route_type {
            debug!(%route_type, "own route type subscription is fixed");
            return Ok(());
        }
        let slot = route_type as usize;
        match op {
            RedistOp::Add => {
                if core.redist[slot] {
                    return Ok(());
                }
                core.redist[slot] = true;
            },
            RedistOp::Delete => {
                if !core.redist[slot] {
                    return Ok(());
                }
                core.redist[slot] = false;
            },
        }
        if core.state == State::Connected && core.sock.is_some() {
            self.send_or_fail(&mut core, redistribute_frame(op, route_type)?)?;
        }
        Ok(())
    }

    /// Subscribe to (or drop) default-route redistribution.
    pub fn redistribute_default(&self, op: RedistOp) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        let want = op == RedistOp::Add;
        if core.default_information == want {
            return Ok(());
        }
        core.default_information = want;
        if core.state == State::Connected && core.sock.is_some() {
            let cmd = match op {
                RedistOp::Add => ZCommand::RedistributeDefaultAdd,
                RedistOp::Delete => ZCommand::RedistributeDefaultDelete,
            };
            self.send_or_fail(&mut core, empty_frame(cmd))?;
        }
        Ok(())
    }

    /// Install or withdraw an IPv4 route.
    pub fn route_ipv4(
        &self,
        cmd: RouteCmd,
        prefix: &Ipv4Prefix,
        route: &Ipv4Route,
    ) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        if core.sock.is_none() {
            return Err(ClientError::NotConnected);
        }
        let zcmd = match cmd {
            RouteCmd::Add => ZCommand::Ipv4RouteAdd,
            RouteCmd::Delete => ZCommand::Ipv4RouteDelete,
        };
        let frame = route.encode(zcmd, prefix)?;
        self.send_or_fail(&mut core, frame)
    }

    /// Install or withdraw an IPv6 route.
    pub fn route_ipv6(
        &self,
        cmd: RouteCmd,
        prefix: &Ipv6Prefix,
        route: &Ipv6Route,
    ) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        if core.sock.is_none() {
            return Err(ClientError::NotConnected);
        }
        let zcmd = match cmd {
            RouteCmd::Add => ZCommand::Ipv6RouteAdd,
            RouteCmd::Delete => ZCommand::Ipv6RouteDelete,
        };
        let frame = route.encode(zcmd, prefix)?;
        self.send_or_fail(&mut core, frame)
    }

    /// Ask the server to start pushing router-id updates.
    pub fn router_id_add(&self) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        if core.sock.is_none() {
            return Err(ClientError::NotConnected);
        }
        self.send_or_fail(&mut core, empty_frame(ZCommand::RouterIdAdd))
    }

    /// Stop router-id updates.
    pub fn router_id_delete(&self) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        if core.sock.is_none() {
            return Err(ClientError::NotConnected);
        }
        self.send_or_fail(&mut core, empty_frame(ZCommand::RouterIdDelete))
    }

    /// Ask the server to start pushing interface events.
    pub fn interface_add(&self) -> Result<(), ClientError> {
        let mut core = self.core.borrow_mut();
        if core.sock.is_none() {
            return Err(ClientError::NotConnected);
        }
        self.send_or_fail(&mut core, empty_frame(ZCommand::InterfaceAdd))
    }

    // ── Connection state machine ────────────────────────────────────

    /// Arm an immediate connect attempt. Idempotent: an armed connect
    /// event or pending retry timer is left alone.
    fn schedule_connect(&self, core: &mut Core) {
        if core.t_connect.is_some() {
            return;
        }
        core.state = State::Scheduled;
        let me = self.clone();
        core.t_connect = Some(self.reactor.arm_event(Box::new(move || me.connect_now())));
    }

    fn connect_now(&self) {
        let mut core = self.core.borrow_mut();
        core.t_connect = None;
        if !core.enabled || core.sock.is_some() {
            return;
        }
        core.state = State::Connecting;
        let endpoint = core.config.endpoint();
        match Transport::connect(&endpoint) {
            Err(e) => {
                warn!("connect to route server failed: {e}");
                core.fail += 1;
                core.state = State::Failing;
                self.schedule_retry(&mut core);
            },
            Ok(sock) => {
                debug!("connected to route server");
                core.fail = 0;
                core.sock = Some(sock);
                core.state = State::Connected;
                if core.session == SessionKind::Full {
                    self.arm_read(&mut core);
                    if let Err(e) = self.send_handshake(&mut core) {
                        warn!("handshake failed: {e}");
                    }
                }
            },
        }
    }

    /// On-connect sequence, aborted on the first send error: HELLO,
    /// router-id and interface subscriptions, then replay of the
    /// redistribution table in ascending route-type order.
    fn send_handshake(&self, core: &mut Core) -> Result<(), ClientError> {
        if let Some(own) = core.config.route_type {
            let mut fb = FrameBuilder::new(ZCommand::Hello);
            fb.body_mut().put_u8(own.as_u8());
            self.send_or_fail(core, fb.finish()?)?;
        }
        self.send_or_fail(core, empty_frame(ZCommand::RouterIdAdd))?;
        self.send_or_fail(core, empty_frame(ZCommand::InterfaceAdd))?;
        for slot in 0..RouteType::MAX {
            if !core.redist[slot] {
                continue;
            }
            let Some(route_type) = RouteType::from_u8(slot as u8) else {
                continue;
            };
            if Some(route_type) == core.config.route_type {
                continue;
            }
            self.send_or_fail(core, redistribute_frame(RedistOp::Add, route_type)?)?;
        }
        if core.default_information {
            self.send_or_fail(core, empty_frame(ZCommand::RedistributeDefaultAdd))?;
        }
        Ok(())
    }

    /// I/O failure while (or right after) connected: count it, tear
    /// everything down, and schedule the retry.
    fn fail_with(&self, core: &mut Core) {
        core.fail += 1;
        core.state = State::Failing;
        self.teardown(core);
        self.schedule_retry(core);
    }

    /// Cancel every armed event, close the socket, reset both buffers.
    fn teardown(&self, core: &mut Core) {
        for token in [
            core.t_connect.take(),
            core.t_read.take(),
            core.t_write.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.reactor.disarm(token);
        }
        core.sock = None;
        core.ibuf.reset();
        core.obuf.clear();
    }

    fn schedule_retry(&self, core: &mut Core) {
        if core.fail >= FAIL_CAP {
            warn!(
                failures = core.fail,
                "giving up on the route server; restart() to try again"
            );
            return;
        }
        let delay = if core.fail < FAIL_THRESHOLD_LONG {
            CONNECT_RETRY_SHORT
        } else {
            CONNECT_RETRY_LONG
        };
        core.state = State::Scheduled;
        let me = self.clone();
        core.t_connect = Some(
            self.reactor
                .arm_timer_at(self.reactor.now() + delay, Box::new(move || me.connect_now())),
        );
    }

    // ── I/O plumbing ────────────────────────────────────────────────

    fn arm_read(&self, core: &mut Core) {
        if core.t_read.is_some() {
            return;
        }
        let Some(fd) = core.sock.as_ref().map(Transport::raw_fd) else {
            return;
        };
        let me = self.clone();
        core.t_read = Some(self.reactor.arm_read(fd, Box::new(move || me.on_read())));
    }

    fn arm_write(&self, core: &mut Core) {
        if core.t_write.is_some() {
            return;
        }
        let Some(fd) = core.sock.as_ref().map(Transport::raw_fd) else {
            return;
        };
        let me = self.clone();
        core.t_write = Some(self.reactor.arm_write(fd, Box::new(move || me.on_write())));
    }

    /// Enqueue one frame. Keeps the invariant that write-readiness is
    /// armed exactly while the write buffer holds bytes, and performs
    /// the `Failing` transition itself on a dead socket.
    fn send_or_fail(&self, core: &mut Core, frame: Bytes) -> Result<(), ClientError> {
        let Core { sock, obuf, .. } = &mut *core;
        let Some(sock) = sock.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        match obuf.enqueue(frame, sock) {
            WriteStatus::Empty => {
                if let Some(token) = core.t_write.take() {
                    self.reactor.disarm(token);
                }
                Ok(())
            },
            WriteStatus::Pending => {
                self.arm_write(core);
                Ok(())
            },
            WriteStatus::Error => {
                warn!("send to route server failed; scheduling reconnect");
                self.fail_with(core);
                Err(ClientError::Transport)
            },
        }
    }

    fn on_write(&self) {
        let mut core = self.core.borrow_mut();
        core.t_write = None;
        let status = {
            let Core {
                sock: Some(sock),
                obuf,
                ..
            } = &mut *core
            else {
                return;
            };
            obuf.flush_available(sock)
        };
        match status {
            WriteStatus::Empty => {},
            WriteStatus::Pending => self.arm_write(&mut core),
            WriteStatus::Error => {
                warn!("flush to route server failed; scheduling reconnect");
                self.fail_with(&mut core);
            },
        }
    }

    /// Read-readiness callback: continue the current frame, dispatch it
    /// when complete, re-arm.
    ///
    /// At most one frame is processed per callback; anything else the
    /// socket holds is picked up on the next readiness event.
    fn on_read(&self) {
        let mut core = self.core.borrow_mut();
        core.t_read = None;
        if core.sock.is_none() {
            return;
        }

        // Header phase.
        if core.ibuf.endp() < HEADER_LEN {
            match self.fill(&mut core, HEADER_LEN) {
                IoOutcome::Closed => {
                    warn!("route server closed the connection");
                    self.fail_with(&mut core);
                    return;
                },
                IoOutcome::Again | IoOutcome::Bytes(_) => {},
            }
            if core.ibuf.endp() < HEADER_LEN {
                self.arm_read(&mut core);
                return;
            }
        }

        let header = match ZservHeader::parse(core.ibuf.filled()) {
            Ok(h) => h,
            Err(e) => {
                error!("framing violation from route server: {e}");
                self.fail_with(&mut core);
                return;
            },
        };
        let frame_len = header.frame_len();
        if frame_len > core.ibuf.capacity() {
            debug!(frame_len, "growing read buffer for oversized frame");
            core.ibuf.grow(frame_len);
        }

        // Body phase.
        if core.ibuf.endp() < frame_len {
            match self.fill(&mut core, frame_len) {
                IoOutcome::Closed => {
                    warn!("route server closed the connection mid-frame");
                    self.fail_with(&mut core);
                    return;
                },
                IoOutcome::Again | IoOutcome::Bytes(_) => {},
            }
            if core.ibuf.endp() < frame_len {
                self.arm_read(&mut core);
                return;
            }
        }

        // Frame complete: detach the payload, then dispatch with the
        // core released so the handler can call back in.
        core.ibuf.consume(HEADER_LEN);
        let payload = Bytes::copy_from_slice(core.ibuf.consumed_to(frame_len));
        let raw_command = header.command.get();
        drop(core);

        match ZCommand::from_u16(raw_command) {
            Some(command) => {
                let slot = self.handlers.borrow().lookup(command);
                match slot {
                    Some(handler) => (&mut *handler.borrow_mut())(self, command, payload),
                    None => debug!(?command, "no handler registered, dropping frame"),
                }
            },
            None => debug!(command = raw_command, "unknown command, dropping frame"),
        }

        // The handler may have stopped or restarted the client; only a
        // live socket gets the buffer reset and the next read arm.
        let mut core = self.core.borrow_mut();
        if core.sock.is_some() {
            core.ibuf.reset();
            self.arm_read(&mut core);
        }
    }

    fn fill(&self, core: &mut Core, want: usize) -> IoOutcome {
        let Core {
            sock: Some(sock),
            ibuf,
            ..
        } = &mut *core
        else {
            return IoOutcome::Closed;
        };
        ibuf.fill_from(sock, want)
    }
}

fn redistribute_frame(op: RedistOp, route_type: RouteType) -> Result<Bytes, FrameError> {
    let cmd = match op {
        RedistOp::Add => ZCommand::RedistributeAdd,
        RedistOp::Delete => ZCommand::RedistributeDelete,
    };
    let mut fb = FrameBuilder::new(cmd);
    fb.body_mut().put_u8(route_type.as_u8());
    fb.finish()
}
