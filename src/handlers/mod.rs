// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Registered callbacks for inbound notifications.
//!
//! The embedder fills a [`HandlerTable`] with one callback per command
//! it cares about; the dispatcher hands each complete frame's payload
//! to the matching slot. Commands without a slot, and command codes the
//! client does not know, are dropped silently so that a newer server
//! can talk to an older client.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use bytes::Bytes;

use crate::{client::zclient::ZClient, models::command::ZCommand};

/// A notification callback. Receives the client handle (safe to call
/// back into, including `stop`), the command that arrived, and the
/// frame payload after the header.
pub type HandlerFn = dyn FnMut(&ZClient, ZCommand, Bytes);

/// Command-keyed table of optional handlers.
///
/// Slots are shared references: the dispatcher clones a slot out of the
/// table before invoking it, so a handler may re-register or clear
/// slots without tripping over its own invocation.
#[derive(Default)]
pub struct HandlerTable {
    slots: HashMap<ZCommand, Rc<RefCell<HandlerFn>>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, command: ZCommand, handler: F)
    where
        F: FnMut(&ZClient, ZCommand, Bytes) + 'static,
    {
        self.slots.insert(command, Rc::new(RefCell::new(handler)));
    }

    pub fn unregister(&mut self, command: ZCommand) {
        self.slots.remove(&command);
    }

    pub(crate) fn lookup(&self, command: ZCommand) -> Option<Rc<RefCell<HandlerFn>>> {
        self.slots.get(&command).cloned()
    }
}
