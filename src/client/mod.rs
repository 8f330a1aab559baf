// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod buffer;
pub mod transport;
pub mod zclient;

pub use zclient::{ClientError, RedistOp, RouteCmd, State, ZClient};
