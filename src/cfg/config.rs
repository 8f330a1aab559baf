// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cfg::enums::{HwAddrFormat, RouteType};

/// Compiled-in location of the server's UNIX-domain socket.
pub const DEFAULT_SERV_PATH: &str = "/var/run/zserv.api";
/// Well-known loopback port used when built with the `tcp-zserv`
/// feature.
pub const ZSERV_TCP_PORT: u16 = 2600;

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl Default for Endpoint {
    fn default() -> Self {
        if cfg!(feature = "tcp-zserv") {
            Endpoint::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, ZSERV_TCP_PORT)))
        } else {
            Endpoint::Unix(PathBuf::from(DEFAULT_SERV_PATH))
        }
    }
}

/// Per-client settings, fixed for the lifetime of a handle.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ClientConfig {
    /// The embedding daemon's own route type. Routes of this type are
    /// never requested back from the server, and HELLO is only sent
    /// when this is set.
    #[serde(default, rename = "RouteType")]
    pub route_type: Option<RouteType>,

    /// Runtime override of the server socket path. Leave unset for the
    /// compiled-in default.
    #[serde(default, rename = "ServPath")]
    pub serv_path: Option<PathBuf>,

    /// Wire format of the INTERFACE_ADD link-layer address (must match
    /// the server build).
    #[serde(default, rename = "HwAddrFormat")]
    pub hw_addr_format: HwAddrFormat,
}

impl ClientConfig {
    pub fn new(route_type: Option<RouteType>) -> Self {
        Self {
            route_type,
            ..Default::default()
        }
    }

    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: ClientConfig =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize();
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) {
        if let Some(path) = self.serv_path.take() {
            // Re-apply through the checked setter so a stale path from a
            // config file gets the same treatment as a runtime override.
            self.serv_path_set(path);
        }
    }

    /// Override the server socket path.
    ///
    /// The path is validated now, not at connect time: it must exist
    /// and be a socket file, otherwise the override is discarded with a
    /// warning and the compiled-in default stays in effect.
    pub fn serv_path_set<P: Into<PathBuf>>(&mut self, path: P) {
        use std::os::unix::fs::FileTypeExt;

        let path = path.into();
        match fs::metadata(&path) {
            Ok(md) if md.file_type().is_socket() => {
                self.serv_path = Some(path);
            },
            Ok(_) => {
                warn!(path = %path.display(), "serv path is not a socket, ignoring");
            },
            Err(e) => {
                warn!(path = %path.display(), "serv path not usable: {e}, ignoring");
            },
        }
    }

    /// The endpoint `connect()` will dial: the validated override when
    /// present, the compiled-in default otherwise.
    pub fn endpoint(&self) -> Endpoint {
        match &self.serv_path {
            Some(p) => Endpoint::Unix(p.clone()),
            None => Endpoint::default(),
        }
    }
}
