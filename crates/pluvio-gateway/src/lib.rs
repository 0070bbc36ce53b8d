// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP + WebSocket surface of the Pluvio backend.
//!
//! The REST facade is a thin layer over the hub, router, and store; the
//! WebSocket side hosts the per-session protocol handler. No other
//! component touches the transport.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use pluvio_hub::SessionHub;
use pluvio_router::CommandRouter;
use pluvio_store::Store;

/// Gateway configuration (mirrors the `[server]`/`[hub]` sections from
/// `pluvio-config` to avoid a dependency on the config crate).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Service tag stamped into outbound frames.
    pub service_tag: String,
    /// Deployment environment tag.
    pub env: String,
    /// Externally reachable base URL advertised to devices, if configured.
    pub public_url: Option<String>,
    /// Interval between protocol-level pings on each session.
    pub keepalive_interval_secs: u64,
}

impl GatewayConfig {
    /// The WebSocket URL devices should connect to.
    pub fn ws_url(&self) -> String {
        match &self.public_url {
            Some(base) => format!("{}/ws", base.trim_end_matches('/')),
            None => {
                let host = if self.host == "0.0.0.0" {
                    "localhost"
                } else {
                    self.host.as_str()
                };
                format!("ws://{host}:{}/ws", self.port)
            }
        }
    }
}

/// Shared state for axum request handlers and socket tasks.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub hub: Arc<SessionHub>,
    pub router: Arc<CommandRouter>,
    pub config: GatewayConfig,
    /// Process start for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        hub: Arc<SessionHub>,
        router: Arc<CommandRouter>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            hub,
            router,
            config,
            started_at: Instant::now(),
        }
    }
}
