// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The transport seam.
//!
//! The hub, router, and engine never touch a socket. They hold a
//! [`PeerLink`]: the WebSocket layer implements it over its outbound queue,
//! and tests substitute a capturing mock. Sends are best-effort; a send on a
//! session that closed concurrently fails, which callers treat as the
//! "not connected" outcome rather than an error to retry.

use async_trait::async_trait;

use crate::error::PluvioError;

/// Close code used when a newer `device_join` displaces a live session.
pub const CLOSE_SUPERSEDED: u16 = 4001;

/// Close code used when the sweeper evicts a stale session.
pub const CLOSE_TIMEOUT: u16 = 4002;

/// Handle to one live peer transport.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Process-unique identifier for this transport binding. Used to tell
    /// whether a map entry still refers to the same underlying connection.
    fn id(&self) -> u64;

    /// Queue a text frame for delivery. Fails if the session is gone.
    async fn send_text(&self, frame: String) -> Result<(), PluvioError>;

    /// Close the transport with a close code and reason. Idempotent.
    async fn close(&self, code: u16, reason: &str);
}
