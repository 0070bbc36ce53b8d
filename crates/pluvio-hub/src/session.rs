// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session records.
//!
//! Sessions are exclusively owned by the hub; every other component refers
//! to devices by id and to dashboards by iterating the hub's snapshot.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use pluvio_core::PeerLink;

/// A live, bound device connection.
pub struct DeviceSession {
    pub link: Arc<dyn PeerLink>,
    /// Canonical (upper-case) device id this session is bound to.
    pub device_id: String,
    pub addr: Option<String>,
    pub joined_at: DateTime<Utc>,
    /// 0 on first join; previous session's count + 1 when this join
    /// displaced an older binding.
    pub reconnect_count: u32,
    last_seen_ms: AtomicI64,
}

impl DeviceSession {
    pub fn new(
        link: Arc<dyn PeerLink>,
        device_id: String,
        addr: Option<String>,
        reconnect_count: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            link,
            device_id,
            addr,
            joined_at: at,
            reconnect_count,
            last_seen_ms: AtomicI64::new(at.timestamp_millis()),
        }
    }

    /// Refresh `last_seen`. Called on every inbound frame and pong.
    pub fn touch(&self, at: DateTime<Utc>) {
        self.last_seen_ms.store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        let ms = self.last_seen_ms.load(Ordering::Relaxed);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device_id", &self.device_id)
            .field("link_id", &self.link.id())
            .field("addr", &self.addr)
            .field("reconnect_count", &self.reconnect_count)
            .field("last_seen", &self.last_seen())
            .finish()
    }
}

/// A live dashboard connection. Dashboards have no identity beyond their
/// transport handle.
pub struct DashboardSession {
    pub link: Arc<dyn PeerLink>,
    pub addr: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("link_id", &self.link.id())
            .field("addr", &self.addr)
            .finish()
    }
}
