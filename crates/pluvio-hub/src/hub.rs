// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session hub: the authoritative in-memory registry of live peers.
//!
//! Two maps, both on `DashMap`: devices keyed by canonical device id,
//! dashboards keyed by link id. Map entry operations are the critical
//! sections; eviction closes happen after the entry guard is released so no
//! lock is held across an await point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use pluvio_core::{canonical_device_id, PeerLink, CLOSE_SUPERSEDED, CLOSE_TIMEOUT};

use crate::session::{DashboardSession, DeviceSession};

/// Process-wide connection counters.
pub struct HubStats {
    total_ever: AtomicU64,
    active: AtomicU64,
    device_active: AtomicU64,
    dashboard_active: AtomicU64,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time view of [`HubStats`] for the debug/health endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatsSnapshot {
    pub total_ever: u64,
    pub active: u64,
    pub device_active: u64,
    pub dashboard_active: u64,
    pub started_at: String,
}

impl HubStats {
    fn new() -> Self {
        Self {
            total_ever: AtomicU64::new(0),
            active: AtomicU64::new(0),
            device_active: AtomicU64::new(0),
            dashboard_active: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            total_ever: self.total_ever.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            device_active: self.device_active.load(Ordering::Relaxed),
            dashboard_active: self.dashboard_active.load(Ordering::Relaxed),
            started_at: pluvio_core::iso_millis(self.started_at),
        }
    }
}

/// Outcome of admitting a device session.
pub struct DeviceAdmission {
    pub session: Arc<DeviceSession>,
    pub reconnect_count: u32,
    /// True when an older session for the same device was evicted.
    pub superseded: bool,
}

/// The in-memory registry of currently connected devices and dashboards.
pub struct SessionHub {
    devices: DashMap<String, Arc<DeviceSession>>,
    dashboards: DashMap<u64, Arc<DashboardSession>>,
    stats: HubStats,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            dashboards: DashMap::new(),
            stats: HubStats::new(),
        }
    }

    /// Count a freshly opened transport, before it has joined as anything.
    pub fn connection_opened(&self) {
        self.stats.total_ever.fetch_add(1, Ordering::Relaxed);
        self.stats.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a transport teardown. Bound sessions are removed separately via
    /// [`drop_device`](Self::drop_device) / [`drop_dashboard`](Self::drop_dashboard);
    /// for a session that never completed a join this is the only effect.
    pub fn connection_closed(&self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Bind a device session, displacing any existing binding for the same
    /// device id. The displaced link is closed with the `superseded` code.
    pub async fn admit_device(
        &self,
        link: Arc<dyn PeerLink>,
        device_id: &str,
        addr: Option<String>,
    ) -> DeviceAdmission {
        let id = canonical_device_id(device_id);
        let now = Utc::now();

        let (session, evicted) = match self.devices.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let old = occupied.get().clone();
                if old.link.id() == link.id() {
                    // Same transport re-sent device_join; rebind in place.
                    let session = Arc::new(DeviceSession::new(
                        link,
                        id.clone(),
                        addr,
                        old.reconnect_count,
                        now,
                    ));
                    occupied.insert(session.clone());
                    (session, None)
                } else {
                    let session = Arc::new(DeviceSession::new(
                        link,
                        id.clone(),
                        addr,
                        old.reconnect_count + 1,
                        now,
                    ));
                    occupied.insert(session.clone());
                    (session, Some(old))
                }
            }
            Entry::Vacant(vacant) => {
                let session = Arc::new(DeviceSession::new(link, id.clone(), addr, 0, now));
                vacant.insert(session.clone());
                self.stats.device_active.fetch_add(1, Ordering::Relaxed);
                (session, None)
            }
        };

        let superseded = evicted.is_some();
        if let Some(old) = evicted {
            info!(
                device_id = id.as_str(),
                old_link = old.link.id(),
                new_link = session.link.id(),
                "device session superseded"
            );
            old.link.close(CLOSE_SUPERSEDED, "superseded").await;
        } else {
            debug!(device_id = id.as_str(), link = session.link.id(), "device admitted");
        }

        DeviceAdmission {
            reconnect_count: session.reconnect_count,
            session,
            superseded,
        }
    }

    /// Register a dashboard session, keyed by its link id.
    pub fn admit_dashboard(
        &self,
        link: Arc<dyn PeerLink>,
        addr: Option<String>,
    ) -> Arc<DashboardSession> {
        let session = Arc::new(DashboardSession {
            link,
            addr,
            joined_at: Utc::now(),
        });
        if self
            .dashboards
            .insert(session.link.id(), session.clone())
            .is_none()
        {
            self.stats.dashboard_active.fetch_add(1, Ordering::Relaxed);
        }
        debug!(link = session.link.id(), "dashboard admitted");
        session
    }

    /// Remove a device binding, but only if it still belongs to `link_id`.
    /// A binding that was already superseded by a newer link is left alone.
    pub fn drop_device(&self, device_id: &str, link_id: u64, reason: &str) -> bool {
        let id = canonical_device_id(device_id);
        let removed = self
            .devices
            .remove_if(&id, |_, session| session.link.id() == link_id)
            .is_some();
        if removed {
            self.stats.device_active.fetch_sub(1, Ordering::Relaxed);
            info!(device_id = id.as_str(), reason, "device session dropped");
        }
        removed
    }

    /// Remove a dashboard session.
    pub fn drop_dashboard(&self, link_id: u64) -> bool {
        let removed = self.dashboards.remove(&link_id).is_some();
        if removed {
            self.stats.dashboard_active.fetch_sub(1, Ordering::Relaxed);
            debug!(link = link_id, "dashboard session dropped");
        }
        removed
    }

    /// Refresh a device session's `last_seen`.
    pub fn touch_device(&self, device_id: &str, at: DateTime<Utc>) {
        if let Some(session) = self.devices.get(&canonical_device_id(device_id)) {
            session.touch(at);
        }
    }

    /// The live session for a device, if any. The returned handle may be used
    /// after the map lock is released; a later send can still fail if the
    /// session is dropped concurrently.
    pub fn lookup(&self, device_id: &str) -> Option<Arc<DeviceSession>> {
        self.devices
            .get(&canonical_device_id(device_id))
            .map(|entry| entry.value().clone())
    }

    /// Snapshot of all dashboard sessions for fan-out.
    pub fn dashboards(&self) -> Vec<Arc<DashboardSession>> {
        self.dashboards
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Snapshot of all device sessions, for the debug endpoint.
    pub fn device_sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.devices.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Evict device sessions whose `last_seen` is older than `now - threshold`.
    ///
    /// Stale links are closed with the `timeout` code. Returns the evicted
    /// sessions so the caller can mark the store offline and broadcast
    /// `device_disconnected`.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Vec<Arc<DeviceSession>> {
        let cutoff = now - threshold;
        let stale: Vec<Arc<DeviceSession>> = self
            .devices
            .iter()
            .filter(|entry| entry.value().last_seen() < cutoff)
            .map(|entry| entry.value().clone())
            .collect();

        let mut swept = Vec::new();
        for session in stale {
            if self.drop_device(&session.device_id, session.link.id(), "stale") {
                session.link.close(CLOSE_TIMEOUT, "timeout").await;
                swept.push(session);
            }
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "swept stale device sessions");
        }
        swept
    }

    pub fn stats(&self) -> &HubStats {
        &self.stats
    }
}
