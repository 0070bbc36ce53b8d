// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic eviction of stale device sessions.
//!
//! The hub performs the actual eviction and link close; this worker adds the
//! side effects the hub cannot reach: marking the device offline and idle in
//! the store and broadcasting `device_disconnected` to dashboards.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pluvio_config::model::HubConfig;
use pluvio_core::{wire, DeviceStatus, PumpStatus};
use pluvio_hub::SessionHub;
use pluvio_router::CommandRouter;
use pluvio_store::Store;

/// Background sweeper task.
pub struct Sweeper {
    hub: Arc<SessionHub>,
    store: Arc<Store>,
    router: Arc<CommandRouter>,
    sweep_interval: std::time::Duration,
    threshold: Duration,
}

impl Sweeper {
    pub fn new(
        hub: Arc<SessionHub>,
        store: Arc<Store>,
        router: Arc<CommandRouter>,
        config: &HubConfig,
    ) -> Self {
        Self {
            hub,
            store,
            router,
            sweep_interval: std::time::Duration::from_secs(config.sweep_interval_secs),
            threshold: Duration::seconds(config.stale_after_secs as i64),
        }
    }

    /// Run the sweep loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.tick().await;

        info!(
            interval_secs = self.sweep_interval.as_secs(),
            threshold_secs = self.threshold.num_seconds(),
            "session sweeper started"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    sweep_once(&self.hub, &self.store, &self.router, Utc::now(), self.threshold)
                        .await;
                }
                _ = cancel.cancelled() => {
                    info!("session sweeper shutting down");
                    break;
                }
            }
        }
    }
}

/// One sweep pass: evict stale sessions, mark their devices offline, and
/// tell the dashboards. Returns the number of sessions evicted.
pub async fn sweep_once(
    hub: &SessionHub,
    store: &Store,
    router: &CommandRouter,
    now: DateTime<Utc>,
    threshold: Duration,
) -> usize {
    let swept = hub.sweep(now, threshold).await;
    for session in &swept {
        if let Err(e) = store
            .set_device_status(
                &session.device_id,
                Some(DeviceStatus::Offline),
                Some(PumpStatus::Idle),
                None,
            )
            .await
        {
            warn!(device_id = session.device_id.as_str(), error = %e, "failed to mark swept device offline");
        }
        router
            .broadcast_to_dashboards(
                wire::message_types::DEVICE_DISCONNECTED,
                serde_json::json!({
                    "deviceId": session.device_id,
                    "status": "offline",
                    "reason": "timeout",
                }),
            )
            .await;
    }
    swept.len()
}
