// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command router: addressed delivery to one device, best-effort
//! fan-out to every dashboard.
//!
//! The router holds no state of its own; it reads sessions from the hub and
//! device rows from the store. Commands are best-effort: there is no queue
//! and no retry when the target session is missing or the write fails.

pub mod command_id;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use pluvio_core::{
    canonical_device_id, iso_now, wire, DeviceStatus, PluvioError, WaterAction,
};
use pluvio_hub::SessionHub;
use pluvio_store::Store;

pub use command_id::next_command_id;

/// Why a water command could not be issued.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No device row exists for the id.
    #[error("device not found")]
    DeviceNotFound,

    /// The device row says offline.
    #[error("device offline")]
    DeviceOffline,

    /// The store says online but the hub holds no live session, or the
    /// session's write failed. A legitimate transient during reconnects.
    #[error("not connected")]
    NotConnected,

    /// Store failure while checking preconditions.
    #[error("internal error: {0}")]
    Internal(#[from] PluvioError),
}

/// The command envelope dispatched to a device and echoed to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandTicket {
    pub command_id: String,
    pub device_id: String,
    pub action: WaterAction,
    pub duration: u64,
    pub timestamp: String,
}

/// Stateless router over the hub and the store.
pub struct CommandRouter {
    hub: Arc<SessionHub>,
    store: Arc<Store>,
    server_tag: String,
}

impl CommandRouter {
    pub fn new(hub: Arc<SessionHub>, store: Arc<Store>, server_tag: String) -> Self {
        Self {
            hub,
            store,
            server_tag,
        }
    }

    /// Send one frame to the device's live session.
    ///
    /// Returns `true` only if a session exists and the write was accepted.
    /// No queueing on miss.
    pub async fn send_to_device(
        &self,
        device_id: &str,
        frame_type: &str,
        data: Value,
    ) -> bool {
        let Some(session) = self.hub.lookup(device_id) else {
            debug!(device_id, frame_type, "no live session for device");
            return false;
        };
        let frame = wire::envelope(frame_type, data, &self.server_tag);
        match session.link.send_text(frame).await {
            Ok(()) => true,
            Err(e) => {
                warn!(device_id, frame_type, error = %e, "device send failed");
                false
            }
        }
    }

    /// Broadcast one frame to every dashboard. Per-session failures are
    /// logged and skipped; the fan-out never aborts.
    pub async fn broadcast_to_dashboards(&self, frame_type: &str, data: Value) -> usize {
        let frame = wire::envelope(frame_type, data, &self.server_tag);
        let mut delivered = 0;
        for dashboard in self.hub.dashboards() {
            match dashboard.link.send_text(frame.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(link = dashboard.link.id(), error = %e, "dashboard send failed");
                }
            }
        }
        debug!(frame_type, delivered, "dashboard broadcast");
        delivered
    }

    /// Issue a manual water/stop command to a device.
    ///
    /// Preconditions: a device row exists and is marked online. The command
    /// is then dispatched to the live session; a missing session or failed
    /// write is the `NotConnected` transient.
    pub async fn issue_water_command(
        &self,
        device_id: &str,
        action: WaterAction,
        duration_ms: u64,
    ) -> Result<CommandTicket, CommandError> {
        let id = canonical_device_id(device_id);

        let device = self
            .store
            .find_device(&id)
            .await?
            .ok_or(CommandError::DeviceNotFound)?;
        if device.status != DeviceStatus::Online {
            return Err(CommandError::DeviceOffline);
        }

        let ticket = CommandTicket {
            command_id: next_command_id(),
            device_id: id.clone(),
            action,
            duration: duration_ms,
            timestamp: iso_now(),
        };

        let payload = serde_json::json!({
            "action": ticket.action,
            "duration": ticket.duration,
            "commandId": ticket.command_id,
            "timestamp": ticket.timestamp,
        });
        if !self
            .send_to_device(&id, wire::message_types::WATER_COMMAND, payload)
            .await
        {
            return Err(CommandError::NotConnected);
        }

        debug!(
            device_id = id.as_str(),
            command_id = ticket.command_id.as_str(),
            action = %ticket.action,
            duration = ticket.duration,
            "water command dispatched"
        );
        Ok(ticket)
    }
}
