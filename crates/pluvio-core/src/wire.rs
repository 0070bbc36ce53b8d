// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outbound frame envelope and the message type catalogue.
//!
//! Every frame the server writes has the shape:
//!
//! ```json
//! {"type": "...", "data": {...}, "timestamp": "2026-03-01T07:00:00.000Z", "server": "pluvio"}
//! ```
//!
//! Timestamps are server wall-clock. The `server` field carries the
//! configured service tag so clients can tell instances apart.

use serde_json::Value;

use crate::types::iso_now;

/// Message types the server sends to peers.
pub mod message_types {
    /// Hello sent immediately after the transport opens.
    pub const CONNECTED: &str = "connected";
    /// Join confirmation for a device.
    pub const DEVICE_JOINED: &str = "device_joined";
    /// Snapshot of the device table for a joining dashboard.
    pub const DEVICE_LIST: &str = "device_list";
    /// Heartbeat acknowledgement with server time and echoes.
    pub const HEARTBEAT_ACK: &str = "heartbeat_ack";
    /// Acknowledgement of a persisted pump status report.
    pub const STATUS_RECEIVED: &str = "status_received";
    /// Reply to a dashboard whose manual command was dispatched.
    pub const COMMAND_SENT: &str = "command_sent";
    /// Watering command addressed to a device.
    pub const WATER_COMMAND: &str = "water_command";
    /// Error frame; the session stays open.
    pub const ERROR: &str = "error";

    // Broadcasts to all dashboards.
    pub const DEVICE_CONNECTED: &str = "device_connected";
    pub const DEVICE_DISCONNECTED: &str = "device_disconnected";
    pub const PUMP_STATUS_UPDATE: &str = "pump_status_update";
    pub const COMMAND_ACKNOWLEDGED: &str = "command_acknowledged";
    pub const ALARM_EXECUTED: &str = "alarm_executed";
    pub const ALARM_MISSED: &str = "alarm_missed";
    pub const ALARM_FAILED: &str = "alarm_failed";
    pub const SCHEDULE_EXECUTED: &str = "schedule_executed";
    pub const SCHEDULE_FAILED: &str = "schedule_failed";
    pub const SCHEDULE_EXPIRED: &str = "schedule_expired";
}

/// Build an outbound frame string in the standard envelope.
pub fn envelope(frame_type: &str, data: Value, server_tag: &str) -> String {
    serde_json::json!({
        "type": frame_type,
        "data": data,
        "timestamp": iso_now(),
        "server": server_tag,
    })
    .to_string()
}

/// Build an `error` frame.
pub fn error_frame(message: &str, server_tag: &str) -> String {
    envelope(
        message_types::ERROR,
        serde_json::json!({ "error": message }),
        server_tag,
    )
}
