// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-session protocol handler.
//!
//! Inbound frames are parsed into a typed [`InboundFrame`] (the dispatch
//! table is the serde tag) and handled by [`PeerConnection`], a small state
//! machine: a session starts unbound and becomes a device via `device_join`
//! or a dashboard via `frontend_join`. Handler failures turn into `error`
//! frames; they never tear the session down.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use pluvio_core::{
    canonical_device_id, iso_now, wire, PeerLink, PluvioError, PumpStatus, WaterAction,
    DEFAULT_DURATION_MS, MAX_DURATION_MS, MIN_DURATION_MS,
};

use crate::AppState;

/// Inbound frames larger than this are rejected by the transport layer.
pub const MAX_FRAME_BYTES: usize = 16 * 1024;

/// Message types peers may send, in the order listed by error frames.
pub const SUPPORTED_TYPES: &[&str] = &[
    "device_join",
    "frontend_join",
    "heartbeat",
    "pump_status",
    "command_ack",
    "schedule_executed",
    "manual_command",
];

/// A parsed inbound frame. The `type` tag selects the variant; field names
/// follow the firmware/dashboard wire convention.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    #[serde(rename_all = "camelCase")]
    DeviceJoin { device_id: String },
    FrontendJoin,
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        #[allow(dead_code)]
        device_id: String,
        uptime: Option<u64>,
        free_heap: Option<u64>,
        rssi: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    PumpStatus {
        #[allow(dead_code)]
        device_id: String,
        status: PumpStatus,
    },
    #[serde(rename_all = "camelCase")]
    CommandAck {
        device_id: String,
        command_id: String,
        status: String,
    },
    #[serde(rename_all = "camelCase")]
    ScheduleExecuted {
        schedule_id: Option<i64>,
        alarm_id: Option<i64>,
        #[allow(dead_code)]
        device_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ManualCommand {
        device_id: String,
        action: String,
        duration: Option<u64>,
    },
}

/// Why an inbound frame could not be dispatched.
#[derive(Debug)]
pub enum FrameParseError {
    /// The body does not start with `{` / is not a JSON object.
    NotObject,
    /// No `type` field.
    MissingType,
    /// A `type` outside [`SUPPORTED_TYPES`].
    UnknownType(String),
    /// Known type, malformed payload.
    Invalid { frame_type: String, message: String },
}

impl FrameParseError {
    /// The message carried in the `error` frame sent back to the peer.
    pub fn peer_message(&self) -> String {
        match self {
            FrameParseError::NotObject => "frame must be a JSON object".to_string(),
            FrameParseError::MissingType => "frame is missing a type field".to_string(),
            FrameParseError::UnknownType(t) => format!(
                "unsupported message type {t:?}; supported types: {}",
                SUPPORTED_TYPES.join(", ")
            ),
            FrameParseError::Invalid {
                frame_type,
                message,
            } => format!("invalid {frame_type} frame: {message}"),
        }
    }
}

/// Parse one inbound frame.
///
/// Fielded frames are accepted both flat (`{type, deviceId, ...}`, what
/// firmware actually sends) and enveloped (`{type, data: {...}}`); an
/// enveloped `data` object is flattened before dispatch.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, FrameParseError> {
    if !text.trim_start().starts_with('{') {
        return Err(FrameParseError::NotObject);
    }
    let value: Value = serde_json::from_str(text).map_err(|_| FrameParseError::NotObject)?;
    let Value::Object(mut fields) = value else {
        return Err(FrameParseError::NotObject);
    };

    if let Some(Value::Object(data)) = fields.remove("data") {
        for (key, value) in data {
            fields.entry(key).or_insert(value);
        }
    }

    let frame_type = fields
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(FrameParseError::MissingType)?
        .to_string();
    if !SUPPORTED_TYPES.contains(&frame_type.as_str()) {
        return Err(FrameParseError::UnknownType(frame_type));
    }

    serde_json::from_value(Value::Object(fields)).map_err(|e| FrameParseError::Invalid {
        frame_type,
        message: e.to_string(),
    })
}

/// What a session is currently bound as.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Unbound,
    Device(String),
    Dashboard,
}

/// One live peer connection: the protocol state machine over a [`PeerLink`].
pub struct PeerConnection {
    state: AppState,
    link: Arc<dyn PeerLink>,
    addr: Option<String>,
    binding: Binding,
}

impl PeerConnection {
    /// Register the raw connection with the hub and send the `connected`
    /// hello.
    pub async fn open(state: AppState, link: Arc<dyn PeerLink>, addr: Option<String>) -> Self {
        state.hub.connection_opened();
        let hello = wire::envelope(
            wire::message_types::CONNECTED,
            serde_json::json!({
                "server": state.config.service_tag,
                "version": env!("CARGO_PKG_VERSION"),
                "yourIp": addr,
                "keepAliveSecs": state.config.keepalive_interval_secs,
            }),
            &state.config.service_tag,
        );
        if let Err(e) = link.send_text(hello).await {
            debug!(error = %e, "hello send failed");
        }
        Self {
            state,
            link,
            addr,
            binding: Binding::Unbound,
        }
    }

    /// The device id this session is bound to, if it is a device.
    pub fn bound_device(&self) -> Option<&str> {
        match &self.binding {
            Binding::Device(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_dashboard(&self) -> bool {
        self.binding == Binding::Dashboard
    }

    /// Handle one inbound text frame. Parse and handler failures are
    /// reported to the peer as `error` frames; the session stays open.
    pub async fn handle_text(&mut self, text: &str) {
        let frame = match parse_inbound(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = ?e, "inbound frame rejected");
                self.send_error(&e.peer_message()).await;
                return;
            }
        };

        if let Some(device_id) = self.bound_device() {
            self.state.hub.touch_device(device_id, chrono::Utc::now());
        }

        let result = match frame {
            InboundFrame::DeviceJoin { device_id } => self.on_device_join(device_id).await,
            InboundFrame::FrontendJoin => self.on_frontend_join().await,
            InboundFrame::Heartbeat {
                uptime,
                free_heap,
                rssi,
                ..
            } => self.on_heartbeat(uptime, free_heap, rssi).await,
            InboundFrame::PumpStatus { status, .. } => self.on_pump_status(status).await,
            InboundFrame::CommandAck {
                device_id,
                command_id,
                status,
            } => self.on_command_ack(device_id, command_id, status).await,
            InboundFrame::ScheduleExecuted {
                schedule_id,
                alarm_id,
                ..
            } => self.on_schedule_executed(schedule_id, alarm_id).await,
            InboundFrame::ManualCommand {
                device_id,
                action,
                duration,
            } => self.on_manual_command(device_id, action, duration).await,
        };

        if let Err(e) = result {
            warn!(error = %e, "frame handler failed");
            self.send_error(&e.to_string()).await;
        }
    }

    /// Protocol-level pong: refresh liveness only.
    pub async fn handle_pong(&self) {
        if let Some(device_id) = self.bound_device() {
            self.state.hub.touch_device(device_id, chrono::Utc::now());
        }
    }

    /// Transport teardown: unbind from the hub, mirror the device offline,
    /// and tell the dashboards.
    pub async fn on_close(&mut self, reason: &str) {
        match std::mem::replace(&mut self.binding, Binding::Unbound) {
            Binding::Device(device_id) => {
                let removed = self
                    .state
                    .hub
                    .drop_device(&device_id, self.link.id(), reason);
                if removed {
                    if let Err(e) = self
                        .state
                        .store
                        .set_device_status(
                            &device_id,
                            Some(pluvio_core::DeviceStatus::Offline),
                            Some(PumpStatus::Idle),
                            None,
                        )
                        .await
                    {
                        warn!(device_id = device_id.as_str(), error = %e, "offline mirror failed");
                    }
                    if reason == "error" {
                        if let Err(e) = self
                            .state
                            .store
                            .record_device_error(&device_id, "transport error")
                            .await
                        {
                            warn!(device_id = device_id.as_str(), error = %e, "error mirror failed");
                        }
                    }
                    self.state
                        .router
                        .broadcast_to_dashboards(
                            wire::message_types::DEVICE_DISCONNECTED,
                            serde_json::json!({
                                "deviceId": device_id,
                                "status": "offline",
                                "reason": reason,
                            }),
                        )
                        .await;
                }
            }
            Binding::Dashboard => {
                self.state.hub.drop_dashboard(self.link.id());
            }
            Binding::Unbound => {}
        }
        self.state.hub.connection_closed();
    }

    async fn on_device_join(&mut self, device_id: String) -> Result<(), PluvioError> {
        let id = canonical_device_id(&device_id);
        if id.is_empty() {
            return Err(PluvioError::Validation("deviceId must not be empty".into()));
        }
        if self.binding == Binding::Dashboard {
            return Err(PluvioError::Validation(
                "dashboard sessions cannot join as a device".into(),
            ));
        }
        // A rebind under a different id releases the old binding first.
        if let Binding::Device(previous) = &self.binding {
            if previous != &id {
                self.state.hub.drop_device(previous, self.link.id(), "rebound");
            }
        }

        let admission = self
            .state
            .hub
            .admit_device(self.link.clone(), &id, self.addr.clone())
            .await;
        self.binding = Binding::Device(id.clone());

        if let Err(e) = self
            .state
            .store
            .record_connection(&id, self.addr.as_deref())
            .await
        {
            warn!(device_id = id.as_str(), error = %e, "join mirror failed");
        }

        // Broadcast before the join ack so dashboards learn about the device
        // no later than the device learns it is joined.
        self.state
            .router
            .broadcast_to_dashboards(
                wire::message_types::DEVICE_CONNECTED,
                serde_json::json!({
                    "deviceId": id,
                    "status": "online",
                    "reconnectCount": admission.reconnect_count,
                }),
            )
            .await;

        self.send(
            wire::message_types::DEVICE_JOINED,
            serde_json::json!({
                "deviceId": id,
                "status": "success",
                "reconnectCount": admission.reconnect_count,
            }),
        )
        .await;
        Ok(())
    }

    async fn on_frontend_join(&mut self) -> Result<(), PluvioError> {
        match self.binding {
            // A second frontend_join is ignored.
            Binding::Dashboard => return Ok(()),
            Binding::Device(_) => {
                return Err(PluvioError::Validation(
                    "device sessions cannot join as a dashboard".into(),
                ));
            }
            Binding::Unbound => {}
        }

        self.state
            .hub
            .admit_dashboard(self.link.clone(), self.addr.clone());
        self.binding = Binding::Dashboard;

        // One-shot snapshot of the device table for the joining dashboard.
        let devices = self.state.store.list_devices().await?;
        self.send(
            wire::message_types::DEVICE_LIST,
            serde_json::json!({
                "devices": devices,
                "count": devices.len(),
            }),
        )
        .await;
        Ok(())
    }

    async fn on_heartbeat(
        &mut self,
        uptime: Option<u64>,
        free_heap: Option<u64>,
        rssi: Option<i64>,
    ) -> Result<(), PluvioError> {
        let Some(device_id) = self.bound_device().map(str::to_string) else {
            return Err(PluvioError::Validation(
                "heartbeat requires a joined device session".into(),
            ));
        };

        self.state
            .store
            .record_heartbeat(&device_id, chrono::Utc::now())
            .await?;

        self.send(
            wire::message_types::HEARTBEAT_ACK,
            serde_json::json!({
                "deviceId": device_id,
                "serverTime": iso_now(),
                "uptime": uptime,
                "freeHeap": free_heap,
                "rssi": rssi,
            }),
        )
        .await;
        Ok(())
    }

    async fn on_pump_status(&mut self, status: PumpStatus) -> Result<(), PluvioError> {
        let Some(device_id) = self.bound_device().map(str::to_string) else {
            return Err(PluvioError::Validation(
                "pump_status requires a joined device session".into(),
            ));
        };
        let normalized = status.normalized();

        self.state
            .store
            .set_device_status(&device_id, None, Some(normalized), Some(chrono::Utc::now()))
            .await?;

        self.state
            .router
            .broadcast_to_dashboards(
                wire::message_types::PUMP_STATUS_UPDATE,
                serde_json::json!({
                    "deviceId": device_id,
                    "status": normalized,
                }),
            )
            .await;

        self.send(
            wire::message_types::STATUS_RECEIVED,
            serde_json::json!({
                "deviceId": device_id,
                "status": normalized,
            }),
        )
        .await;
        Ok(())
    }

    async fn on_command_ack(
        &mut self,
        device_id: String,
        command_id: String,
        status: String,
    ) -> Result<(), PluvioError> {
        if self.bound_device().is_none() {
            return Err(PluvioError::Validation(
                "command_ack requires a joined device session".into(),
            ));
        }
        self.state
            .router
            .broadcast_to_dashboards(
                wire::message_types::COMMAND_ACKNOWLEDGED,
                serde_json::json!({
                    "deviceId": canonical_device_id(&device_id),
                    "commandId": command_id,
                    "status": status,
                }),
            )
            .await;
        Ok(())
    }

    /// Devices report both one-shot and recurring firings through
    /// `schedule_executed`; the broadcast uses the concrete entity's name.
    /// Recurring alarm rows are never mutated here.
    async fn on_schedule_executed(
        &mut self,
        schedule_id: Option<i64>,
        alarm_id: Option<i64>,
    ) -> Result<(), PluvioError> {
        let Some(device_id) = self.bound_device().map(str::to_string) else {
            return Err(PluvioError::Validation(
                "schedule_executed requires a joined device session".into(),
            ));
        };

        if let Some(id) = schedule_id {
            let Some(schedule) = self.state.store.find_schedule(id).await? else {
                return Err(PluvioError::Validation(format!("unknown schedule {id}")));
            };
            self.state
                .router
                .broadcast_to_dashboards(
                    wire::message_types::SCHEDULE_EXECUTED,
                    serde_json::json!({
                        "scheduleId": schedule.id,
                        "deviceId": device_id,
                        "reportedBy": "device",
                    }),
                )
                .await;
            return Ok(());
        }

        if let Some(id) = alarm_id {
            let Some(alarm) = self.state.store.find_alarm(id).await? else {
                return Err(PluvioError::Validation(format!("unknown alarm {id}")));
            };
            self.state
                .router
                .broadcast_to_dashboards(
                    wire::message_types::ALARM_EXECUTED,
                    serde_json::json!({
                        "alarmId": alarm.id,
                        "alarmName": alarm.name,
                        "deviceId": device_id,
                        "reportedBy": "device",
                    }),
                )
                .await;
            return Ok(());
        }

        Err(PluvioError::Validation(
            "schedule_executed requires scheduleId or alarmId".into(),
        ))
    }

    async fn on_manual_command(
        &mut self,
        device_id: String,
        action: String,
        duration: Option<u64>,
    ) -> Result<(), PluvioError> {
        if !self.is_dashboard() {
            return Err(PluvioError::Validation(
                "manual_command requires a dashboard session".into(),
            ));
        }

        let action: WaterAction = action
            .parse()
            .map_err(|_| PluvioError::Validation(format!("unknown action {action:?}")))?;
        let duration = duration.unwrap_or(DEFAULT_DURATION_MS);
        if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&duration) {
            return Err(PluvioError::Validation(format!(
                "duration must be between {MIN_DURATION_MS} and {MAX_DURATION_MS} ms"
            )));
        }

        match self
            .state
            .router
            .issue_water_command(&device_id, action, duration)
            .await
        {
            Ok(ticket) => {
                self.send(
                    wire::message_types::COMMAND_SENT,
                    serde_json::json!({
                        "deviceId": ticket.device_id,
                        "command": ticket,
                    }),
                )
                .await;
                Ok(())
            }
            Err(e) => Err(PluvioError::Precondition(e.to_string())),
        }
    }

    async fn send(&self, frame_type: &str, data: Value) {
        let frame = wire::envelope(frame_type, data, &self.state.config.service_tag);
        if let Err(e) = self.link.send_text(frame).await {
            debug!(frame_type, error = %e, "reply send failed");
        }
    }

    async fn send_error(&self, message: &str) {
        let frame = wire::error_frame(message, &self.state.config.service_tag);
        if let Err(e) = self.link.send_text(frame).await {
            debug!(error = %e, "error frame send failed");
        }
    }
}
