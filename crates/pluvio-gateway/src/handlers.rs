// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the REST API.
//!
//! Bodies are JSON; success responses carry `success: true`, failures carry
//! `error` (HTTP 400 validation, 404/409 precondition, 500 storage).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use pluvio_core::{
    iso_millis, iso_now, DayOfWeek, WaterAction, DEFAULT_DURATION_MS, MAX_DURATION_MS,
    MIN_DURATION_MS,
};
use pluvio_engine::{next_occurrence, parse_time_of_day};
use pluvio_router::CommandError;
use pluvio_store::{NewAlarm, NewSchedule};

use crate::AppState;

fn ok_json(value: serde_json::Value) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
        .into_response()
}

fn storage_error(e: pluvio_core::PluvioError) -> Response {
    warn!(error = %e, "storage failure in request handler");
    error_json(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
}

fn validate_duration(duration: u64) -> Result<(), String> {
    if (MIN_DURATION_MS..=MAX_DURATION_MS).contains(&duration) {
        Ok(())
    } else {
        Err(format!(
            "duration must be between {MIN_DURATION_MS} and {MAX_DURATION_MS} ms"
        ))
    }
}

fn parse_days(raw: &[String]) -> Result<Vec<DayOfWeek>, String> {
    if raw.is_empty() {
        return Err("days must not be empty".to_string());
    }
    let mut days = Vec::new();
    for day in raw {
        let value = serde_json::Value::String(day.trim().to_lowercase());
        let parsed: DayOfWeek =
            serde_json::from_value(value).map_err(|_| format!("unknown day {day:?}"))?;
        if !days.contains(&parsed) {
            days.push(parsed);
        }
    }
    Ok(days)
}

/// GET / - service banner.
pub async fn banner(State(state): State<AppState>) -> Response {
    ok_json(json!({
        "service": state.config.service_tag,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.env,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "websocket": state.config.ws_url(),
    }))
}

/// GET /health - storage probe plus hub counters.
pub async fn health(State(state): State<AppState>) -> Response {
    let (total, online) = match state.store.count_devices().await {
        Ok(counts) => counts,
        Err(e) => {
            warn!(error = %e, "health check storage failure");
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };
    let stats = state.hub.stats().snapshot();
    ok_json(json!({
        "status": "ok",
        "database": "connected",
        "websocket": stats,
        "devices": { "total": total, "online": online },
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub timestamp: Option<String>,
}

/// POST /api/devices/register - firmware self-registration.
pub async fn register_device(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let Some(device_id) = body.device_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        return error_json(StatusCode::BAD_REQUEST, "deviceId is required");
    };

    let device = match state
        .store
        .register_or_touch_device(device_id, body.ip.as_deref())
        .await
    {
        Ok(device) => device,
        Err(e) => return storage_error(e),
    };

    ok_json(json!({
        "success": true,
        "device": device,
        "serverInfo": {
            "wsUrl": state.config.ws_url(),
            "keepAliveSecs": state.config.keepalive_interval_secs,
            "serverTime": iso_now(),
            "environment": state.config.env,
        },
    }))
}

/// GET /api/devices/{id}/schedules - pending one-shot schedules.
pub async fn list_device_schedules(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Response {
    match state.store.list_pending_schedules(&device_id).await {
        Ok(schedules) => ok_json(json!({
            "success": true,
            "schedules": schedules,
            "deviceId": pluvio_core::canonical_device_id(&device_id),
        })),
        Err(e) => storage_error(e),
    }
}

/// GET /api/devices/{id}/alarms
pub async fn list_device_alarms(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Response {
    match state.store.list_alarms(&device_id).await {
        Ok(alarms) => ok_json(json!({ "success": true, "alarms": alarms })),
        Err(e) => storage_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
}

/// POST /api/schedules - create a one-shot schedule at a future instant.
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduleRequest>,
) -> Response {
    let Some(device_id) = body.device_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        return error_json(StatusCode::BAD_REQUEST, "deviceId is required");
    };
    let Some(raw_time) = body.time.as_deref() else {
        return error_json(StatusCode::BAD_REQUEST, "time is required");
    };
    let fire_at = match DateTime::parse_from_rfc3339(raw_time) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            return error_json(
                StatusCode::BAD_REQUEST,
                "time must be a valid ISO-8601 timestamp",
            )
        }
    };
    if fire_at <= Utc::now() {
        return error_json(StatusCode::BAD_REQUEST, "time must be in the future");
    }
    let Some(duration) = body.duration else {
        return error_json(StatusCode::BAD_REQUEST, "duration is required");
    };
    if let Err(message) = validate_duration(duration) {
        return error_json(StatusCode::BAD_REQUEST, message);
    }

    match state.store.find_device(device_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "device not found"),
        Err(e) => return storage_error(e),
    }

    match state
        .store
        .create_schedule(NewSchedule {
            device_id: device_id.to_string(),
            fire_at: iso_millis(fire_at),
            duration_ms: duration,
        })
        .await
    {
        Ok(schedule) => ok_json(json!({ "success": true, "schedule": schedule })),
        Err(e) => storage_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlarmRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub days: Option<Vec<String>>,
    #[serde(default)]
    pub duration: Option<u64>,
}

/// POST /api/alarms - create a recurring alarm.
pub async fn create_alarm(
    State(state): State<AppState>,
    Json(body): Json<CreateAlarmRequest>,
) -> Response {
    let Some(device_id) = body.device_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        return error_json(StatusCode::BAD_REQUEST, "deviceId is required");
    };
    let Some(name) = body.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_json(StatusCode::BAD_REQUEST, "name is required");
    };
    let Some(raw_time) = body.time.as_deref() else {
        return error_json(StatusCode::BAD_REQUEST, "time is required");
    };
    let Some(time_of_day) = parse_time_of_day(raw_time) else {
        return error_json(StatusCode::BAD_REQUEST, "time must be HH:MM");
    };
    let days = match parse_days(body.days.as_deref().unwrap_or(&[])) {
        Ok(days) => days,
        Err(message) => return error_json(StatusCode::BAD_REQUEST, message),
    };
    let Some(duration) = body.duration else {
        return error_json(StatusCode::BAD_REQUEST, "duration is required");
    };
    if let Err(message) = validate_duration(duration) {
        return error_json(StatusCode::BAD_REQUEST, message);
    }

    match state.store.find_device(device_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "device not found"),
        Err(e) => return storage_error(e),
    }

    let Some(next_local) = next_occurrence(time_of_day, &days, Local::now()) else {
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, "no computable next firing");
    };

    match state
        .store
        .create_alarm(NewAlarm {
            device_id: device_id.to_string(),
            name: name.to_string(),
            time: raw_time.to_string(),
            days,
            duration_ms: duration,
            next_execution: iso_millis(next_local.with_timezone(&Utc)),
        })
        .await
    {
        Ok(alarm) => ok_json(json!({ "success": true, "alarm": alarm })),
        Err(e) => storage_error(e),
    }
}

/// PUT /api/alarms/{id}/toggle - flip activation; re-activation recomputes
/// the next firing so a long-disabled alarm does not fire immediately.
pub async fn toggle_alarm(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let alarm = match state.store.toggle_alarm(id).await {
        Ok(Some(alarm)) => alarm,
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "alarm not found"),
        Err(e) => return storage_error(e),
    };

    let mut next_execution = alarm.next_execution.clone();
    if alarm.is_active {
        if let Some(time_of_day) = parse_time_of_day(&alarm.time) {
            if let Some(next_local) = next_occurrence(time_of_day, &alarm.days, Local::now()) {
                let next = iso_millis(next_local.with_timezone(&Utc));
                if let Err(e) = state
                    .store
                    .set_alarm_next_execution(alarm.id, next_local.with_timezone(&Utc))
                    .await
                {
                    return storage_error(e);
                }
                next_execution = Some(next);
            }
        }
    }

    ok_json(json!({
        "success": true,
        "alarm": {
            "id": alarm.id,
            "isActive": alarm.is_active,
            "nextExecution": next_execution,
        },
    }))
}

/// DELETE /api/alarms/{id}
pub async fn delete_alarm(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_alarm(id).await {
        Ok(true) => ok_json(json!({ "success": true })),
        Ok(false) => error_json(StatusCode::NOT_FOUND, "alarm not found"),
        Err(e) => storage_error(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
}

/// POST /api/devices/{id}/water - manual water/stop command.
pub async fn water_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<WaterRequest>,
) -> Response {
    let Some(raw_action) = body.action.as_deref() else {
        return error_json(StatusCode::BAD_REQUEST, "action is required");
    };
    let Ok(action) = raw_action.parse::<WaterAction>() else {
        return error_json(
            StatusCode::BAD_REQUEST,
            format!("unknown action {raw_action:?}; expected water or stop"),
        );
    };
    let duration = body.duration.unwrap_or(DEFAULT_DURATION_MS);
    if let Err(message) = validate_duration(duration) {
        return error_json(StatusCode::BAD_REQUEST, message);
    }

    match state
        .router
        .issue_water_command(&device_id, action, duration)
        .await
    {
        Ok(ticket) => ok_json(json!({ "success": true, "command": ticket })),
        Err(CommandError::DeviceNotFound) => {
            error_json(StatusCode::NOT_FOUND, "device not found")
        }
        Err(CommandError::DeviceOffline) => error_json(StatusCode::CONFLICT, "device offline"),
        Err(CommandError::NotConnected) => error_json(StatusCode::CONFLICT, "not connected"),
        Err(CommandError::Internal(e)) => storage_error(e),
    }
}

/// GET /api/debug/connections - hub counters plus per-session detail.
pub async fn debug_connections(State(state): State<AppState>) -> Response {
    let devices: Vec<serde_json::Value> = state
        .hub
        .device_sessions()
        .iter()
        .map(|session| {
            json!({
                "deviceId": session.device_id,
                "addr": session.addr,
                "joinedAt": iso_millis(session.joined_at),
                "lastSeen": iso_millis(session.last_seen()),
                "reconnectCount": session.reconnect_count,
            })
        })
        .collect();

    ok_json(json!({
        "success": true,
        "stats": state.hub.stats().snapshot(),
        "devices": devices,
        "serverTime": iso_now(),
    }))
}
