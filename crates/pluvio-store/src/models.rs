// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! These types represent the rows stored in the SQLite database. Serde
//! renames follow the dashboard/firmware wire convention (camelCase, with
//! `duration`/`time` field names kept from the original protocol).

use serde::{Deserialize, Serialize};

use pluvio_core::{DayOfWeek, DeviceStatus, PumpStatus, ScheduleStatus};

/// A pump controller known to the backend.
///
/// A row is created on first registration and never deleted; `status` and
/// `pump_status` mirror the session hub's in-memory view and converge
/// eventually.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    /// Canonical (upper-case) device identifier.
    pub device_id: String,
    pub status: DeviceStatus,
    pub pump_status: PumpStatus,
    /// Last observed client address.
    pub last_ip: Option<String>,
    /// Strictly increasing count of successful joins.
    pub ws_connections: i64,
    pub last_seen: Option<String>,
    pub last_heartbeat: Option<String>,
    /// Last connection-error string, if any.
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A recurring watering alarm: fires at `time` on each weekday in `days`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: i64,
    pub device_id: String,
    pub name: String,
    /// Time of day, `HH:MM`, local to the server.
    pub time: String,
    pub days: Vec<DayOfWeek>,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub is_active: bool,
    pub last_executed: Option<String>,
    pub next_execution: Option<String>,
    pub execution_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create an alarm.
#[derive(Debug, Clone)]
pub struct NewAlarm {
    pub device_id: String,
    pub name: String,
    pub time: String,
    pub days: Vec<DayOfWeek>,
    pub duration_ms: u64,
    pub next_execution: String,
}

/// A one-shot watering schedule: fires once at `fire_at`, then reaches a
/// terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: i64,
    pub device_id: String,
    #[serde(rename = "time")]
    pub fire_at: String,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub status: ScheduleStatus,
    pub retry_count: i64,
    pub last_error: Option<String>,
    pub executed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create a one-shot schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub device_id: String,
    pub fire_at: String,
    pub duration_ms: u64,
}

/// Parse a TEXT column into a typed value, surfacing failures as rusqlite
/// conversion errors so they propagate through the query layer.
pub(crate) fn parse_text_col<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse the JSON-encoded `days` column.
pub(crate) fn parse_days_col(idx: usize, raw: String) -> rusqlite::Result<Vec<DayOfWeek>> {
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
