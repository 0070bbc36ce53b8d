// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Pluvio workspace.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Connectivity state of a device, as mirrored into the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// Pump state reported by a device.
///
/// `Stopped` exists only on the wire: firmware variants report it, but the
/// server normalizes it to `Idle` before persisting or broadcasting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PumpStatus {
    Running,
    Idle,
    Stopped,
}

impl PumpStatus {
    /// Collapse the wire-level `stopped` into the persisted `idle`.
    pub fn normalized(self) -> PumpStatus {
        match self {
            PumpStatus::Stopped => PumpStatus::Idle,
            other => other,
        }
    }
}

/// Lifecycle state of a one-shot schedule. Terminal states are never
/// transitioned back to `Pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Executed,
    Failed,
    Expired,
}

impl ScheduleStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScheduleStatus::Pending)
    }
}

/// Action carried by a manual water command.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WaterAction {
    Water,
    Stop,
}

/// Day of the week for recurring alarms.
///
/// Serialized as lowercase three-letter names; full names are accepted on
/// input since older firmware and the dashboard disagree on the format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    #[serde(alias = "monday")]
    Mon,
    #[serde(alias = "tuesday")]
    Tue,
    #[serde(alias = "wednesday")]
    Wed,
    #[serde(alias = "thursday")]
    Thu,
    #[serde(alias = "friday")]
    Fri,
    #[serde(alias = "saturday")]
    Sat,
    #[serde(alias = "sunday")]
    Sun,
}

impl DayOfWeek {
    pub fn to_weekday(self) -> chrono::Weekday {
        match self {
            DayOfWeek::Mon => chrono::Weekday::Mon,
            DayOfWeek::Tue => chrono::Weekday::Tue,
            DayOfWeek::Wed => chrono::Weekday::Wed,
            DayOfWeek::Thu => chrono::Weekday::Thu,
            DayOfWeek::Fri => chrono::Weekday::Fri,
            DayOfWeek::Sat => chrono::Weekday::Sat,
            DayOfWeek::Sun => chrono::Weekday::Sun,
        }
    }
}

/// Inclusive bounds on watering durations, in milliseconds.
pub const MIN_DURATION_MS: u64 = 1_000;
pub const MAX_DURATION_MS: u64 = 300_000;

/// Duration used when a manual `water` command omits one.
pub const DEFAULT_DURATION_MS: u64 = 5_000;

/// Normalize a device identifier: trimmed and upper-cased.
///
/// Device ids are case-insensitive everywhere; the upper-case form is the
/// canonical one stored and used as the hub key.
pub fn canonical_device_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Render a timestamp in the wire/store format: RFC 3339 UTC with
/// millisecond precision and a `Z` suffix. Lexicographic order matches
/// chronological order, which the store's due-row queries rely on.
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current server time in the wire/store format.
pub fn iso_now() -> String {
    iso_millis(Utc::now())
}
