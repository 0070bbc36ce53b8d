// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persistence facade the rest of the workspace talks to.
//!
//! Wraps a [`Database`] handle and delegates to the typed query modules.
//! Device ids are canonicalized (upper-case) at this boundary, so callers
//! can pass whatever casing the peer sent.

use chrono::{DateTime, Utc};

use pluvio_config::model::StorageConfig;
use pluvio_core::{
    canonical_device_id, iso_millis, DeviceStatus, PluvioError, PumpStatus, ScheduleStatus,
};

use crate::database::Database;
use crate::models::{Alarm, Device, NewAlarm, NewSchedule, Schedule};
use crate::queries;

/// SQLite-backed store for devices, alarms, and one-shot schedules.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open the store at the configured path, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, PluvioError> {
        let db = Database::open_with_wal(&config.database_path, config.wal_mode).await?;
        tracing::debug!(path = %config.database_path, "store opened");
        Ok(Self { db })
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<(), PluvioError> {
        self.db.ping().await
    }

    /// Checkpoint and release the database.
    pub async fn close(&self) -> Result<(), PluvioError> {
        self.db.close().await
    }

    // --- Devices ---

    pub async fn register_or_touch_device(
        &self,
        device_id: &str,
        ip: Option<&str>,
    ) -> Result<Device, PluvioError> {
        queries::devices::register_or_touch(&self.db, &canonical_device_id(device_id), ip).await
    }

    /// Record a successful join: online, counter+1, `last_seen` refreshed.
    pub async fn record_connection(
        &self,
        device_id: &str,
        addr: Option<&str>,
    ) -> Result<Device, PluvioError> {
        queries::devices::record_connection(&self.db, &canonical_device_id(device_id), addr).await
    }

    pub async fn set_device_status(
        &self,
        device_id: &str,
        online: Option<DeviceStatus>,
        pump: Option<PumpStatus>,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<(), PluvioError> {
        queries::devices::set_status(
            &self.db,
            &canonical_device_id(device_id),
            online,
            pump,
            last_seen.map(iso_millis),
        )
        .await
    }

    pub async fn record_heartbeat(
        &self,
        device_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PluvioError> {
        queries::devices::record_heartbeat(&self.db, &canonical_device_id(device_id), iso_millis(at))
            .await
    }

    pub async fn record_device_error(
        &self,
        device_id: &str,
        error: &str,
    ) -> Result<(), PluvioError> {
        queries::devices::record_error(&self.db, &canonical_device_id(device_id), error).await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>, PluvioError> {
        queries::devices::list(&self.db).await
    }

    pub async fn find_device(&self, device_id: &str) -> Result<Option<Device>, PluvioError> {
        queries::devices::find(&self.db, &canonical_device_id(device_id)).await
    }

    /// `(total, online)` counts for the health endpoint.
    pub async fn count_devices(&self) -> Result<(i64, i64), PluvioError> {
        queries::devices::counts(&self.db).await
    }

    // --- Alarms ---

    pub async fn create_alarm(&self, mut new: NewAlarm) -> Result<Alarm, PluvioError> {
        new.device_id = canonical_device_id(&new.device_id);
        queries::alarms::create(&self.db, new).await
    }

    pub async fn list_alarms(&self, device_id: &str) -> Result<Vec<Alarm>, PluvioError> {
        queries::alarms::list_for_device(&self.db, &canonical_device_id(device_id)).await
    }

    pub async fn find_alarm(&self, id: i64) -> Result<Option<Alarm>, PluvioError> {
        queries::alarms::find(&self.db, id).await
    }

    pub async fn toggle_alarm(&self, id: i64) -> Result<Option<Alarm>, PluvioError> {
        queries::alarms::toggle(&self.db, id).await
    }

    pub async fn set_alarm_next_execution(
        &self,
        id: i64,
        next_execution: DateTime<Utc>,
    ) -> Result<(), PluvioError> {
        queries::alarms::set_next_execution(&self.db, id, iso_millis(next_execution)).await
    }

    pub async fn delete_alarm(&self, id: i64) -> Result<bool, PluvioError> {
        queries::alarms::delete(&self.db, id).await
    }

    pub async fn find_due_alarms(&self, now: DateTime<Utc>) -> Result<Vec<Alarm>, PluvioError> {
        queries::alarms::find_due(&self.db, &iso_millis(now)).await
    }

    pub async fn update_alarm_after_fire(
        &self,
        id: i64,
        fired_at: Option<DateTime<Utc>>,
        next_execution: DateTime<Utc>,
    ) -> Result<(), PluvioError> {
        queries::alarms::mark_fired(
            &self.db,
            id,
            fired_at.map(iso_millis),
            iso_millis(next_execution),
        )
        .await
    }

    // --- One-shot schedules ---

    pub async fn create_schedule(&self, mut new: NewSchedule) -> Result<Schedule, PluvioError> {
        new.device_id = canonical_device_id(&new.device_id);
        queries::schedules::create(&self.db, new).await
    }

    pub async fn list_pending_schedules(
        &self,
        device_id: &str,
    ) -> Result<Vec<Schedule>, PluvioError> {
        queries::schedules::list_pending_for_device(&self.db, &canonical_device_id(device_id))
            .await
    }

    pub async fn find_schedule(&self, id: i64) -> Result<Option<Schedule>, PluvioError> {
        queries::schedules::find(&self.db, id).await
    }

    pub async fn list_due_schedules(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Schedule>, PluvioError> {
        queries::schedules::list_due(&self.db, &iso_millis(now)).await
    }

    pub async fn mark_schedule(
        &self,
        id: i64,
        status: ScheduleStatus,
        error: Option<&str>,
    ) -> Result<bool, PluvioError> {
        queries::schedules::mark(&self.db, id, status, error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("store.db").to_str().unwrap().to_string(),
            wal_mode: true,
        };
        let store = Store::open(&config).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn device_ids_are_case_insensitive() {
        let (store, _dir) = open_store().await;
        store.register_or_touch_device("strwsmk1", None).await.unwrap();
        let found = store.find_device("StrWsMk1").await.unwrap().unwrap();
        assert_eq!(found.device_id, "STRWSMK1");

        store.record_connection("strWSmk1", None).await.unwrap();
        let (total, online) = store.count_devices().await.unwrap();
        assert_eq!((total, online), (1, 1));
    }

    #[tokio::test]
    async fn alarm_lifecycle_through_facade() {
        let (store, _dir) = open_store().await;
        store.register_or_touch_device("a1", None).await.unwrap();
        let alarm = store
            .create_alarm(NewAlarm {
                device_id: "a1".into(),
                name: "evening".into(),
                time: "19:30".into(),
                days: vec![pluvio_core::DayOfWeek::Fri],
                duration_ms: 12000,
                next_execution: "2026-03-06T19:30:00.000Z".into(),
            })
            .await
            .unwrap();
        assert_eq!(alarm.device_id, "A1");

        let listed = store.list_alarms("A1").await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(store.delete_alarm(alarm.id).await.unwrap());
        assert!(store.list_alarms("A1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ping_answers_on_open_store() {
        let (store, _dir) = open_store().await;
        store.ping().await.unwrap();
        store.close().await.unwrap();
    }
}
