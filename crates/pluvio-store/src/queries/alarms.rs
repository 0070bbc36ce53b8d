// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recurring alarm row operations.
//!
//! `find_due` is the engine's read path; it orders by `next_execution`
//! ascending then id, which is the only ordering the engine relies on.
//! `execution_count` advances only via `execution_count + 1` in SQL.

use rusqlite::{params, Row};

use pluvio_core::PluvioError;

use crate::database::{map_tr_err, Database};
use crate::models::{parse_days_col, Alarm, NewAlarm};

const ALARM_COLUMNS: &str = "id, device_id, name, time, days, duration_ms, is_active,
     last_executed, next_execution, execution_count, created_at, updated_at";

fn alarm_from_row(row: &Row<'_>) -> rusqlite::Result<Alarm> {
    Ok(Alarm {
        id: row.get(0)?,
        device_id: row.get(1)?,
        name: row.get(2)?,
        time: row.get(3)?,
        days: parse_days_col(4, row.get::<_, String>(4)?)?,
        duration_ms: row.get::<_, i64>(5)? as u64,
        is_active: row.get::<_, i64>(6)? != 0,
        last_executed: row.get(7)?,
        next_execution: row.get(8)?,
        execution_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Insert a new alarm and return the stored row.
pub async fn create(db: &Database, new: NewAlarm) -> Result<Alarm, PluvioError> {
    db.connection()
        .call(move |conn| {
            let days_json = serde_json::to_string(&new.days)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            conn.execute(
                "INSERT INTO alarms (device_id, name, time, days, duration_ms, next_execution)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.device_id,
                    new.name,
                    new.time,
                    days_json,
                    new.duration_ms as i64,
                    new.next_execution,
                ],
            )?;
            let id = conn.last_insert_rowid();
            let alarm = conn.query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"),
                params![id],
                alarm_from_row,
            )?;
            Ok(alarm)
        })
        .await
        .map_err(map_tr_err)
}

/// All alarms for a device, earliest time of day first.
pub async fn list_for_device(
    db: &Database,
    device_id: &str,
) -> Result<Vec<Alarm>, PluvioError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms
                 WHERE device_id = ?1 ORDER BY time ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![device_id], alarm_from_row)?;
            let mut alarms = Vec::new();
            for row in rows {
                alarms.push(row?);
            }
            Ok(alarms)
        })
        .await
        .map_err(map_tr_err)
}

/// Find an alarm by id.
pub async fn find(db: &Database, id: i64) -> Result<Option<Alarm>, PluvioError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"),
                params![id],
                alarm_from_row,
            );
            match result {
                Ok(alarm) => Ok(Some(alarm)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Flip `is_active`. Returns the updated row, or `None` for an unknown id.
pub async fn toggle(db: &Database, id: i64) -> Result<Option<Alarm>, PluvioError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE alarms SET
                     is_active = 1 - is_active,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let alarm = conn.query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"),
                params![id],
                alarm_from_row,
            )?;
            Ok(Some(alarm))
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite `next_execution` (used when re-activating an alarm).
pub async fn set_next_execution(
    db: &Database,
    id: i64,
    next_execution: String,
) -> Result<(), PluvioError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE alarms SET
                     next_execution = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, next_execution],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an alarm. Returns whether a row was removed.
pub async fn delete(db: &Database, id: i64) -> Result<bool, PluvioError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Every active alarm due at `now_iso`, ordered by `next_execution` then id.
pub async fn find_due(db: &Database, now_iso: &str) -> Result<Vec<Alarm>, PluvioError> {
    let now_iso = now_iso.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALARM_COLUMNS} FROM alarms
                 WHERE is_active = 1
                   AND next_execution IS NOT NULL
                   AND next_execution <= ?1
                 ORDER BY next_execution ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![now_iso], alarm_from_row)?;
            let mut alarms = Vec::new();
            for row in rows {
                alarms.push(row?);
            }
            Ok(alarms)
        })
        .await
        .map_err(map_tr_err)
}

/// Advance an alarm after the engine processed it.
///
/// `fired_at = Some(..)` marks a successful dispatch: `last_executed` is set
/// and `execution_count` incremented. With `None` (missed or failed
/// dispatch) only `next_execution` moves.
pub async fn mark_fired(
    db: &Database,
    id: i64,
    fired_at: Option<String>,
    next_execution: String,
) -> Result<(), PluvioError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE alarms SET
                     next_execution = ?2,
                     last_executed = COALESCE(?3, last_executed),
                     execution_count = execution_count
                         + (CASE WHEN ?3 IS NULL THEN 0 ELSE 1 END),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, next_execution, fired_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pluvio_core::DayOfWeek;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_alarm(device_id: &str, next_execution: &str) -> NewAlarm {
        NewAlarm {
            device_id: device_id.to_string(),
            name: "morning water".to_string(),
            time: "07:00".to_string(),
            days: vec![DayOfWeek::Mon, DayOfWeek::Wed],
            duration_ms: 5000,
            next_execution: next_execution.to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_find_round_trips_days() {
        let (db, _dir) = setup_db().await;
        let created = create(&db, make_alarm("STRWSMK1", "2026-03-02T07:00:00.000Z"))
            .await
            .unwrap();
        assert!(created.id > 0);
        assert!(created.is_active);
        assert_eq!(created.execution_count, 0);

        let found = find(&db, created.id).await.unwrap().unwrap();
        assert_eq!(found.days, vec![DayOfWeek::Mon, DayOfWeek::Wed]);
        assert_eq!(found.duration_ms, 5000);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_due_orders_by_next_execution_then_id() {
        let (db, _dir) = setup_db().await;
        let late = create(&db, make_alarm("A", "2026-03-02T09:00:00.000Z")).await.unwrap();
        let early = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();
        let same = create(&db, make_alarm("B", "2026-03-02T07:00:00.000Z")).await.unwrap();
        create(&db, make_alarm("C", "2026-03-09T07:00:00.000Z")).await.unwrap();

        let due = find_due(&db, "2026-03-02T12:00:00.000Z").await.unwrap();
        let ids: Vec<i64> = due.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![early.id, same.id, late.id]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_due_skips_inactive_alarms() {
        let (db, _dir) = setup_db().await;
        let alarm = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();
        toggle(&db, alarm.id).await.unwrap();

        let due = find_due(&db, "2026-03-02T12:00:00.000Z").await.unwrap();
        assert!(due.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_fired_with_timestamp_advances_count() {
        let (db, _dir) = setup_db().await;
        let alarm = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();

        mark_fired(
            &db,
            alarm.id,
            Some("2026-03-02T07:00:01.000Z".into()),
            "2026-03-04T07:00:00.000Z".into(),
        )
        .await
        .unwrap();

        let updated = find(&db, alarm.id).await.unwrap().unwrap();
        assert_eq!(updated.execution_count, 1);
        assert_eq!(updated.last_executed.as_deref(), Some("2026-03-02T07:00:01.000Z"));
        assert_eq!(updated.next_execution.as_deref(), Some("2026-03-04T07:00:00.000Z"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_fired_without_timestamp_only_advances_next() {
        let (db, _dir) = setup_db().await;
        let alarm = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();

        mark_fired(&db, alarm.id, None, "2026-03-04T07:00:00.000Z".into())
            .await
            .unwrap();

        let updated = find(&db, alarm.id).await.unwrap().unwrap();
        assert_eq!(updated.execution_count, 0);
        assert!(updated.last_executed.is_none());
        assert_eq!(updated.next_execution.as_deref(), Some("2026-03-04T07:00:00.000Z"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn execution_count_is_monotonic_across_fires() {
        let (db, _dir) = setup_db().await;
        let alarm = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();

        let mut last = 0;
        for day in 3..8 {
            mark_fired(
                &db,
                alarm.id,
                Some(format!("2026-03-{day:02}T07:00:01.000Z")),
                format!("2026-03-{:02}T07:00:00.000Z", day + 1),
            )
            .await
            .unwrap();
            let count = find(&db, alarm.id).await.unwrap().unwrap().execution_count;
            assert!(count > last);
            last = count;
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn toggle_flips_and_returns_row() {
        let (db, _dir) = setup_db().await;
        let alarm = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();

        let off = toggle(&db, alarm.id).await.unwrap().unwrap();
        assert!(!off.is_active);
        let on = toggle(&db, alarm.id).await.unwrap().unwrap();
        assert!(on.is_active);

        assert!(toggle(&db, 9999).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let (db, _dir) = setup_db().await;
        let alarm = create(&db, make_alarm("A", "2026-03-02T07:00:00.000Z")).await.unwrap();
        assert!(delete(&db, alarm.id).await.unwrap());
        assert!(!delete(&db, alarm.id).await.unwrap());
        assert!(find(&db, alarm.id).await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
