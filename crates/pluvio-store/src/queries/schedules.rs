// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot schedule row operations.
//!
//! Status transitions are guarded by `WHERE status = 'pending'`: once a
//! schedule reaches `executed`, `failed`, or `expired` it never moves again.

use rusqlite::{params, Row};

use pluvio_core::{PluvioError, ScheduleStatus};

use crate::database::{map_tr_err, Database};
use crate::models::{parse_text_col, NewSchedule, Schedule};

const SCHEDULE_COLUMNS: &str = "id, device_id, fire_at, duration_ms, status, retry_count,
     last_error, executed_at, created_at, updated_at";

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        device_id: row.get(1)?,
        fire_at: row.get(2)?,
        duration_ms: row.get::<_, i64>(3)? as u64,
        status: parse_text_col(4, row.get::<_, String>(4)?)?,
        retry_count: row.get(5)?,
        last_error: row.get(6)?,
        executed_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Insert a new pending schedule and return the stored row.
pub async fn create(db: &Database, new: NewSchedule) -> Result<Schedule, PluvioError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO schedules (device_id, fire_at, duration_ms)
                 VALUES (?1, ?2, ?3)",
                params![new.device_id, new.fire_at, new.duration_ms as i64],
            )?;
            let id = conn.last_insert_rowid();
            let schedule = conn.query_row(
                &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"),
                params![id],
                schedule_from_row,
            )?;
            Ok(schedule)
        })
        .await
        .map_err(map_tr_err)
}

/// Pending schedules for a device, soonest first.
pub async fn list_pending_for_device(
    db: &Database,
    device_id: &str,
) -> Result<Vec<Schedule>, PluvioError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules
                 WHERE device_id = ?1 AND status = 'pending'
                 ORDER BY fire_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![device_id], schedule_from_row)?;
            let mut schedules = Vec::new();
            for row in rows {
                schedules.push(row?);
            }
            Ok(schedules)
        })
        .await
        .map_err(map_tr_err)
}

/// Find a schedule by id.
pub async fn find(db: &Database, id: i64) -> Result<Option<Schedule>, PluvioError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?1"),
                params![id],
                schedule_from_row,
            );
            match result {
                Ok(schedule) => Ok(Some(schedule)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Pending schedules whose `fire_at` is at or before `now_iso`, soonest
/// first.
pub async fn list_due(db: &Database, now_iso: &str) -> Result<Vec<Schedule>, PluvioError> {
    let now_iso = now_iso.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules
                 WHERE status = 'pending' AND fire_at <= ?1
                 ORDER BY fire_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![now_iso], schedule_from_row)?;
            let mut schedules = Vec::new();
            for row in rows {
                schedules.push(row?);
            }
            Ok(schedules)
        })
        .await
        .map_err(map_tr_err)
}

/// Transition a pending schedule to a terminal status.
///
/// Returns `false` when the row was missing or already terminal; terminal
/// rows are never resurrected or re-stamped.
pub async fn mark(
    db: &Database,
    id: i64,
    status: ScheduleStatus,
    error: Option<&str>,
) -> Result<bool, PluvioError> {
    let status_text = status.to_string();
    let error = error.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE schedules SET
                     status = ?2,
                     last_error = COALESCE(?3, last_error),
                     executed_at = CASE WHEN ?2 = 'executed'
                         THEN strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         ELSE executed_at END,
                     retry_count = retry_count
                         + (CASE WHEN ?2 = 'failed' THEN 1 ELSE 0 END),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id, status_text, error],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}
