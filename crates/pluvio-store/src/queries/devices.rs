// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device row operations.
//!
//! `ws_connections` is only ever advanced with `ws_connections + 1` inside
//! the single-writer connection, which is what keeps the counter strictly
//! monotonic per row.

use rusqlite::{params, Row};

use pluvio_core::{DeviceStatus, PluvioError, PumpStatus};

use crate::database::{map_tr_err, Database};
use crate::models::{parse_text_col, Device};

const DEVICE_COLUMNS: &str = "id, device_id, status, pump_status, last_ip, ws_connections,
     last_seen, last_heartbeat, last_error, created_at, updated_at";

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        device_id: row.get(1)?,
        status: parse_text_col(2, row.get::<_, String>(2)?)?,
        pump_status: parse_text_col(3, row.get::<_, String>(3)?)?,
        last_ip: row.get(4)?,
        ws_connections: row.get(5)?,
        last_seen: row.get(6)?,
        last_heartbeat: row.get(7)?,
        last_error: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Create the device row if it does not exist; refresh `last_ip` otherwise.
/// Returns the row either way.
pub async fn register_or_touch(
    db: &Database,
    device_id: &str,
    ip: Option<&str>,
) -> Result<Device, PluvioError> {
    let device_id = device_id.to_string();
    let ip = ip.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO devices (device_id, last_ip) VALUES (?1, ?2)
                 ON CONFLICT(device_id) DO UPDATE SET
                     last_ip = COALESCE(excluded.last_ip, devices.last_ip),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![device_id, ip],
            )?;
            let device = conn.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?1"),
                params![device_id],
                device_from_row,
            )?;
            Ok(device)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a successful join: marks the device online, bumps the connection
/// counter, and refreshes `last_seen`. Creates the row if needed.
pub async fn record_connection(
    db: &Database,
    device_id: &str,
    addr: Option<&str>,
) -> Result<Device, PluvioError> {
    let device_id = device_id.to_string();
    let addr = addr.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO devices (device_id, status, last_ip, ws_connections, last_seen)
                 VALUES (?1, 'online', ?2, 1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(device_id) DO UPDATE SET
                     status = 'online',
                     last_ip = COALESCE(excluded.last_ip, devices.last_ip),
                     ws_connections = devices.ws_connections + 1,
                     last_seen = excluded.last_seen,
                     last_error = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![device_id, addr],
            )?;
            let device = conn.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?1"),
                params![device_id],
                device_from_row,
            )?;
            Ok(device)
        })
        .await
        .map_err(map_tr_err)
}

/// Update connectivity/pump state. `None` fields are left untouched.
pub async fn set_status(
    db: &Database,
    device_id: &str,
    online: Option<DeviceStatus>,
    pump: Option<PumpStatus>,
    last_seen: Option<String>,
) -> Result<(), PluvioError> {
    let device_id = device_id.to_string();
    let online = online.map(|s| s.to_string());
    let pump = pump.map(|s| s.normalized().to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE devices SET
                     status = COALESCE(?2, status),
                     pump_status = COALESCE(?3, pump_status),
                     last_seen = COALESCE(?4, last_seen),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE device_id = ?1",
                params![device_id, online, pump, last_seen],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a heartbeat: refreshes both `last_heartbeat` and `last_seen`.
pub async fn record_heartbeat(
    db: &Database,
    device_id: &str,
    at: String,
) -> Result<(), PluvioError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE devices SET
                     last_heartbeat = ?2,
                     last_seen = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE device_id = ?1",
                params![device_id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Store the last connection-error string for a device.
pub async fn record_error(
    db: &Database,
    device_id: &str,
    error: &str,
) -> Result<(), PluvioError> {
    let device_id = device_id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE devices SET
                     last_error = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE device_id = ?1",
                params![device_id, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All known devices, most recently seen first.
pub async fn list(db: &Database) -> Result<Vec<Device>, PluvioError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY last_seen DESC, device_id ASC"
            ))?;
            let rows = stmt.query_map([], device_from_row)?;
            let mut devices = Vec::new();
            for row in rows {
                devices.push(row?);
            }
            Ok(devices)
        })
        .await
        .map_err(map_tr_err)
}

/// Find a device by its canonical id.
pub async fn find(db: &Database, device_id: &str) -> Result<Option<Device>, PluvioError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?1"),
                params![device_id],
                device_from_row,
            );
            match result {
                Ok(device) => Ok(Some(device)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// `(total, online)` device counts for the health endpoint.
pub async fn counts(db: &Database) -> Result<(i64, i64), PluvioError> {
    db.connection()
        .call(|conn| {
            let pair = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status = 'online' THEN 1 ELSE 0 END), 0)
                 FROM devices",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(pair)
        })
        .await
        .map_err(map_tr_err)
}
