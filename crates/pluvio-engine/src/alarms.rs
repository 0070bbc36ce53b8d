// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The alarm engine: one process-wide periodic tick that fires due
//! recurring alarms and due one-shot schedules.
//!
//! At most one tick runs at a time. Within a tick, alarms fire in the order
//! the store returns them (`next_execution` ascending, then id). A failure
//! on one row never aborts the tick.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pluvio_config::model::EngineConfig;
use pluvio_core::{iso_millis, iso_now, wire, DeviceStatus, PluvioError, ScheduleStatus};
use pluvio_router::{next_command_id, CommandRouter};
use pluvio_store::{Alarm, Schedule, Store};

use crate::next_run::{next_occurrence, parse_time_of_day};

/// Counts of what one tick did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub alarms_executed: usize,
    pub alarms_missed: usize,
    pub alarms_failed: usize,
    pub schedules_executed: usize,
    pub schedules_failed: usize,
    pub schedules_expired: usize,
}

impl TickOutcome {
    fn is_quiet(&self) -> bool {
        *self == TickOutcome::default()
    }
}

/// Periodic worker that reads due rows from the store and dispatches
/// through the router.
pub struct AlarmEngine {
    store: Arc<Store>,
    router: Arc<CommandRouter>,
    tick_interval: std::time::Duration,
    schedule_grace: Duration,
}

impl AlarmEngine {
    pub fn new(store: Arc<Store>, router: Arc<CommandRouter>, config: &EngineConfig) -> Self {
        Self {
            store,
            router,
            tick_interval: std::time::Duration::from_secs(config.tick_interval_secs),
            schedule_grace: Duration::seconds(config.schedule_grace_secs as i64),
        }
    }

    /// Run the tick loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        // Skip the first immediate tick.
        interval.tick().await;

        info!(interval_secs = self.tick_interval.as_secs(), "alarm engine started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.tick(Utc::now()).await;
                    if !outcome.is_quiet() {
                        info!(?outcome, "engine tick");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("alarm engine shutting down");
                    break;
                }
            }
        }
    }

    /// Process everything due at `now`. Public so tests and the harness can
    /// drive the engine without waiting on wall-clock.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        match self.store.find_due_alarms(now).await {
            Ok(due) => {
                for alarm in due {
                    if let Err(e) = self.fire_alarm(&alarm, now, &mut outcome).await {
                        warn!(alarm_id = alarm.id, error = %e, "alarm processing failed");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to read due alarms"),
        }

        match self.store.list_due_schedules(now).await {
            Ok(due) => {
                for schedule in due {
                    if let Err(e) = self.process_schedule(&schedule, now, &mut outcome).await {
                        warn!(schedule_id = schedule.id, error = %e, "schedule processing failed");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to read due schedules"),
        }

        outcome
    }

    /// Fire one due alarm.
    ///
    /// The alarm is advanced whether or not the device was reachable; a
    /// device that is down must not accumulate a backlog of stale firings.
    async fn fire_alarm(
        &self,
        alarm: &Alarm,
        now: DateTime<Utc>,
        outcome: &mut TickOutcome,
    ) -> Result<(), PluvioError> {
        let Some(time_of_day) = parse_time_of_day(&alarm.time) else {
            return Err(PluvioError::Validation(format!(
                "alarm {} has unparseable time {:?}",
                alarm.id, alarm.time
            )));
        };
        let local_now = now.with_timezone(&Local);
        let Some(next_local) = next_occurrence(time_of_day, &alarm.days, local_now) else {
            return Err(PluvioError::Validation(format!(
                "alarm {} has no computable next firing",
                alarm.id
            )));
        };
        let next = next_local.with_timezone(&Utc);

        let device = self.store.find_device(&alarm.device_id).await?;
        let online = device
            .map(|d| d.status == DeviceStatus::Online)
            .unwrap_or(false);

        if !online {
            self.store
                .update_alarm_after_fire(alarm.id, None, next)
                .await?;
            self.router
                .broadcast_to_dashboards(
                    wire::message_types::ALARM_MISSED,
                    serde_json::json!({
                        "alarmId": alarm.id,
                        "alarmName": alarm.name,
                        "deviceId": alarm.device_id,
                        "reason": "Device offline",
                        "nextExecution": iso_millis(next),
                    }),
                )
                .await;
            outcome.alarms_missed += 1;
            debug!(alarm_id = alarm.id, device_id = alarm.device_id.as_str(), "alarm missed");
            return Ok(());
        }

        let payload = serde_json::json!({
            "action": "water",
            "duration": alarm.duration_ms,
            "alarmId": alarm.id,
            "alarmName": alarm.name,
            "commandId": next_command_id(),
            "timestamp": iso_now(),
        });
        let sent = self
            .router
            .send_to_device(&alarm.device_id, wire::message_types::WATER_COMMAND, payload)
            .await;

        if sent {
            self.store
                .update_alarm_after_fire(alarm.id, Some(now), next)
                .await?;
            self.router
                .broadcast_to_dashboards(
                    wire::message_types::ALARM_EXECUTED,
                    serde_json::json!({
                        "alarmId": alarm.id,
                        "alarmName": alarm.name,
                        "deviceId": alarm.device_id,
                        "duration": alarm.duration_ms,
                        "executedAt": iso_millis(now),
                        "nextExecution": iso_millis(next),
                    }),
                )
                .await;
            outcome.alarms_executed += 1;
            info!(alarm_id = alarm.id, device_id = alarm.device_id.as_str(), "alarm executed");
        } else {
            self.store
                .update_alarm_after_fire(alarm.id, None, next)
                .await?;
            self.router
                .broadcast_to_dashboards(
                    wire::message_types::ALARM_FAILED,
                    serde_json::json!({
                        "alarmId": alarm.id,
                        "alarmName": alarm.name,
                        "deviceId": alarm.device_id,
                        "reason": "dispatch failed",
                        "nextExecution": iso_millis(next),
                    }),
                )
                .await;
            outcome.alarms_failed += 1;
            warn!(alarm_id = alarm.id, device_id = alarm.device_id.as_str(), "alarm dispatch failed");
        }
        Ok(())
    }

    /// Process one due one-shot schedule: expire it when its firing window
    /// has passed, otherwise dispatch exactly once.
    async fn process_schedule(
        &self,
        schedule: &Schedule,
        now: DateTime<Utc>,
        outcome: &mut TickOutcome,
    ) -> Result<(), PluvioError> {
        let fire_at = DateTime::parse_from_rfc3339(&schedule.fire_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                PluvioError::Validation(format!(
                    "schedule {} has unparseable fire_at: {e}",
                    schedule.id
                ))
            })?;

        if fire_at < now - self.schedule_grace {
            self.store
                .mark_schedule(schedule.id, ScheduleStatus::Expired, Some("missed firing window"))
                .await?;
            self.router
                .broadcast_to_dashboards(
                    wire::message_types::SCHEDULE_EXPIRED,
                    serde_json::json!({
                        "scheduleId": schedule.id,
                        "deviceId": schedule.device_id,
                    }),
                )
                .await;
            outcome.schedules_expired += 1;
            debug!(schedule_id = schedule.id, "schedule expired");
            return Ok(());
        }

        let device = self.store.find_device(&schedule.device_id).await?;
        let online = device
            .map(|d| d.status == DeviceStatus::Online)
            .unwrap_or(false);

        let dispatched = online
            && self
                .router
                .send_to_device(
                    &schedule.device_id,
                    wire::message_types::WATER_COMMAND,
                    serde_json::json!({
                        "action": "water",
                        "duration": schedule.duration_ms,
                        "scheduleId": schedule.id,
                        "commandId": next_command_id(),
                        "timestamp": iso_now(),
                    }),
                )
                .await;

        if dispatched {
            self.store
                .mark_schedule(schedule.id, ScheduleStatus::Executed, None)
                .await?;
            self.router
                .broadcast_to_dashboards(
                    wire::message_types::SCHEDULE_EXECUTED,
                    serde_json::json!({
                        "scheduleId": schedule.id,
                        "deviceId": schedule.device_id,
                        "duration": schedule.duration_ms,
                        "executedAt": iso_millis(now),
                    }),
                )
                .await;
            outcome.schedules_executed += 1;
            info!(schedule_id = schedule.id, device_id = schedule.device_id.as_str(), "schedule executed");
        } else {
            let reason = if online { "not connected" } else { "Device offline" };
            self.store
                .mark_schedule(schedule.id, ScheduleStatus::Failed, Some(reason))
                .await?;
            self.router
                .broadcast_to_dashboards(
                    wire::message_types::SCHEDULE_FAILED,
                    serde_json::json!({
                        "scheduleId": schedule.id,
                        "deviceId": schedule.device_id,
                        "reason": reason,
                    }),
                )
                .await;
            outcome.schedules_failed += 1;
            warn!(schedule_id = schedule.id, reason, "schedule dispatch failed");
        }
        Ok(())
    }
}
