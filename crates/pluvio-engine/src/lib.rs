// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic background workers for the Pluvio backend: the alarm engine
//! (recurring alarms + one-shot schedules) and the stale-session sweeper.

pub mod alarms;
pub mod next_run;
pub mod sweeper;

pub use alarms::{AlarmEngine, TickOutcome};
pub use next_run::{next_occurrence, parse_time_of_day};
pub use sweeper::{sweep_once, Sweeper};
