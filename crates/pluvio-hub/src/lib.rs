// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session registry for the Pluvio backend.
//!
//! The hub owns every live peer session: devices keyed by canonical device
//! id, dashboards keyed by transport handle. It admits, tracks liveness,
//! evicts superseded and stale sessions, and keeps the process-wide
//! connection counters.

pub mod hub;
pub mod session;

pub use hub::{DeviceAdmission, HubStats, HubStatsSnapshot, SessionHub};
pub use session::{DashboardSession, DeviceSession};
