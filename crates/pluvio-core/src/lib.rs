// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pluvio watering controller backend.
//!
//! This crate provides the error type, shared domain types, the wire
//! envelope, and the transport seam trait used throughout the Pluvio
//! workspace.

pub mod error;
pub mod traits;
pub mod types;
pub mod wire;

// Re-export key items at crate root for ergonomic imports.
pub use error::PluvioError;
pub use traits::{PeerLink, CLOSE_SUPERSEDED, CLOSE_TIMEOUT};
pub use types::{
    canonical_device_id, iso_millis, iso_now, DayOfWeek, DeviceStatus, PumpStatus,
    ScheduleStatus, WaterAction, DEFAULT_DURATION_MS, MAX_DURATION_MS, MIN_DURATION_MS,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_are_distinct_private_range() {
        assert_ne!(CLOSE_SUPERSEDED, CLOSE_TIMEOUT);
        assert!(CLOSE_SUPERSEDED >= 4000);
        assert!(CLOSE_TIMEOUT >= 4000);
    }

    #[test]
    fn duration_bounds_are_sane() {
        assert!(MIN_DURATION_MS < DEFAULT_DURATION_MS);
        assert!(DEFAULT_DURATION_MS < MAX_DURATION_MS);
    }
}
