// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pluvio watering controller backend.

use thiserror::Error;

/// The primary error type used across all Pluvio crates.
#[derive(Debug, Error)]
pub enum PluvioError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport channel errors (bind failure, send on a closed session).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A peer-supplied message or HTTP body failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An operation's precondition does not hold (device missing, offline, not connected).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
