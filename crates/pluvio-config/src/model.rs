// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pluvio backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Pluvio configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with `PLUVIO_*`
/// environment variable overrides. All sections are optional and default to
/// sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluvioConfig {
    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session hub liveness settings.
    #[serde(default)]
    pub hub: HubConfig,

    /// Alarm engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service tag stamped into every outbound frame's `server` field.
    #[serde(default = "default_service_tag")]
    pub service_tag: String,

    /// Deployment environment tag ("development", "production").
    #[serde(default = "default_env")]
    pub env: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Externally reachable base URL advertised to registering devices.
    /// When unset, derived from `host`/`port`.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            service_tag: default_service_tag(),
            env: default_env(),
            log_level: default_log_level(),
            public_url: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_service_tag() -> String {
    "pluvio".to_string()
}

fn default_env() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "pluvio.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Session hub liveness configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// A device session whose `last_seen` is older than this is stale.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Interval between sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Interval between protocol-level pings on each session.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

fn default_stale_after_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    120
}

fn default_keepalive_interval_secs() -> u64 {
    25
}

/// Alarm engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Interval between engine ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// A pending one-shot schedule due longer ago than this is expired
    /// instead of fired.
    #[serde(default = "default_schedule_grace_secs")]
    pub schedule_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            schedule_grace_secs: default_schedule_grace_secs(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_schedule_grace_secs() -> u64 {
    60
}
