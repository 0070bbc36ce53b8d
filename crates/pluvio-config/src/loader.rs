// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pluvio.toml` > `~/.config/pluvio/pluvio.toml` >
//! `/etc/pluvio/pluvio.toml` with environment variable overrides via the
//! `PLUVIO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PluvioConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pluvio/pluvio.toml` (system-wide)
/// 3. `~/.config/pluvio/pluvio.toml` (user XDG config)
/// 4. `./pluvio.toml` (local directory)
/// 5. `PLUVIO_*` environment variables
pub fn load_config() -> Result<PluvioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PluvioConfig::default()))
        .merge(Toml::file("/etc/pluvio/pluvio.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("pluvio/pluvio.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("pluvio.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<PluvioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PluvioConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PluvioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PluvioConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PLUVIO_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("PLUVIO_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("hub_", "hub.", 1)
            .replacen("engine_", "engine.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_extract_without_any_sources() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.hub.stale_after_secs, 600);
        assert_eq!(config.engine.tick_interval_secs, 60);
    }

    #[test]
    fn env_vars_override_toml() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PLUVIO_SERVER_PORT", "8088");
            jail.set_env("PLUVIO_STORAGE_DATABASE_PATH", "/var/lib/pluvio/p.db");
            let config: PluvioConfig = Figment::new()
                .merge(Serialized::defaults(PluvioConfig::default()))
                .merge(Toml::string("[server]\nport = 4000"))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.server.port, 8088);
            assert_eq!(config.storage.database_path, "/var/lib/pluvio/p.db");
            Ok(())
        });
    }
}
