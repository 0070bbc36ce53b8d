// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Pluvio backend: compiled defaults, TOML
//! files along the XDG hierarchy, and `PLUVIO_*` environment overrides.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::PluvioConfig;
