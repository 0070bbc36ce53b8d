// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Isolated test harness: temp SQLite store + hub + router.
//!
//! Each harness owns its own temporary database; tests are independent and
//! order-insensitive.

use std::sync::Arc;

use tempfile::TempDir;

use pluvio_config::model::StorageConfig;
use pluvio_core::PluvioError;
use pluvio_hub::SessionHub;
use pluvio_router::CommandRouter;
use pluvio_store::Store;

/// Service tag used by harness-built routers.
pub const TEST_SERVER_TAG: &str = "pluvio-test";

/// A fully wired core: store, hub, router, sharing one temp database.
pub struct TestHarness {
    pub store: Arc<Store>,
    pub hub: Arc<SessionHub>,
    pub router: Arc<CommandRouter>,
    _dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Result<Self, PluvioError> {
        let dir = tempfile::tempdir().map_err(|e| PluvioError::Internal(e.to_string()))?;
        let config = StorageConfig {
            database_path: dir
                .path()
                .join("harness.db")
                .to_str()
                .expect("temp path is valid UTF-8")
                .to_string(),
            wal_mode: true,
        };
        let store = Arc::new(Store::open(&config).await?);
        let hub = Arc::new(SessionHub::new());
        let router = Arc::new(CommandRouter::new(
            hub.clone(),
            store.clone(),
            TEST_SERVER_TAG.to_string(),
        ));
        Ok(Self {
            store,
            hub,
            router,
            _dir: dir,
        })
    }
}
