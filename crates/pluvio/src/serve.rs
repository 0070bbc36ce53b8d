// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pluvio serve` command implementation.
//!
//! Wires the store, session hub, command router, alarm engine, session
//! sweeper, and the HTTP/WebSocket gateway, then runs until a shutdown
//! signal arrives.

use std::sync::Arc;

use tracing::{info, warn};

use pluvio_config::PluvioConfig;
use pluvio_core::PluvioError;
use pluvio_engine::{AlarmEngine, Sweeper};
use pluvio_gateway::{server, AppState, GatewayConfig};
use pluvio_hub::SessionHub;
use pluvio_router::CommandRouter;
use pluvio_store::Store;

use crate::shutdown;

/// Runs the `pluvio serve` command.
pub async fn run_serve(config: PluvioConfig) -> Result<(), PluvioError> {
    init_tracing(&config.server.log_level);

    info!(
        env = config.server.env.as_str(),
        port = config.server.port,
        "starting pluvio serve"
    );

    // Storage.
    let store = Arc::new(Store::open(&config.storage).await?);
    info!(path = config.storage.database_path.as_str(), "store ready");

    // Session hub and command router.
    let hub = Arc::new(SessionHub::new());
    let router = Arc::new(CommandRouter::new(
        hub.clone(),
        store.clone(),
        config.server.service_tag.clone(),
    ));

    // Install signal handler.
    let cancel = shutdown::install_signal_handler();

    // Alarm engine: the single process-wide tick.
    let engine = AlarmEngine::new(store.clone(), router.clone(), &config.engine);
    {
        let engine_cancel = cancel.clone();
        tokio::spawn(async move {
            engine.run(engine_cancel).await;
        });
    }
    info!(
        tick_secs = config.engine.tick_interval_secs,
        "alarm engine scheduled"
    );

    // Stale-session sweeper.
    let sweeper = Sweeper::new(hub.clone(), store.clone(), router.clone(), &config.hub);
    {
        let sweeper_cancel = cancel.clone();
        tokio::spawn(async move {
            sweeper.run(sweeper_cancel).await;
        });
    }
    info!(
        sweep_secs = config.hub.sweep_interval_secs,
        stale_secs = config.hub.stale_after_secs,
        "session sweeper scheduled"
    );

    // Gateway.
    let state = AppState::new(
        store.clone(),
        hub,
        router,
        GatewayConfig {
            host: config.server.host.clone(),
            port: config.server.port,
            service_tag: config.server.service_tag.clone(),
            env: config.server.env.clone(),
            public_url: config.server.public_url.clone(),
            keepalive_interval_secs: config.hub.keepalive_interval_secs,
        },
    );

    tokio::select! {
        result = server::start_server(state) => result?,
        _ = cancel.cancelled() => {
            info!("shutdown signal received, stopping gateway");
        }
    }

    if let Err(e) = store.close().await {
        warn!(error = %e, "store checkpoint on shutdown failed");
    }

    info!("pluvio serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pluvio={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
