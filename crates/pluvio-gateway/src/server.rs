// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, body limits, and CORS for the REST surface and the
//! WebSocket endpoint.

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use pluvio_core::PluvioError;

use crate::{handlers, ws, AppState};

/// HTTP request bodies are capped at 1 MiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Assemble the full route table over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::banner))
        .route("/health", get(handlers::health))
        .route("/api/devices/register", post(handlers::register_device))
        .route("/api/devices/{id}/schedules", get(handlers::list_device_schedules))
        .route("/api/devices/{id}/alarms", get(handlers::list_device_alarms))
        .route("/api/devices/{id}/water", post(handlers::water_device))
        .route("/api/schedules", post(handlers::create_schedule))
        .route("/api/alarms", post(handlers::create_alarm))
        .route("/api/alarms/{id}/toggle", put(handlers::toggle_alarm))
        .route("/api/alarms/{id}", delete(handlers::delete_alarm))
        .route("/api/debug/connections", get(handlers::debug_connections))
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start_server(state: AppState) -> Result<(), PluvioError> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PluvioError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| PluvioError::Channel {
        message: format!("gateway server error: {e}"),
        source: Some(Box::new(e)),
    })?;

    Ok(())
}
