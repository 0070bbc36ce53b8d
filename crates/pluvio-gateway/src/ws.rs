// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport for devices and dashboards.
//!
//! Each connection is split into a sender task draining an outbound queue
//! and a reader loop feeding the protocol handler. The queue is the
//! [`PeerLink`] implementation handed to the hub, so any component can
//! write to or close a session without touching the socket. A protocol
//! ping goes out on the keep-alive interval; pongs refresh `last_seen`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use pluvio_core::{PeerLink, PluvioError};

use crate::protocol::{PeerConnection, MAX_FRAME_BYTES};
use crate::AppState;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

enum LinkCommand {
    Frame(String),
    Ping,
    Close(u16, String),
}

/// A live socket's outbound queue, shared with the hub.
pub struct WsLink {
    id: u64,
    tx: mpsc::Sender<LinkCommand>,
}

impl WsLink {
    fn new(tx: mpsc::Sender<LinkCommand>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        })
    }

    async fn ping(&self) -> Result<(), PluvioError> {
        self.tx
            .send(LinkCommand::Ping)
            .await
            .map_err(|_| PluvioError::Channel {
                message: "session outbound queue closed".to_string(),
                source: None,
            })
    }
}

#[async_trait]
impl PeerLink for WsLink {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send_text(&self, frame: String) -> Result<(), PluvioError> {
        self.tx
            .send(LinkCommand::Frame(frame))
            .await
            .map_err(|_| PluvioError::Channel {
                message: "session outbound queue closed".to_string(),
                source: None,
            })
    }

    async fn close(&self, code: u16, reason: &str) {
        let _ = self
            .tx
            .send(LinkCommand::Close(code, reason.to_string()))
            .await;
    }
}

/// WebSocket upgrade handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Drive one connection to completion.
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<LinkCommand>(64);
    let link = WsLink::new(tx);

    let sender_task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let finished = match command {
                LinkCommand::Frame(frame) => {
                    ws_sender.send(Message::Text(frame.into())).await.is_err()
                }
                LinkCommand::Ping => ws_sender.send(Message::Ping(Default::default())).await.is_err(),
                LinkCommand::Close(code, reason) => {
                    let _ = ws_sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    true
                }
            };
            if finished {
                break;
            }
        }
    });

    let keepalive = std::time::Duration::from_secs(state.config.keepalive_interval_secs.max(1));
    let mut connection =
        PeerConnection::open(state, link.clone(), Some(addr.ip().to_string())).await;

    let mut ping_interval = tokio::time::interval(keepalive);
    ping_interval.tick().await;

    let close_reason = loop {
        tokio::select! {
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => connection.handle_text(&text).await,
                Some(Ok(Message::Pong(_))) => connection.handle_pong().await,
                Some(Ok(Message::Close(_))) => break "closed",
                Some(Ok(_)) => {} // Binary and ping are handled by the ws layer.
                Some(Err(e)) => {
                    debug!(error = %e, "socket read error");
                    break "error";
                }
                None => break "closed",
            },
            _ = ping_interval.tick() => {
                if link.ping().await.is_err() {
                    break "error";
                }
            }
        }
    };

    connection.on_close(close_reason).await;
    sender_task.abort();
}
