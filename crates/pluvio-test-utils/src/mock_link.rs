// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock peer link for deterministic testing.
//!
//! `MockLink` implements `PeerLink` with captured outbound frames and
//! recorded close calls for assertion in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use pluvio_core::{PeerLink, PluvioError};

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// A capturing transport fake.
pub struct MockLink {
    id: u64,
    frames: Mutex<Vec<String>>,
    close_info: Mutex<Option<(u16, String)>>,
    fail_sends: AtomicBool,
}

impl MockLink {
    /// Create a new mock link with a process-unique id.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
            frames: Mutex::new(Vec::new()),
            close_info: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Make every subsequent `send_text` fail, as a dropped transport would.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// All captured frames, parsed as JSON.
    pub fn frames(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).expect("captured frame is JSON"))
            .collect()
    }

    /// Captured frames whose envelope `type` matches.
    pub fn frames_of_type(&self, frame_type: &str) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|v| v["type"] == frame_type)
            .collect()
    }

    /// The most recent captured frame, if any.
    pub fn last_frame(&self) -> Option<Value> {
        self.frames().pop()
    }

    /// Drop captured frames.
    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }

    /// The close code and reason, if the link was closed.
    pub fn close_info(&self) -> Option<(u16, String)> {
        self.close_info.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.close_info().is_some()
    }
}

#[async_trait]
impl PeerLink for MockLink {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send_text(&self, frame: String) -> Result<(), PluvioError> {
        if self.fail_sends.load(Ordering::Relaxed) || self.is_closed() {
            return Err(PluvioError::Channel {
                message: "mock link closed".into(),
                source: None,
            });
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self, code: u16, reason: &str) {
        let mut info = self.close_info.lock().unwrap();
        if info.is_none() {
            *info = Some((code, reason.to_string()));
        }
    }
}
