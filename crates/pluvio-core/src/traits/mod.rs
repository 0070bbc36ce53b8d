// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the session hub and the transport layer.

pub mod link;

pub use link::{PeerLink, CLOSE_SUPERSEDED, CLOSE_TIMEOUT};
