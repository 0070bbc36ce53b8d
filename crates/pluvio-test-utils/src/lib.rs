// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test utilities for the Pluvio workspace: a capturing mock peer
//! link and a wired store/hub/router harness.

pub mod harness;
pub mod mock_link;

pub use harness::{TestHarness, TEST_SERVER_TAG};
pub use mock_link::MockLink;
