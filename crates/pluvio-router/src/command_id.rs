// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-unique command identifiers.
//!
//! Ids are `cmd_<n>` where `n` is strictly increasing for the lifetime of
//! the process, seeded from the wall clock so ids also sort across restarts
//! in the common case. Uniqueness within a process is the contract;
//! idempotency on the device side is NOT assumed.

use std::sync::atomic::{AtomicI64, Ordering};

static LAST: AtomicI64 = AtomicI64::new(0);

/// Produce the next command id.
pub fn next_command_id() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let value = LAST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or(now);
    // fetch_update returns the previous value; recompute what was stored.
    let issued = if now > value { now } else { value + 1 };
    format!("cmd_{issued}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut seen = HashSet::new();
        let mut last = 0i64;
        for _ in 0..1000 {
            let id = next_command_id();
            let n: i64 = id.strip_prefix("cmd_").unwrap().parse().unwrap();
            assert!(n > last, "ids must be strictly increasing");
            last = n;
            assert!(seen.insert(id), "ids must be unique");
        }
    }

    #[test]
    fn ids_survive_concurrent_issuance() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..200).map(|_| next_command_id()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "concurrent ids must not collide");
            }
        }
        assert_eq!(all.len(), 1600);
    }
}
