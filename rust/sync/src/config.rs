// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation settings.

use serde::Deserialize;

/// Tunables for a [`ModelManager`](crate::ModelManager).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Distance under which two boundary points are the same point when
    /// looking for a swapped face.
    pub swap_tolerance: f64,
    /// Area loss under which a face is not considered divided.
    pub area_tolerance: f64,
    /// Maximum number of deferred actions executed in one drain. The rest
    /// stays queued for the next drain.
    pub max_actions_per_drain: usize,
    /// Run the consistency pass once the queue is empty.
    pub verify_after_drain: bool,
    /// Let the consistency pass walk the host for marked but untracked nodes.
    pub scan_for_untracked: bool,
    /// Erased proxies kept for undo. Beyond this the oldest are dropped with
    /// their stashed objects, and undoing them creates fresh objects.
    pub max_erased_retained: usize,
}

impl SyncConfig {
    /// Load configuration from `BEM_SYNC_*` environment variables, falling
    /// back to the defaults.
    pub fn from_env() -> Self {
        Self {
            swap_tolerance: std::env::var("BEM_SYNC_SWAP_TOLERANCE")
                .unwrap_or_else(|_| "0.0001".into())
                .parse()
                .unwrap_or(1e-4),
            area_tolerance: std::env::var("BEM_SYNC_AREA_TOLERANCE")
                .unwrap_or_else(|_| "0.000001".into())
                .parse()
                .unwrap_or(1e-6),
            max_actions_per_drain: std::env::var("BEM_SYNC_MAX_ACTIONS_PER_DRAIN")
                .unwrap_or_else(|_| "100000".into())
                .parse()
                .unwrap_or(100_000),
            verify_after_drain: std::env::var("BEM_SYNC_VERIFY_AFTER_DRAIN")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            scan_for_untracked: std::env::var("BEM_SYNC_SCAN_FOR_UNTRACKED")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            max_erased_retained: std::env::var("BEM_SYNC_MAX_ERASED_RETAINED")
                .unwrap_or_else(|_| "10000".into())
                .parse()
                .unwrap_or(10_000),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            swap_tolerance: 1e-4,
            area_tolerance: 1e-6,
            max_actions_per_drain: 100_000,
            verify_after_drain: true,
            scan_for_untracked: true,
            max_erased_retained: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "max_actions_per_drain": 10 }"#).unwrap();
        assert_eq!(config.max_actions_per_drain, 10);
        assert_eq!(config.swap_tolerance, SyncConfig::default().swap_tolerance);
        assert!(config.verify_after_drain);
    }
}
