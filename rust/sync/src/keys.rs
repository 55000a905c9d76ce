// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity types for the reconciliation engine.
//!
//! Proxies and observers are owned by the engine and live in slot maps, so a
//! key held across a deferred boundary can always be checked for staleness.
//! Host nodes are owned by the host; a [`NodeId`] is only an opaque handle.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a drawing interface (the proxy bridging one node to one
    /// model object).
    pub struct ProxyKey;

    /// Key for an observer attached to a host node or collection.
    pub struct ObserverKey;
}

/// Opaque identity of a host scene-graph node.
///
/// The host may invalidate a node at any time; always re-check with
/// [`Host::is_valid`](crate::Host::is_valid) before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
