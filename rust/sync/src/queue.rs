// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deferred event queue.
//!
//! Host callbacks arrive while the host is still iterating its own
//! collections, so nothing may touch the scene graph from inside a callback.
//! Callbacks are turned into [`Command`]s and queued here; the queue is
//! drained at host idle points by [`ModelManager::drain`](crate::ModelManager::drain).
//!
//! The queue itself only orders work. It never runs anything: enqueueing
//! during a drain appends to the pass in progress.

use std::collections::VecDeque;

use bem_sketch_model::Handle;

use crate::keys::{NodeId, ProxyKey};

/// A unit of deferred reconciliation work.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A tracked node changed.
    NodeChanged { proxy: ProxyKey, node: NodeId },
    /// A tracked node was erased (or the host says so).
    NodeErased { proxy: ProxyKey, node: NodeId },
    /// A node appeared in a tracked container. `None` is the document root.
    ElementAdded {
        container: Option<ProxyKey>,
        node: NodeId,
    },
    /// A node left a tracked container.
    ElementRemoved {
        container: Option<ProxyKey>,
        node: NodeId,
    },
    /// Enable a proxy's observers.
    ArmObservers { proxy: ProxyKey },
    /// Repaint a proxy's node.
    Paint { proxy: ProxyKey },
    SelectionChanged { nodes: Vec<NodeId> },
    SettingsChanged { north_axis_degrees: f64 },
    /// A model object was edited from the domain side.
    DomainChanged { handle: Handle },
}

/// A queued command and the position it was enqueued at.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredAction {
    pub seq: u64,
    pub command: Command,
}

/// FIFO of deferred actions with pause and re-entrancy guards.
#[derive(Debug, Default)]
pub struct DeferredEventQueue {
    pending: VecDeque<DeferredAction>,
    next_seq: u64,
    draining: bool,
    paused: usize,
}

impl DeferredEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Returns its sequence number.
    pub fn enqueue(&mut self, command: Command) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        tracing::trace!(seq, ?command, "enqueued");
        self.pending.push_back(DeferredAction { seq, command });
        seq
    }

    /// Removes the oldest action.
    pub fn pop(&mut self) -> Option<DeferredAction> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredAction> {
        self.pending.iter()
    }

    /// Returns `true` if any pending action satisfies the predicate.
    pub fn contains(&self, mut predicate: impl FnMut(&Command) -> bool) -> bool {
        self.pending.iter().any(|a| predicate(&a.command))
    }

    /// Stops draining until a matching [`resume`](Self::resume). Nests.
    pub fn pause(&mut self) {
        self.paused += 1;
    }

    pub fn resume(&mut self) {
        self.paused = self.paused.saturating_sub(1);
    }

    pub fn is_paused(&self) -> bool {
        self.paused > 0
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Marks the start of a drain pass. Returns `false`, and starts nothing,
    /// if a pass is already running or processing is paused.
    pub fn begin_drain(&mut self) -> bool {
        if self.draining || self.is_paused() {
            return false;
        }
        self.draining = true;
        true
    }

    pub fn end_drain(&mut self) {
        self.draining = false;
    }

    /// Drops every pending action.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
