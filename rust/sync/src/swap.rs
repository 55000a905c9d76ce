// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity swap detection.
//!
//! Some host edits destroy a face and create a twin with the same geometry,
//! reporting only an erase for the old face. The twin's boundary is a
//! superset of the old one: the edit may have added vertices on its edges.
//! When a tracked face goes away, its last known container is searched for
//! such a twin and the proxy moves onto it with its model object intact.
//!
//! The same test runs from the other side when an untracked face is added
//! next to a proxy whose face is already gone, so the repair does not depend
//! on which callback the host delivers first.
//!
//! When several siblings qualify the first one in host enumeration order
//! wins. Whether that order is stable across host versions is unknown.

use crate::error::Result;
use crate::host::{Host, NodeKind, ObserverScope};
use crate::interface::ProxyState;
use crate::keys::{NodeId, ProxyKey};
use crate::manager::ModelManager;

impl<H: Host> ModelManager<H> {
    /// Looks for the node that replaced a proxy's vanished node.
    pub fn find_successor(&self, key: ProxyKey) -> Option<NodeId> {
        let proxy = self.proxies.get(key).filter(|p| p.is_live())?;
        if !proxy.kind.requires_swap_check() {
            return None;
        }
        let container = proxy.last_container.filter(|&c| self.host.is_valid(c))?;
        let last = proxy.last_boundary.as_ref()?;

        let candidates: Vec<NodeId> = self
            .host
            .children(container)
            .into_iter()
            .filter(|&n| Some(n) != proxy.node)
            .filter(|&n| self.host.node_kind(n) == Some(NodeKind::Face))
            .filter(|&n| self.is_swap_candidate(n, key))
            .filter(|&n| {
                self.host
                    .boundary(n)
                    .is_some_and(|b| b.contains_points_of(last, self.config.swap_tolerance))
            })
            .collect();

        if candidates.len() > 1 {
            tracing::warn!(
                proxy = ?key,
                candidates = candidates.len(),
                "several swap candidates, taking the first"
            );
        }
        candidates.first().copied()
    }

    /// A node can take over a proxy if no other live proxy owns it.
    fn is_swap_candidate(&self, node: NodeId, key: ProxyKey) -> bool {
        if let Some(&owner) = self.table.get(&node) {
            if owner != key && self.is_live(owner) {
                return false;
            }
        }
        match self.host.proxy_link(node) {
            None => true,
            Some(link) if link == key => true,
            Some(link) => !self.is_live(link),
        }
    }

    /// Looks for a live proxy, in the container a node was just added to,
    /// whose own node vanished and whose last boundary the new node covers.
    pub fn find_predecessor(&self, container: Option<ProxyKey>, node: NodeId) -> Option<ProxyKey> {
        if self.host.node_kind(node) != Some(NodeKind::Face) {
            return None;
        }
        let boundary = self.host.boundary(node)?;
        let container_node = match container {
            Some(c) => self.proxies.get(c)?.node?,
            None => self.host.root(),
        };

        let candidates: Vec<ProxyKey> = self
            .proxies
            .iter()
            .filter(|(_, p)| p.is_live() && p.kind.requires_swap_check())
            .filter(|(_, p)| p.last_container == Some(container_node))
            .filter(|(_, p)| p.node.map_or(true, |n| !self.host.is_valid(n)))
            .filter(|(_, p)| {
                p.last_boundary
                    .as_ref()
                    .is_some_and(|last| boundary.contains_points_of(last, self.config.swap_tolerance))
            })
            .map(|(k, _)| k)
            .collect();

        if candidates.len() > 1 {
            tracing::warn!(
                node = %node,
                candidates = candidates.len(),
                "several proxies match the added node, taking the first"
            );
        }
        candidates.first().copied()
    }

    /// Moves a proxy onto its replacement node and refreshes the model
    /// object from it. The model object is kept.
    pub fn relink(&mut self, key: ProxyKey, successor: NodeId) -> Result<()> {
        let Some(proxy) = self.proxies.get_mut(key).filter(|p| p.is_live()) else {
            return Ok(());
        };
        proxy.state = ProxyState::Swapped;
        let old = proxy.node;
        let observers = [
            (proxy.observer, ObserverScope::Node),
            (proxy.collection_observer, ObserverScope::Collection),
        ];

        if let Some(old) = old {
            if self.table.get(&old) == Some(&key) {
                self.table.remove(&old);
            }
        }
        for (observer, scope) in observers {
            let Some(observer) = observer else { continue };
            if let Some(old) = old {
                self.host.remove_observer(old, scope, observer);
            }
            self.observers.retarget(observer, successor);
            self.host.add_observer(successor, scope, observer);
        }

        self.link_node(key, successor);

        // Openings moved to the twin with the face.
        for child in self.proxies[key].children.clone() {
            let moved = self
                .proxies
                .get(child)
                .and_then(|p| p.node)
                .is_some_and(|n| self.host.parent(n) == Some(successor));
            if let Some(proxy) = self.proxies.get_mut(child).filter(|_| moved) {
                proxy.last_container = Some(successor);
            }
        }

        self.on_change_node(key)?;
        self.adopt_children(key);

        tracing::debug!(
            proxy = ?key,
            old = ?old,
            new = %successor,
            "identity swap repaired"
        );
        Ok(())
    }

    /// A tracked node was reported gone: repair a swap if there is a
    /// successor, erase otherwise. Stale reports are ignored.
    pub(crate) fn on_node_gone(&mut self, key: ProxyKey, node: NodeId) -> Result<()> {
        let Some(proxy) = self.proxies.get(key).filter(|p| p.is_live()) else {
            return Ok(());
        };
        if proxy.node != Some(node) || self.host.is_valid(node) {
            tracing::trace!(proxy = ?key, node = %node, "stale erase ignored");
            return Ok(());
        }

        match self.find_successor(key) {
            Some(successor) => self.relink(key, successor),
            None => self.on_erase_node(key),
        }
    }
}
