// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Post-drain consistency checks.
//!
//! Callbacks can be lost or arrive in an order the handlers do not expect.
//! After each drain the links between proxies, the node table and the node
//! attributes are checked and repaired, and tracked containers are scanned
//! for marked nodes nobody adopted.

use rustc_hash::FxHashSet;

use crate::host::Host;
use crate::keys::{NodeId, ProxyKey};
use crate::manager::ModelManager;
use crate::queue::Command;

/// What a consistency pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Proxies moved onto a replacement node.
    pub repaired: usize,
    /// Proxies erased because their node is gone for good.
    pub discarded: usize,
    /// Table entries or node links rewritten.
    pub relinked: usize,
    /// Untracked marked nodes queued for adoption.
    pub adopted: usize,
    /// Stale table entries and stray links removed.
    pub cleared: usize,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(&mut self, other: &ConsistencyReport) {
        self.repaired += other.repaired;
        self.discarded += other.discarded;
        self.relinked += other.relinked;
        self.adopted += other.adopted;
        self.cleared += other.cleared;
    }
}

impl<H: Host> ModelManager<H> {
    /// Full check: links, then a scan for untracked nodes if configured.
    pub fn verify_consistency(&mut self) -> ConsistencyReport {
        let mut report = self.verify_links();
        if self.config.scan_for_untracked {
            report.merge(&self.scan_untracked());
        }
        if !report.is_clean() {
            tracing::warn!(?report, "model and scene were out of sync");
        }
        report
    }

    /// Checks every live proxy against its node and the node table.
    pub fn verify_links(&mut self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();
        let live: Vec<ProxyKey> = self.live_proxies().map(|(k, _)| k).collect();
        let mut claimed: FxHashSet<NodeId> = FxHashSet::default();

        for key in live {
            // An earlier erase in this pass may have taken it down.
            let Some(node) = self.proxies.get(key).filter(|p| p.is_live()).and_then(|p| p.node) else {
                continue;
            };

            if !self.host.is_valid(node) {
                let successor = self.find_successor(key);
                let repaired = match successor {
                    Some(successor) => match self.relink(key, successor) {
                        Ok(()) => claimed.insert(successor),
                        Err(error) => {
                            tracing::error!(proxy = ?key, %error, "swap repair failed");
                            false
                        }
                    },
                    None => false,
                };
                if repaired {
                    report.repaired += 1;
                } else {
                    tracing::error!(proxy = ?key, node = %node, "node vanished without notice");
                    if let Err(error) = self.on_erase_node(key) {
                        tracing::error!(proxy = ?key, %error, "erase failed");
                    }
                    report.discarded += 1;
                }
                continue;
            }

            if !claimed.insert(node) {
                tracing::error!(proxy = ?key, node = %node, "node claimed by two proxies");
                if self.table.get(&node) == Some(&key) {
                    self.table.remove(&node);
                }
                if let Some(proxy) = self.proxies.get_mut(key) {
                    proxy.node = None;
                }
                if let Err(error) = self.on_erase_node(key) {
                    tracing::error!(proxy = ?key, %error, "erase failed");
                }
                report.discarded += 1;
                continue;
            }

            let table_ok = self.table.get(&node) == Some(&key);
            let link_ok = self.host.proxy_link(node) == Some(key);
            if !table_ok || !link_ok {
                self.link_node(key, node);
                report.relinked += 1;
            }
        }

        let stale: Vec<NodeId> = self
            .table
            .iter()
            .filter(|(n, k)| !self.host.is_valid(**n) || self.proxies.get(**k).and_then(|p| p.node) != Some(**n))
            .map(|(n, _)| *n)
            .collect();
        for node in stale {
            self.table.remove(&node);
            report.cleared += 1;
        }

        report
    }

    /// Walks the tracked containers and queues adoption of marked nodes
    /// that have no live proxy. Links on unmarked untracked nodes are
    /// cleared.
    pub fn scan_untracked(&mut self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();
        let root = self.host.root();
        let mut stack: Vec<(Option<ProxyKey>, NodeId)> = vec![(None, root)];

        while let Some((container, container_node)) = stack.pop() {
            for child in self.host.children(container_node) {
                if let Some(key) = self.proxy_for_node(child) {
                    let is_container = !self.proxies[key].kind.allowed_children().is_empty();
                    if is_container {
                        stack.push((Some(key), child));
                    }
                    continue;
                }

                let marked = self.host.type_marker(child).is_some();
                let queued = self.queue.contains(|c| {
                    matches!(c, Command::ElementAdded { node, .. } if *node == child)
                });
                if marked && !queued {
                    tracing::debug!(node = %child, "untracked marked node queued for adoption");
                    self.queue.enqueue(Command::ElementAdded { container, node: child });
                    report.adopted += 1;
                } else if !marked && self.host.proxy_link(child).is_some() {
                    self.host.set_proxy_link(child, None);
                    report.cleared += 1;
                }
            }
        }

        report
    }

    /// Read-only check: every live proxy's node is valid, in the table under
    /// that proxy and links back to it, and every table entry names a live
    /// proxy on that node.
    pub fn is_consistent(&self) -> bool {
        let proxies_ok = self.live_proxies().all(|(key, proxy)| {
            proxy.node.is_some_and(|node| {
                self.host.is_valid(node)
                    && self.table.get(&node) == Some(&key)
                    && self.host.proxy_link(node) == Some(key)
            })
        });
        let table_ok = self.table.iter().all(|(&node, &key)| {
            self.proxies
                .get(key)
                .is_some_and(|p| p.is_live() && p.node == Some(node))
        });
        proxies_ok && table_ok
    }
}
