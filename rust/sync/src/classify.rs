// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification and adoption of nodes added to tracked containers.
//!
//! The host reports a single "element added" for several different edits:
//! a brand-new node, a node restored by undo, a copy of an existing node, a
//! face divided in place, a face replaced by a twin, or just a repeat of an
//! earlier notification. [`ModelManager::disambiguate`] tells them apart;
//! the kind of a new node is resolved once by [`classify`] and carried as a
//! tag from then on.

use bem_sketch_model::ModelKind;

use crate::error::{Result, SyncError};
use crate::host::{Host, NodeKind};
use crate::keys::{NodeId, ProxyKey};
use crate::manager::ModelManager;

/// Resolves the model kind of a node from its type marker, or from the
/// host class and the container kind when unmarked.
///
/// Returns `None` when no kind fits. The result is not checked against the
/// container's allowed children; see [`ModelKind::allowed_under`].
pub fn classify(
    container: Option<ModelKind>,
    node: NodeKind,
    marker: Option<ModelKind>,
) -> Option<ModelKind> {
    if let Some(kind) = marker {
        return (NodeKind::for_model(kind) == node).then_some(kind);
    }

    match (container, node) {
        (None, NodeKind::Group) => Some(ModelKind::Space),
        (Some(ModelKind::Space), NodeKind::Face) => Some(ModelKind::Surface),
        (Some(ModelKind::Space), NodeKind::Group) => Some(ModelKind::ShadingSurfaceGroup),
        (Some(ModelKind::Surface), NodeKind::Face) => Some(ModelKind::SubSurface),
        (Some(ModelKind::ShadingSurfaceGroup), NodeKind::Face) => Some(ModelKind::ShadingSurface),
        (Some(ModelKind::InteriorPartitionSurfaceGroup), NodeKind::Face) => {
            Some(ModelKind::InteriorPartitionSurface)
        }
        _ => None,
    }
}

/// What an "element added" notification turned out to mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddedNode {
    /// Not linked to anything: adopt it.
    New,
    /// Already tracked by this proxy: only refresh it.
    Duplicate(ProxyKey),
    /// Replaces the vanished node of this proxy.
    Swap(ProxyKey),
    /// Restores the node of this erased proxy (undo, cut and paste).
    Undelete(ProxyKey),
    /// Split off this proxy's face, which shrank.
    Divide(ProxyKey),
    /// Copied from this proxy's node.
    Copy(ProxyKey),
}

impl<H: Host> ModelManager<H> {
    /// Decides what an added node is.
    pub fn disambiguate(&self, container: Option<ProxyKey>, node: NodeId) -> AddedNode {
        if let Some(&owner) = self.table.get(&node) {
            if self.is_live(owner) {
                return AddedNode::Duplicate(owner);
            }
        }

        let linked = self
            .host
            .proxy_link(node)
            .filter(|&k| self.proxies.contains_key(k))
            .or_else(|| {
                self.host
                    .model_handle(node)
                    .and_then(|h| self.erased_proxy_for(h))
            });

        let Some(key) = linked else {
            return match self.find_predecessor(container, node) {
                Some(predecessor) => AddedNode::Swap(predecessor),
                None => AddedNode::New,
            };
        };

        let proxy = &self.proxies[key];
        if proxy.is_erased() {
            return AddedNode::Undelete(key);
        }
        if !proxy.is_live() {
            return AddedNode::New;
        }

        match proxy.node {
            Some(n) if n == node => AddedNode::Duplicate(key),
            Some(n) if self.host.is_valid(n) => {
                let shrunk =
                    self.host.area(n) < proxy.last_area - self.config.area_tolerance;
                if proxy.kind.is_planar() && proxy.parent == container && shrunk {
                    AddedNode::Divide(key)
                } else {
                    AddedNode::Copy(key)
                }
            }
            _ => AddedNode::Swap(key),
        }
    }

    fn erased_proxy_for(&self, handle: bem_sketch_model::Handle) -> Option<ProxyKey> {
        self.proxies
            .iter()
            .find(|(_, p)| p.is_erased() && p.handle == handle)
            .map(|(k, _)| k)
    }

    /// Handles a node added to a tracked container.
    pub(crate) fn on_element_added(&mut self, container: Option<ProxyKey>, node: NodeId) -> Result<()> {
        if !self.host.is_valid(node) {
            tracing::trace!(node = %node, "added node already gone");
            return Ok(());
        }
        if let Some(c) = container {
            if !self.is_live(c) {
                return Ok(());
            }
        }

        let added = self.disambiguate(container, node);
        tracing::debug!(node = %node, ?added, "element added");

        match added {
            AddedNode::New => self.adopt_new(container, node),
            AddedNode::Duplicate(key) => self.on_change_node(key),
            AddedNode::Swap(key) => self.relink(key, node),
            AddedNode::Undelete(key) => match self.on_undelete_node(key, node) {
                Err(SyncError::Disallowed { kind, .. }) => {
                    self.reject_disallowed(container, node, kind);
                    Ok(())
                }
                other => other,
            },
            AddedNode::Divide(key) => {
                self.adopt_clone(key, container, node)?;
                self.on_change_node(key)
            }
            AddedNode::Copy(key) => self.adopt_clone(key, container, node).map(|_| ()),
        }
    }

    fn adopt_new(&mut self, container: Option<ProxyKey>, node: NodeId) -> Result<()> {
        let container_kind = self.container_kind(container);
        let node_kind = self.host.node_kind(node).ok_or(SyncError::InvalidNode(node))?;
        let marker = self.host.type_marker(node);

        let Some(kind) = classify(container_kind, node_kind, marker) else {
            if container.is_none() && marker.is_none() {
                tracing::debug!(node = %node, "loose geometry at the root ignored");
                return Ok(());
            }
            self.reject(
                container,
                node,
                &format!("cannot determine what this {node_kind:?} is in {}", label(container_kind)),
            );
            return Ok(());
        };

        if !ModelKind::allowed_under(container_kind, kind) {
            self.reject_disallowed(container, node, kind);
            return Ok(());
        }
        if !self.valid_node(kind, node) {
            self.leave_unadopted(node);
            return Ok(());
        }

        self.attach_new(kind, node, container).map(|_| ())
    }

    /// Creates a model object and a proxy for an untracked node.
    pub(crate) fn attach_new(
        &mut self,
        kind: ModelKind,
        node: NodeId,
        container: Option<ProxyKey>,
    ) -> Result<ProxyKey> {
        if !self.valid_node(kind, node) {
            return Err(SyncError::InvalidGeometry(node));
        }
        let parent_object = self.object_of(container);
        if container.is_some() && parent_object.is_none() {
            return Err(SyncError::ParentNotTracked(node));
        }
        let object = self.model.create(kind, parent_object)?;
        let key = self.create_proxy(kind, node, container, object, true)?;
        self.on_change_node(key)?;
        self.adopt_children(key);
        Ok(key)
    }

    /// Adopts a copy or an offcut of `source`'s node with a clone of its
    /// model object. `None` if the node was rejected.
    fn adopt_clone(
        &mut self,
        source: ProxyKey,
        container: Option<ProxyKey>,
        node: NodeId,
    ) -> Result<Option<ProxyKey>> {
        let kind = self.proxies[source].kind;
        let source_object = self.proxies[source].object;
        let container_kind = self.container_kind(container);

        if !ModelKind::allowed_under(container_kind, kind) {
            self.reject_disallowed(container, node, kind);
            return Ok(None);
        }
        if !self.valid_node(kind, node) {
            self.leave_unadopted(node);
            return Ok(None);
        }

        // Copied groups may share storage with the original until touched.
        if self.host.node_kind(node) == Some(NodeKind::Group) {
            self.host.make_unique(node);
        }

        let parent_object = self.object_of(container);
        let object = match source_object.filter(|&o| self.model.contains(o)) {
            Some(source_object) => self.model.clone_object(source_object, parent_object)?,
            None => self.model.create(kind, parent_object)?,
        };
        let key = self.create_proxy(kind, node, container, object, true)?;
        self.on_change_node(key)?;
        self.adopt_children(key);
        Ok(Some(key))
    }

    /// Refuses a node: strips its links, erases it from the host and tells
    /// the user.
    pub(crate) fn reject(&mut self, container: Option<ProxyKey>, node: NodeId, reason: &str) {
        tracing::warn!(node = %node, reason, "node rejected");

        self.host.set_proxy_link(node, None);
        self.host.set_model_handle(node, None);
        self.host.set_type_marker(node, None);

        let suppressed: Vec<_> = self.collection_observer_of(container).into_iter().collect();
        self.with_suppressed(&suppressed, |manager| manager.host.erase(node));

        let message = format!("Removed an object that cannot be drawn here: {reason}.");
        self.errors.add_error(message.clone());
        self.host.show_message(&message);
    }

    /// Rejects a node whose kind the container cannot hold.
    pub(crate) fn reject_disallowed(&mut self, container: Option<ProxyKey>, node: NodeId, kind: ModelKind) {
        let reason = format!(
            "{} cannot be placed in {}",
            kind.display_name(),
            label(self.container_kind(container))
        );
        self.reject(container, node, &reason);
    }

    /// Leaves a node without usable geometry in the scene but strips its
    /// links, so later scans do not pick it up again.
    fn leave_unadopted(&mut self, node: NodeId) {
        tracing::debug!(node = %node, "node without usable geometry left unadopted");
        self.host.set_proxy_link(node, None);
        self.host.set_model_handle(node, None);
        self.host.set_type_marker(node, None);
    }

    /// Adopts an untracked node on behalf of a caller outside the engine.
    pub fn adopt(&mut self, node: NodeId) -> Result<ProxyKey> {
        if !self.host.is_valid(node) {
            return Err(SyncError::InvalidNode(node));
        }
        if let Some(&proxy) = self.table.get(&node) {
            if self.is_live(proxy) {
                return Err(SyncError::AlreadyTracked { node, proxy });
            }
        }

        let container_node = self.host.parent(node).ok_or(SyncError::InvalidNode(node))?;
        let container = self
            .container_proxy(container_node)
            .ok_or(SyncError::ParentNotTracked(node))?;
        let container_kind = self.container_kind(container);
        let node_kind = self.host.node_kind(node).ok_or(SyncError::NodeNotFound(node))?;

        let kind = classify(container_kind, node_kind, self.host.type_marker(node))
            .ok_or(SyncError::NotClassifiable { node })?;
        if !ModelKind::allowed_under(container_kind, kind) {
            return Err(SyncError::Disallowed {
                kind,
                container: container_kind,
            });
        }

        self.attach_new(kind, node, container)
    }
}

fn label(container: Option<ModelKind>) -> &'static str {
    container.map_or("the model root", |kind| kind.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarked_nodes_follow_their_container() {
        assert_eq!(classify(None, NodeKind::Group, None), Some(ModelKind::Space));
        assert_eq!(
            classify(Some(ModelKind::Space), NodeKind::Face, None),
            Some(ModelKind::Surface)
        );
        assert_eq!(
            classify(Some(ModelKind::Surface), NodeKind::Face, None),
            Some(ModelKind::SubSurface)
        );
        assert_eq!(
            classify(Some(ModelKind::ShadingSurfaceGroup), NodeKind::Face, None),
            Some(ModelKind::ShadingSurface)
        );
        assert_eq!(classify(None, NodeKind::Face, None), None);
        assert_eq!(classify(Some(ModelKind::Space), NodeKind::Instance, None), None);
    }

    #[test]
    fn marker_wins_when_shape_matches() {
        assert_eq!(
            classify(
                Some(ModelKind::Space),
                NodeKind::Face,
                Some(ModelKind::ShadingSurface)
            ),
            Some(ModelKind::ShadingSurface)
        );
        assert_eq!(
            classify(
                Some(ModelKind::Space),
                NodeKind::Instance,
                Some(ModelKind::Luminaire)
            ),
            Some(ModelKind::Luminaire)
        );
        assert_eq!(
            classify(None, NodeKind::Face, Some(ModelKind::Space)),
            None
        );
    }
}
