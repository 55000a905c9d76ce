// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory host.
//!
//! [`MemoryHost`] implements [`Host`] over a plain node table and buffers
//! callbacks until [`Host::take_callbacks`]. Besides the programmatic API it
//! offers user-level edits that raise callbacks the way an interactive
//! authoring tool does, including the awkward ones: erase with undo, faces
//! replaced by a twin during a split, faces divided in place, group copies
//! sharing storage with their original, and geometry pasted from another
//! document.

use bem_sketch_model::{Handle, ModelKind, Polygon};
use nalgebra::Vector3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Result, SyncError};
use crate::host::{Host, NodeKind, ObserverScope, RawCallback};
use crate::keys::{NodeId, ObserverKey, ProxyKey};

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    boundary: Option<Polygon>,
    proxy_link: Option<ProxyKey>,
    model_handle: Option<Handle>,
    type_marker: Option<ModelKind>,
    /// Group storage shared with the group it was copied from.
    shared: bool,
}

impl NodeData {
    fn new(kind: NodeKind, parent: Option<NodeId>, boundary: Option<Polygon>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            boundary,
            proxy_link: None,
            model_handle: None,
            type_marker: None,
            shared: false,
        }
    }

    fn copy_attributes_from(&mut self, other: &NodeData) {
        self.proxy_link = other.proxy_link;
        self.model_handle = other.model_handle;
        self.type_marker = other.type_marker;
    }
}

/// An erased subtree kept for undo. Nodes are parent-first.
#[derive(Debug, Clone)]
struct ErasedSubtree {
    container: NodeId,
    nodes: Vec<(NodeId, NodeData)>,
}

/// Callback order when the host replaces a face with a twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapOrder {
    /// The old face's erase callbacks come before the new face's add.
    EraseFirst,
    /// The new face's add comes before the old face's erase callbacks.
    AddFirst,
}

/// A scene graph held in memory.
#[derive(Debug)]
pub struct MemoryHost {
    nodes: FxHashMap<NodeId, NodeData>,
    root: NodeId,
    next_id: u64,
    observers: FxHashMap<NodeId, SmallVec<[(ObserverScope, ObserverKey); 2]>>,
    outbox: Vec<(ObserverKey, RawCallback)>,
    trash: Vec<ErasedSubtree>,
    paint_counts: FxHashMap<NodeId, usize>,
    messages: Vec<String>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Creates a host with an empty document.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = FxHashMap::default();
        nodes.insert(root, NodeData::new(NodeKind::Root, None, None));
        Self {
            nodes,
            root,
            next_id: 1,
            observers: FxHashMap::default(),
            outbox: Vec::new(),
            trash: Vec::new(),
            paint_counts: FxHashMap::default(),
            messages: Vec::new(),
        }
    }

    // --- Internals ---

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        if let Some(parent) = data.parent {
            if let Some(parent_data) = self.nodes.get_mut(&parent) {
                parent_data.children.push(id);
            }
        }
        self.nodes.insert(id, data);
        id
    }

    fn check_container(&self, container: NodeId) -> Result<()> {
        match self.nodes.get(&container) {
            Some(data) if data.kind != NodeKind::Instance => Ok(()),
            Some(_) => Err(SyncError::Host(format!(
                "component instance {container} cannot contain geometry"
            ))),
            None => Err(SyncError::NodeNotFound(container)),
        }
    }

    fn check_face(&self, node: NodeId) -> Result<()> {
        match self.nodes.get(&node) {
            Some(data) if data.kind == NodeKind::Face => Ok(()),
            Some(_) => Err(SyncError::Host(format!("node {node} is not a face"))),
            None => Err(SyncError::NodeNotFound(node)),
        }
    }

    fn emit(&mut self, node: NodeId, scope: ObserverScope, callback: RawCallback) {
        if let Some(list) = self.observers.get(&node) {
            for &(s, key) in list {
                if s == scope {
                    self.outbox.push((key, callback.clone()));
                }
            }
        }
    }

    fn emit_changed(&mut self, node: NodeId) {
        self.emit(node, ObserverScope::Node, RawCallback::Changed { node });
    }

    fn emit_added(&mut self, collection: NodeId, node: NodeId) {
        self.emit(
            collection,
            ObserverScope::Collection,
            RawCallback::ElementAdded { collection, node },
        );
    }

    fn emit_removed(&mut self, collection: NodeId, node: NodeId) {
        self.emit(
            collection,
            ObserverScope::Collection,
            RawCallback::ElementRemoved { collection, node },
        );
    }

    fn emit_model(&mut self, callback: RawCallback) {
        let keys: Vec<ObserverKey> = self
            .observers
            .values()
            .flat_map(|list| list.iter())
            .filter(|(scope, _)| *scope == ObserverScope::Model)
            .map(|(_, key)| *key)
            .collect();
        for key in keys {
            self.outbox.push((key, callback.clone()));
        }
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.get(&current) {
                result.push(current);
                stack.extend(data.children.iter().rev().copied());
            }
        }
        result
    }

    /// Unlinks a subtree from its container, raising erase callbacks for
    /// every node and one removal callback on the container.
    fn take_subtree(&mut self, node: NodeId) -> Option<ErasedSubtree> {
        let container = self.nodes.get(&node)?.parent?;
        let ids = self.subtree(node);

        for &id in &ids {
            self.emit(id, ObserverScope::Node, RawCallback::Erased { node: id });
        }
        self.emit_removed(container, node);

        if let Some(parent) = self.nodes.get_mut(&container) {
            parent.children.retain(|&c| c != node);
        }
        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            self.observers.remove(&id);
            if let Some(data) = self.nodes.remove(&id) {
                nodes.push((id, data));
            }
        }
        Some(ErasedSubtree { container, nodes })
    }

    // --- User edits ---

    /// Draws an empty group, as the user would with a grouping tool.
    pub fn draw_group(&mut self, container: NodeId) -> Result<NodeId> {
        self.add_group(container)
    }

    /// Draws a face from `[x, y, z]` points.
    pub fn draw_face(&mut self, container: NodeId, points: &[[f64; 3]]) -> Result<NodeId> {
        self.add_face(container, &Polygon::from_coords(points))
    }

    /// Places a component instance.
    pub fn draw_instance(&mut self, container: NodeId) -> Result<NodeId> {
        self.add_instance(container)
    }

    /// Erases a node the way the user's delete key does. Undoable.
    pub fn user_erase(&mut self, node: NodeId) -> bool {
        self.erase(node)
    }

    /// Undoes the most recent erase. The restored nodes get new identities
    /// but keep their attributes. Returns the restored top node.
    pub fn undo_erase(&mut self) -> Option<NodeId> {
        let record = self.trash.pop()?;
        if !self.nodes.contains_key(&record.container) {
            return None;
        }

        let mut remap: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut top = None;
        for (old_id, mut data) in record.nodes {
            data.parent = match data.parent.and_then(|p| remap.get(&p).copied()) {
                Some(parent) => Some(parent),
                None => Some(record.container),
            };
            data.children.clear();
            let new_id = self.alloc(data);
            remap.insert(old_id, new_id);
            top.get_or_insert(new_id);
        }

        let top = top?;
        self.emit_added(record.container, top);
        Some(top)
    }

    /// Replaces a face with a twin carrying `points`, as the host does
    /// internally when an edit splits edges of the face. Children move to
    /// the twin. With `carry_link` the twin keeps the face's attributes.
    pub fn swap_face(
        &mut self,
        node: NodeId,
        points: &[[f64; 3]],
        carry_link: bool,
        order: SwapOrder,
    ) -> Result<NodeId> {
        self.check_face(node)?;
        let old = self.nodes[&node].clone();
        let container = old.parent.ok_or(SyncError::InvalidNode(node))?;

        let mut twin = NodeData::new(NodeKind::Face, Some(container), Some(Polygon::from_coords(points)));
        if carry_link {
            twin.copy_attributes_from(&old);
        }
        twin.children = old.children.clone();
        let new_id = self.alloc(twin);
        for child in &old.children {
            if let Some(data) = self.nodes.get_mut(child) {
                data.parent = Some(new_id);
            }
        }
        if let Some(data) = self.nodes.get_mut(&node) {
            data.children.clear();
        }

        if order == SwapOrder::AddFirst {
            self.emit_added(container, new_id);
        }
        self.take_subtree(node);
        if order == SwapOrder::EraseFirst {
            self.emit_added(container, new_id);
        }
        Ok(new_id)
    }

    /// Splits a face in place: `node` shrinks to `keep` and a new face with
    /// the same attributes covers `offcut`. The offcut's add callback comes
    /// before the shrunk face's change callback.
    pub fn divide_face(
        &mut self,
        node: NodeId,
        keep: &[[f64; 3]],
        offcut: &[[f64; 3]],
    ) -> Result<NodeId> {
        self.check_face(node)?;
        let original = self.nodes[&node].clone();
        let container = original.parent.ok_or(SyncError::InvalidNode(node))?;

        if let Some(data) = self.nodes.get_mut(&node) {
            data.boundary = Some(Polygon::from_coords(keep));
        }
        let mut piece = NodeData::new(NodeKind::Face, Some(container), Some(Polygon::from_coords(offcut)));
        piece.copy_attributes_from(&original);
        let piece_id = self.alloc(piece);

        self.emit_added(container, piece_id);
        self.emit_changed(node);
        Ok(piece_id)
    }

    /// Copies a node and its contents into `container`, shifted by
    /// `offset`. Attributes are copied too. Copied groups share storage with
    /// the original until [`Host::make_unique`].
    pub fn copy_paste(&mut self, node: NodeId, container: NodeId, offset: Vector3<f64>) -> Result<NodeId> {
        self.check_container(container)?;
        if !self.nodes.contains_key(&node) {
            return Err(SyncError::NodeNotFound(node));
        }

        let copy = self.copy_into(node, container, &offset);
        self.emit_added(container, copy);
        Ok(copy)
    }

    fn copy_into(&mut self, node: NodeId, container: NodeId, offset: &Vector3<f64>) -> NodeId {
        let source = self.nodes[&node].clone();
        let mut data = NodeData::new(source.kind, Some(container), source.boundary.clone());
        data.copy_attributes_from(&source);
        data.shared = source.kind == NodeKind::Group;
        if let Some(boundary) = data.boundary.as_mut() {
            boundary.translate(offset);
        }
        let id = self.alloc(data);
        for child in source.children {
            self.copy_into(child, id, offset);
        }
        id
    }

    /// Pastes a node from another document: it carries a type marker but no
    /// link into this document.
    pub fn paste_foreign(
        &mut self,
        container: NodeId,
        kind: NodeKind,
        marker: ModelKind,
        points: &[[f64; 3]],
    ) -> Result<NodeId> {
        self.check_container(container)?;
        let boundary = (kind == NodeKind::Face).then(|| Polygon::from_coords(points));
        let mut data = NodeData::new(kind, Some(container), boundary);
        data.type_marker = Some(marker);
        let id = self.alloc(data);
        self.emit_added(container, id);
        Ok(id)
    }

    /// Moves every vertex of a face.
    pub fn move_vertices(&mut self, node: NodeId, offset: Vector3<f64>) -> Result<()> {
        self.check_face(node)?;
        if let Some(boundary) = self.nodes.get_mut(&node).and_then(|d| d.boundary.as_mut()) {
            boundary.translate(&offset);
        }
        self.emit_changed(node);
        Ok(())
    }

    /// Moves a node into another container.
    pub fn move_node(&mut self, node: NodeId, container: NodeId) -> Result<()> {
        self.check_container(container)?;
        let old = self
            .nodes
            .get(&node)
            .and_then(|d| d.parent)
            .ok_or(SyncError::NodeNotFound(node))?;
        if self.subtree(node).contains(&container) {
            return Err(SyncError::Host(format!("cannot move {node} into itself")));
        }

        if let Some(data) = self.nodes.get_mut(&old) {
            data.children.retain(|&c| c != node);
        }
        if let Some(data) = self.nodes.get_mut(&container) {
            data.children.push(node);
        }
        if let Some(data) = self.nodes.get_mut(&node) {
            data.parent = Some(container);
        }

        self.emit_removed(old, node);
        self.emit_added(container, node);
        self.emit_changed(node);
        Ok(())
    }

    pub fn set_north_axis(&mut self, degrees: f64) {
        self.emit_model(RawCallback::SettingsChanged {
            north_axis_degrees: degrees,
        });
    }

    pub fn select(&mut self, nodes: Vec<NodeId>) {
        self.emit_model(RawCallback::SelectionChanged { nodes });
    }

    pub fn save(&mut self) {
        self.emit_model(RawCallback::PreSave);
    }

    pub fn close_document(&mut self) {
        self.emit_model(RawCallback::Close);
    }

    // --- Inspection ---

    /// Number of nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node below `node`, parents first, `node` excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut all = self.subtree(node);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// How often a node was painted.
    pub fn paint_count(&self, node: NodeId) -> usize {
        self.paint_counts.get(&node).copied().unwrap_or(0)
    }

    /// Returns `true` if a copied group still shares storage.
    pub fn is_shared(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|d| d.shared)
    }

    /// Messages shown to the user.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Number of buffered callbacks.
    pub fn pending_callbacks(&self) -> usize {
        self.outbox.len()
    }

    /// Number of observers attached to a node.
    pub fn observer_count(&self, node: NodeId) -> usize {
        self.observers.get(&node).map_or(0, |list| list.len())
    }
}

impl Host for MemoryHost {
    fn root(&self) -> NodeId {
        self.root
    }

    fn is_valid(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn node_kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(&node).map(|d| d.kind)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|d| d.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn boundary(&self, node: NodeId) -> Option<Polygon> {
        self.nodes.get(&node).and_then(|d| d.boundary.clone())
    }

    fn proxy_link(&self, node: NodeId) -> Option<ProxyKey> {
        self.nodes.get(&node).and_then(|d| d.proxy_link)
    }

    fn set_proxy_link(&mut self, node: NodeId, proxy: Option<ProxyKey>) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.proxy_link = proxy;
        }
    }

    fn model_handle(&self, node: NodeId) -> Option<Handle> {
        self.nodes.get(&node).and_then(|d| d.model_handle)
    }

    fn set_model_handle(&mut self, node: NodeId, handle: Option<Handle>) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.model_handle = handle;
        }
    }

    fn type_marker(&self, node: NodeId) -> Option<ModelKind> {
        self.nodes.get(&node).and_then(|d| d.type_marker)
    }

    fn set_type_marker(&mut self, node: NodeId, kind: Option<ModelKind>) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.type_marker = kind;
        }
    }

    fn erase(&mut self, node: NodeId) -> bool {
        if node == self.root {
            return false;
        }
        match self.take_subtree(node) {
            Some(record) => {
                self.trash.push(record);
                true
            }
            None => false,
        }
    }

    fn add_face(&mut self, container: NodeId, boundary: &Polygon) -> Result<NodeId> {
        self.check_container(container)?;
        if boundary.len() < 3 {
            return Err(SyncError::Host(format!(
                "a face needs at least 3 points, got {}",
                boundary.len()
            )));
        }
        let id = self.alloc(NodeData::new(NodeKind::Face, Some(container), Some(boundary.clone())));
        self.emit_added(container, id);
        Ok(id)
    }

    fn add_group(&mut self, container: NodeId) -> Result<NodeId> {
        self.check_container(container)?;
        let id = self.alloc(NodeData::new(NodeKind::Group, Some(container), None));
        self.emit_added(container, id);
        Ok(id)
    }

    fn add_instance(&mut self, container: NodeId) -> Result<NodeId> {
        self.check_container(container)?;
        let id = self.alloc(NodeData::new(NodeKind::Instance, Some(container), None));
        self.emit_added(container, id);
        Ok(id)
    }

    fn set_boundary(&mut self, node: NodeId, boundary: &Polygon) -> Result<()> {
        self.check_face(node)?;
        if let Some(data) = self.nodes.get_mut(&node) {
            data.boundary = Some(boundary.clone());
        }
        self.emit_changed(node);
        Ok(())
    }

    fn make_unique(&mut self, node: NodeId) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.shared = false;
        }
    }

    fn paint(&mut self, node: NodeId, _kind: ModelKind) {
        if !self.nodes.contains_key(&node) {
            return;
        }
        *self.paint_counts.entry(node).or_insert(0) += 1;
        self.emit_changed(node);
    }

    fn add_observer(&mut self, node: NodeId, scope: ObserverScope, observer: ObserverKey) {
        if !self.nodes.contains_key(&node) {
            return;
        }
        let list = self.observers.entry(node).or_default();
        if !list.contains(&(scope, observer)) {
            list.push((scope, observer));
        }
    }

    fn remove_observer(&mut self, node: NodeId, scope: ObserverScope, observer: ObserverKey) {
        if let Some(list) = self.observers.get_mut(&node) {
            list.retain(|entry| *entry != (scope, observer));
        }
    }

    fn show_message(&mut self, message: &str) {
        tracing::info!(message, "host message");
        self.messages.push(message.to_string());
    }

    fn take_callbacks(&mut self) -> Vec<(ObserverKey, RawCallback)> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    const SQUARE: [[f64; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];

    fn observer(n: u64) -> ObserverKey {
        ObserverKey::from(KeyData::from_ffi(n))
    }

    #[test]
    fn additions_reach_collection_observers() {
        let mut host = MemoryHost::new();
        let root = host.root();
        host.add_observer(root, ObserverScope::Collection, observer(1));

        let group = host.draw_group(root).unwrap();
        let callbacks = host.take_callbacks();

        assert_eq!(
            callbacks,
            vec![(
                observer(1),
                RawCallback::ElementAdded {
                    collection: root,
                    node: group
                }
            )]
        );
        assert_eq!(host.pending_callbacks(), 0);
    }

    #[test]
    fn erase_then_undo_restores_attributes_under_new_ids() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let group = host.draw_group(root).unwrap();
        let face = host.draw_face(group, &SQUARE).unwrap();
        let handle = Handle::new();
        host.set_model_handle(face, Some(handle));

        assert!(host.user_erase(group));
        assert!(!host.is_valid(face));

        let restored = host.undo_erase().unwrap();
        assert_ne!(restored, group);
        let children = host.children(restored);
        assert_eq!(children.len(), 1);
        assert_eq!(host.model_handle(children[0]), Some(handle));
    }

    #[test]
    fn swap_moves_children_and_raises_callbacks_in_order() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let group = host.draw_group(root).unwrap();
        let wall = host.draw_face(group, &SQUARE).unwrap();
        let window = host.draw_face(wall, &SQUARE).unwrap();
        host.add_observer(wall, ObserverScope::Node, observer(1));
        host.add_observer(group, ObserverScope::Collection, observer(2));

        let twin = host
            .swap_face(wall, &SQUARE, false, SwapOrder::EraseFirst)
            .unwrap();
        let callbacks = host.take_callbacks();

        assert!(!host.is_valid(wall));
        assert_eq!(host.parent(window), Some(twin));
        assert!(matches!(callbacks[0].1, RawCallback::Erased { node } if node == wall));
        assert!(matches!(callbacks[1].1, RawCallback::ElementRemoved { .. }));
        assert!(matches!(callbacks[2].1, RawCallback::ElementAdded { node, .. } if node == twin));
    }

    #[test]
    fn copied_groups_share_storage_until_made_unique() {
        let mut host = MemoryHost::new();
        let root = host.root();
        let group = host.draw_group(root).unwrap();
        host.draw_face(group, &SQUARE).unwrap();

        let copy = host
            .copy_paste(group, root, Vector3::new(5.0, 0.0, 0.0))
            .unwrap();
        assert!(host.is_shared(copy));
        let face = host.children(copy)[0];
        assert_eq!(host.boundary(face).unwrap().points[0].x, 5.0);

        host.make_unique(copy);
        assert!(!host.is_shared(copy));
    }

    #[test]
    fn faces_need_three_points() {
        let mut host = MemoryHost::new();
        let root = host.root();
        assert!(host.draw_face(root, &SQUARE[..2]).is_err());
    }
}
