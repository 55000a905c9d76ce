// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drawing interfaces: the proxies bridging host nodes and model objects.
//!
//! A [`DrawingInterface`] holds a lookup-only reference to its node and owns
//! the model object it created. The node points back through the host's
//! proxy-link attribute. The lifecycle operations live on
//! [`ModelManager`] because every one of them touches the shared node table,
//! the observers and the model.

use bem_sketch_model::{Handle, ModelKind, ObjectKey, Polygon};

use crate::error::{Result, SyncError};
use crate::host::{Host, NodeKind, ObserverScope};
use crate::keys::{NodeId, ObserverKey, ProxyKey};
use crate::manager::ModelManager;
use crate::observer::ObserverTarget;
use crate::queue::Command;

/// Lifecycle state of a drawing interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Created, not yet linked to a node.
    Unattached,
    /// Linked to a valid node.
    Attached,
    /// Being moved to a replacement node. Only seen inside a swap repair.
    Swapped,
    /// Node and model object released. Kept so an undo can bring it back.
    Erased,
}

/// Proxy for one host node.
#[derive(Debug, Clone)]
pub struct DrawingInterface {
    pub(crate) kind: ModelKind,
    pub(crate) state: ProxyState,
    pub(crate) node: Option<NodeId>,
    pub(crate) object: Option<ObjectKey>,
    pub(crate) handle: Handle,
    pub(crate) parent: Option<ProxyKey>,
    pub(crate) children: Vec<ProxyKey>,
    pub(crate) observer: Option<ObserverKey>,
    pub(crate) collection_observer: Option<ObserverKey>,
    pub(crate) last_container: Option<NodeId>,
    pub(crate) last_boundary: Option<Polygon>,
    pub(crate) last_area: f64,
    pub(crate) paint_requested: bool,
}

impl DrawingInterface {
    fn new(kind: ModelKind, handle: Handle) -> Self {
        Self {
            kind,
            state: ProxyState::Unattached,
            node: None,
            object: None,
            handle,
            parent: None,
            children: Vec::new(),
            observer: None,
            collection_observer: None,
            last_container: None,
            last_boundary: None,
            last_area: 0.0,
            paint_requested: false,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn state(&self) -> ProxyState {
        self.state
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn object(&self) -> Option<ObjectKey> {
        self.object
    }

    /// Handle of the model object, kept after erase for undelete.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn parent(&self) -> Option<ProxyKey> {
        self.parent
    }

    pub fn children(&self) -> &[ProxyKey] {
        &self.children
    }

    pub fn observer(&self) -> Option<ObserverKey> {
        self.observer
    }

    pub fn collection_observer(&self) -> Option<ObserverKey> {
        self.collection_observer
    }

    pub fn last_boundary(&self) -> Option<&Polygon> {
        self.last_boundary.as_ref()
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, ProxyState::Attached | ProxyState::Swapped)
    }

    pub fn is_erased(&self) -> bool {
        self.state == ProxyState::Erased
    }

    fn observers(&self) -> impl Iterator<Item = ObserverKey> {
        self.observer.into_iter().chain(self.collection_observer)
    }
}

impl<H: Host> ModelManager<H> {
    // --- Proxy construction ---

    /// Creates a proxy for `object` on `node` and links both ways.
    pub(crate) fn create_proxy(
        &mut self,
        kind: ModelKind,
        node: NodeId,
        parent: Option<ProxyKey>,
        object: ObjectKey,
        arm: bool,
    ) -> Result<ProxyKey> {
        let handle = self
            .model
            .handle_of(object)
            .ok_or(bem_sketch_model::Error::ObjectNotFound(object))?;

        let mut proxy = DrawingInterface::new(kind, handle);
        proxy.object = Some(object);
        proxy.parent = parent;
        let key = self.proxies.insert(proxy);

        if let Some(parent) = parent.and_then(|p| self.proxies.get_mut(p)) {
            parent.children.push(key);
        }
        self.by_object.insert(handle, key);
        self.install_observers(key, node, arm);
        self.link_node(key, node);

        tracing::debug!(proxy = ?key, node = %node, %kind, %handle, "drawing interface created");
        Ok(key)
    }

    /// Creates the node observer and, for containers, the collection
    /// observer of a proxy.
    pub(crate) fn install_observers(&mut self, key: ProxyKey, node: NodeId, arm: bool) {
        let Some(kind) = self.proxies.get(key).map(|p| p.kind) else {
            return;
        };

        let observer = self
            .observers
            .create(ObserverTarget::Node(key), node, ObserverScope::Node);
        self.host.add_observer(node, ObserverScope::Node, observer);

        let collection = (!kind.allowed_children().is_empty()).then(|| {
            let collection = self.observers.create(
                ObserverTarget::Collection(Some(key)),
                node,
                ObserverScope::Collection,
            );
            self.host
                .add_observer(node, ObserverScope::Collection, collection);
            collection
        });

        if arm {
            self.observers.enable(observer);
            if let Some(collection) = collection {
                self.observers.enable(collection);
            }
        }

        if let Some(proxy) = self.proxies.get_mut(key) {
            proxy.observer = Some(observer);
            proxy.collection_observer = collection;
        }
    }

    fn destroy_observers(&mut self, key: ProxyKey) {
        let Some(proxy) = self.proxies.get_mut(key) else {
            return;
        };
        let observers: Vec<ObserverKey> = proxy.observers().collect();
        proxy.observer = None;
        proxy.collection_observer = None;

        for observer in observers {
            if let Some((node, scope)) = self.observers.destroy(observer) {
                self.host.remove_observer(node, scope, observer);
            }
        }
    }

    /// Points a proxy at a node and writes the node's attributes.
    pub(crate) fn link_node(&mut self, key: ProxyKey, node: NodeId) {
        let Some(proxy) = self.proxies.get_mut(key) else {
            return;
        };
        proxy.node = Some(node);
        proxy.state = ProxyState::Attached;
        proxy.last_container = self.host.parent(node);

        self.table.insert(node, key);
        self.host.set_proxy_link(node, Some(key));
        self.host.set_model_handle(node, Some(proxy.handle));
        self.host.set_type_marker(node, Some(proxy.kind));
    }

    /// Queues adoption of nodes already inside a newly tracked container.
    pub(crate) fn adopt_children(&mut self, key: ProxyKey) {
        let Some(node) = self.proxies.get(key).and_then(|p| p.node) else {
            return;
        };
        for child in self.host.children(node) {
            if !self.table.contains_key(&child) {
                self.queue.enqueue(Command::ElementAdded {
                    container: Some(key),
                    node: child,
                });
            }
        }
    }

    // --- Predicates ---

    /// Returns `true` if the proxy's node exists and has usable geometry.
    pub fn valid_entity(&self, key: ProxyKey) -> bool {
        self.proxies
            .get(key)
            .and_then(|p| p.node.map(|node| (p.kind, node)))
            .is_some_and(|(kind, node)| self.valid_node(kind, node))
    }

    /// Returns `true` if `node` exists and could carry a `kind` object:
    /// planar kinds need at least 3 vertices and a non-zero area.
    pub(crate) fn valid_node(&self, kind: ModelKind, node: NodeId) -> bool {
        if !self.host.is_valid(node) {
            return false;
        }
        !kind.is_planar() || self.host.boundary(node).is_some_and(|b| b.is_valid())
    }

    /// The host container currently holding the proxy's node.
    pub fn containing_node(&self, key: ProxyKey) -> Option<NodeId> {
        let node = self.proxies.get(key)?.node?;
        self.host.parent(node)
    }

    /// The proxy of a container node: `Some(None)` for the document root,
    /// `None` if the container is not tracked.
    pub(crate) fn container_proxy(&self, container: NodeId) -> Option<Option<ProxyKey>> {
        if container == self.host.root() {
            return Some(None);
        }
        self.table
            .get(&container)
            .copied()
            .filter(|&k| self.is_live(k))
            .map(Some)
    }

    pub(crate) fn container_kind(&self, container: Option<ProxyKey>) -> Option<ModelKind> {
        container.and_then(|c| self.proxies.get(c)).map(|p| p.kind)
    }

    pub(crate) fn object_of(&self, proxy: Option<ProxyKey>) -> Option<ObjectKey> {
        proxy.and_then(|p| self.proxies.get(p)).and_then(|p| p.object)
    }

    // --- Lifecycle ---

    /// Re-derives the model object from the node: parent from the node's
    /// container, vertices from its boundary. No-op if the node is gone.
    pub fn on_change_node(&mut self, key: ProxyKey) -> Result<()> {
        let Some(proxy) = self.proxies.get(key).filter(|p| p.is_live()) else {
            return Ok(());
        };
        let (kind, object) = (proxy.kind, proxy.object);
        let Some(node) = proxy.node.filter(|&n| self.host.is_valid(n)) else {
            tracing::trace!(proxy = ?key, "change on invalid node ignored");
            return Ok(());
        };
        let Some(object) = object.filter(|&o| self.model.contains(o)) else {
            return Ok(());
        };

        let container = self.host.parent(node);
        if container != proxy.last_container && !self.reparent(key, node, container)? {
            return Ok(());
        }

        if kind.is_planar() {
            match self.host.boundary(node).filter(|b| b.is_valid()) {
                Some(boundary) => {
                    self.model.set_polygon(object, boundary.clone())?;
                    if let Some(proxy) = self.proxies.get_mut(key) {
                        proxy.last_area = boundary.area();
                        proxy.last_boundary = Some(boundary);
                    }
                }
                None => {
                    tracing::warn!(proxy = ?key, node = %node, "degenerate boundary ignored");
                }
            }
        }

        self.repaint(key);
        Ok(())
    }

    /// Follows a node into its new container. A tracked container that
    /// cannot hold the kind gets the node rejected and the proxy erased;
    /// returns `false` then.
    fn reparent(&mut self, key: ProxyKey, node: NodeId, container: Option<NodeId>) -> Result<bool> {
        let kind = self.proxies[key].kind;
        let new_parent = container.and_then(|c| self.container_proxy(c));

        match new_parent {
            Some(parent) if !ModelKind::allowed_under(self.container_kind(parent), kind) => {
                self.on_erase_node(key)?;
                self.reject_disallowed(parent, node, kind);
                return Ok(false);
            }
            Some(parent) => {
                let object = self.proxies[key].object;
                let parent_object = self.object_of(parent);
                if let Some(object) = object {
                    self.model.set_parent(object, parent_object)?;
                }

                let old_parent = self.proxies[key].parent;
                if let Some(old) = old_parent.and_then(|p| self.proxies.get_mut(p)) {
                    old.children.retain(|&c| c != key);
                }
                if let Some(new) = parent.and_then(|p| self.proxies.get_mut(p)) {
                    new.children.push(key);
                }
                self.proxies[key].parent = parent;
                tracing::debug!(proxy = ?key, "re-parented");
            }
            None => {
                tracing::warn!(proxy = ?key, %kind, "moved into an untracked container, model parent kept");
            }
        }

        self.proxies[key].last_container = container;
        Ok(true)
    }

    /// Tears down the model object and releases the node. Child proxies go
    /// first. Calling it again is a no-op.
    pub fn on_erase_node(&mut self, key: ProxyKey) -> Result<()> {
        let Some(proxy) = self.proxies.get(key).filter(|p| p.is_live()) else {
            return Ok(());
        };

        for child in proxy.children.clone() {
            self.on_erase_node(child)?;
        }

        self.destroy_observers(key);

        let proxy = &mut self.proxies[key];
        let node = proxy.node.take();
        let object = proxy.object.take();
        let handle = proxy.handle;
        let parent = proxy.parent;
        proxy.state = ProxyState::Erased;
        proxy.paint_requested = false;

        if let Some(node) = node {
            if self.table.get(&node) == Some(&key) {
                self.table.remove(&node);
            }
            if self.host.is_valid(node) && self.host.proxy_link(node) == Some(key) {
                self.host.set_proxy_link(node, None);
            }
        }
        if let Some(parent) = parent.and_then(|p| self.proxies.get_mut(p)) {
            parent.children.retain(|&c| c != key);
        }
        if self.by_object.get(&handle) == Some(&key) {
            self.by_object.remove(&handle);
        }

        if let Some(object) = object.filter(|&o| self.model.contains(o)) {
            let removed = self.model.remove(object)?;
            self.deleted_objects.insert(handle, removed);
        }
        self.erased.push_back(key);
        self.forget_oldest_erased();

        tracing::debug!(proxy = ?key, %handle, "drawing interface erased");
        Ok(())
    }

    /// Drops the oldest erased proxies beyond the retention limit.
    fn forget_oldest_erased(&mut self) {
        while self.erased.len() > self.config.max_erased_retained {
            let Some(key) = self.erased.pop_front() else {
                break;
            };
            if !self.proxies.get(key).is_some_and(|p| p.is_erased()) {
                continue;
            }
            if let Some(proxy) = self.proxies.remove(key) {
                self.deleted_objects.remove(&proxy.handle);
                tracing::trace!(proxy = ?key, handle = %proxy.handle, "erased proxy forgotten");
            }
        }
    }

    /// Brings an erased proxy back on a restored node. The model object is
    /// restored from the removal stash with its handle; without a stash
    /// entry a fresh object is created.
    pub fn on_undelete_node(&mut self, key: ProxyKey, node: NodeId) -> Result<()> {
        let proxy = self.proxies.get(key).ok_or(SyncError::ProxyNotFound(key))?;
        if !proxy.is_erased() {
            return Ok(());
        }
        if !self.host.is_valid(node) {
            return Ok(());
        }
        let (kind, handle) = (proxy.kind, proxy.handle);

        let container = self.host.parent(node).ok_or(SyncError::InvalidNode(node))?;
        let parent = self
            .container_proxy(container)
            .ok_or(SyncError::ParentNotTracked(node))?;
        let container_kind = self.container_kind(parent);
        if !ModelKind::allowed_under(container_kind, kind) {
            return Err(SyncError::Disallowed {
                kind,
                container: container_kind,
            });
        }
        let parent_object = self.object_of(parent);

        let object = match self.model.key_for(handle) {
            Some(existing) => existing,
            None => match self.deleted_objects.remove(&handle) {
                Some(mut snapshots) if !snapshots.is_empty() => {
                    snapshots[0].parent = parent_object.and_then(|o| self.model.handle_of(o));
                    snapshots.retain(|s| self.model.key_for(s.handle).is_none());
                    self.model.restore(&snapshots)?;
                    self.model
                        .key_for(handle)
                        .ok_or(bem_sketch_model::Error::HandleNotFound(handle))?
                }
                _ => self.model.create(kind, parent_object)?,
            },
        };
        let handle = self.model.handle_of(object).unwrap_or(handle);

        let proxy = &mut self.proxies[key];
        proxy.object = Some(object);
        proxy.handle = handle;
        proxy.parent = parent;
        proxy.last_boundary = None;
        proxy.last_area = 0.0;
        if let Some(parent) = parent.and_then(|p| self.proxies.get_mut(p)) {
            parent.children.push(key);
        }
        self.by_object.insert(handle, key);
        self.erased.retain(|&k| k != key);
        self.install_observers(key, node, true);
        self.link_node(key, node);
        self.on_change_node(key)?;
        self.adopt_children(key);

        tracing::debug!(proxy = ?key, node = %node, %handle, "drawing interface undeleted");
        Ok(())
    }

    // --- Painting ---

    /// Requests a repaint. Coalesced: at most one paint is pending per proxy.
    pub fn repaint(&mut self, key: ProxyKey) {
        let Some(proxy) = self.proxies.get_mut(key).filter(|p| p.is_live()) else {
            return;
        };
        if proxy.paint_requested {
            return;
        }
        proxy.paint_requested = true;
        self.queue.enqueue(Command::Paint { proxy: key });
    }

    /// Paints the node now, with the proxy's own observer suppressed.
    pub(crate) fn paint(&mut self, key: ProxyKey) {
        let Some(proxy) = self.proxies.get_mut(key).filter(|p| p.is_live()) else {
            return;
        };
        proxy.paint_requested = false;
        let (kind, node, observer) = (proxy.kind, proxy.node, proxy.observer);
        let Some(node) = node.filter(|&n| self.host.is_valid(n)) else {
            return;
        };

        let suppressed: Vec<ObserverKey> = observer.into_iter().collect();
        self.with_suppressed(&suppressed, |manager| manager.host.paint(node, kind));
    }

    // --- Domain side ---

    /// Removes a proxy, its node and its model object for good. Child
    /// proxies go too.
    pub fn detach(&mut self, key: ProxyKey) -> Result<()> {
        let proxy = self.proxies.get(key).ok_or(SyncError::ProxyNotFound(key))?;
        let node = proxy.node;
        let container_observer = self.collection_observer_of(proxy.parent);
        let subtree = self.proxy_subtree(key);

        self.on_erase_node(key)?;

        if let Some(node) = node.filter(|&n| self.host.is_valid(n)) {
            let suppressed: Vec<ObserverKey> = container_observer.into_iter().collect();
            self.with_suppressed(&suppressed, |manager| manager.host.erase(node));
        }

        for k in subtree {
            if let Some(proxy) = self.proxies.remove(k) {
                self.deleted_objects.remove(&proxy.handle);
            }
        }
        self.erased.retain(|&k| self.proxies.contains_key(k));
        tracing::debug!(proxy = ?key, "drawing interface detached");
        Ok(())
    }

    /// Draws a node for a model object created on the domain side.
    pub fn draw(&mut self, object: ObjectKey) -> Result<ProxyKey> {
        self.draw_object(object, true)
    }

    pub(crate) fn draw_object(&mut self, object: ObjectKey, arm: bool) -> Result<ProxyKey> {
        let data = self
            .model
            .get(object)
            .ok_or(bem_sketch_model::Error::ObjectNotFound(object))?;
        let (kind, handle, polygon) = (data.kind, data.handle, data.polygon.clone());
        let parent_handle = data.parent.and_then(|p| self.model.handle_of(p));

        if let Some(&existing) = self.by_object.get(&handle) {
            if self.is_live(existing) {
                return Ok(existing);
            }
        }

        let parent = match parent_handle {
            Some(h) => Some(
                self.by_object
                    .get(&h)
                    .copied()
                    .filter(|&p| self.is_live(p))
                    .ok_or(bem_sketch_model::Error::HandleNotFound(h))?,
            ),
            None => None,
        };
        let container = match parent {
            Some(p) => self.proxies[p]
                .node
                .filter(|&n| self.host.is_valid(n))
                .ok_or(SyncError::ProxyNotFound(p))?,
            None => self.host.root(),
        };

        let suppressed: Vec<ObserverKey> = self.collection_observer_of(parent).into_iter().collect();
        let node = self.with_suppressed(&suppressed, |manager| match NodeKind::for_model(kind) {
            NodeKind::Face => manager.host.add_face(container, &polygon),
            NodeKind::Group => manager.host.add_group(container),
            _ => manager.host.add_instance(container),
        })?;

        let key = self.create_proxy(kind, node, parent, object, arm)?;
        if kind.is_planar() {
            if let Some(proxy) = self.proxies.get_mut(key) {
                proxy.last_area = polygon.area();
                proxy.last_boundary = Some(polygon);
            }
        }
        self.repaint(key);
        Ok(key)
    }

    /// Replaces a model object's vertices from the domain side. The node is
    /// redrawn when the queue drains.
    pub fn set_object_vertices(&mut self, object: ObjectKey, polygon: Polygon) -> Result<()> {
        self.model.set_polygon(object, polygon)?;
        if let Some(handle) = self.model.handle_of(object) {
            self.queue.enqueue(Command::DomainChanged { handle });
        }
        Ok(())
    }

    /// Pushes a domain-side geometry change to the node.
    pub(crate) fn on_domain_changed(&mut self, handle: Handle) -> Result<()> {
        let object = self
            .model
            .key_for(handle)
            .ok_or(bem_sketch_model::Error::HandleNotFound(handle))?;
        let Some(key) = self.by_object.get(&handle).copied().filter(|&k| self.is_live(k)) else {
            tracing::debug!(%handle, "changed object has no drawing");
            return Ok(());
        };
        let proxy = &self.proxies[key];
        let Some(node) = proxy.node.filter(|&n| self.host.is_valid(n)) else {
            return Ok(());
        };
        if !proxy.kind.is_planar() {
            return Ok(());
        }

        let polygon = self
            .model
            .get(object)
            .map(|o| o.polygon.clone())
            .unwrap_or_default();
        if polygon.len() < 3 {
            return Ok(());
        }

        let current = self.host.boundary(node).unwrap_or_default();
        if !current.circular_eq(&polygon, self.config.swap_tolerance) {
            let mut suppressed: Vec<ObserverKey> = proxy.observer.into_iter().collect();
            suppressed.extend(self.collection_observer_of(proxy.parent));
            self.with_suppressed(&suppressed, |manager| manager.host.set_boundary(node, &polygon))?;
            tracing::debug!(proxy = ?key, %handle, "node redrawn from model");
        }

        if let Some(proxy) = self.proxies.get_mut(key) {
            proxy.last_area = polygon.area();
            proxy.last_boundary = Some(polygon);
        }
        self.repaint(key);
        Ok(())
    }

    /// Collection observer of a container proxy, or of the root.
    pub(crate) fn collection_observer_of(&self, container: Option<ProxyKey>) -> Option<ObserverKey> {
        match container {
            Some(c) => self.proxies.get(c).and_then(|p| p.collection_observer),
            None => self.root_observer,
        }
    }

    /// The proxy and all its descendants, parents first.
    pub fn proxy_subtree(&self, key: ProxyKey) -> Vec<ProxyKey> {
        let mut result = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(proxy) = self.proxies.get(current) {
                result.push(current);
                stack.extend(proxy.children.iter().rev().copied());
            }
        }
        result
    }
}
