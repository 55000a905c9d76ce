// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The boundary to the host authoring application.
//!
//! The host owns the scene graph and every node's lifetime. The engine reads
//! geometry, stores three attributes per node (proxy link, model handle and
//! type marker), creates and erases nodes, and attaches observers. The host
//! reports edits as [`RawCallback`]s addressed to those observers.

use bem_sketch_model::{Handle, ModelKind, Polygon};

use crate::error::Result;
use crate::keys::{NodeId, ObserverKey, ProxyKey};

/// Class of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    /// Top-level collection of the open document.
    Root,
    /// Container with its own child collection.
    Group,
    /// Planar face. Faces may contain inscribed faces (openings).
    Face,
    /// Component instance, used for point objects.
    Instance,
}

impl NodeKind {
    /// The host node class a model kind is drawn as.
    pub fn for_model(kind: ModelKind) -> Self {
        if kind.is_planar() {
            NodeKind::Face
        } else if kind.is_group() {
            NodeKind::Group
        } else {
            NodeKind::Instance
        }
    }
}

/// What an observer listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverScope {
    /// Changes to and erasure of one node.
    Node,
    /// Additions to and removals from a node's child collection.
    Collection,
    /// Document-level events (selection, settings, save, close).
    Model,
}

/// A notification as raised by the host.
///
/// Hosts give weak guarantees: callbacks may arrive out of order, refer to
/// nodes that are already gone, or be duplicated.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCallback {
    Changed { node: NodeId },
    Erased { node: NodeId },
    ElementAdded { collection: NodeId, node: NodeId },
    ElementRemoved { collection: NodeId, node: NodeId },
    SelectionChanged { nodes: Vec<NodeId> },
    SettingsChanged { north_axis_degrees: f64 },
    PreSave,
    Close,
}

/// Operations the engine needs from the host.
pub trait Host {
    /// The document's top-level collection.
    fn root(&self) -> NodeId;

    /// Returns `true` if the node still exists.
    fn is_valid(&self, node: NodeId) -> bool;

    fn node_kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Container of the node, `None` for the root or invalid nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes in host enumeration order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Boundary of a face in model coordinates.
    fn boundary(&self, node: NodeId) -> Option<Polygon>;

    /// Area of a face, zero for anything else.
    fn area(&self, node: NodeId) -> f64 {
        self.boundary(node).map_or(0.0, |b| b.area())
    }

    fn proxy_link(&self, node: NodeId) -> Option<ProxyKey>;
    fn set_proxy_link(&mut self, node: NodeId, proxy: Option<ProxyKey>);

    fn model_handle(&self, node: NodeId) -> Option<Handle>;
    fn set_model_handle(&mut self, node: NodeId, handle: Option<Handle>);

    fn type_marker(&self, node: NodeId) -> Option<ModelKind>;
    fn set_type_marker(&mut self, node: NodeId, kind: Option<ModelKind>);

    /// Erases the node and everything inside it. Returns `false` if the node
    /// was already gone.
    fn erase(&mut self, node: NodeId) -> bool;

    fn add_face(&mut self, container: NodeId, boundary: &Polygon) -> Result<NodeId>;
    fn add_group(&mut self, container: NodeId) -> Result<NodeId>;
    fn add_instance(&mut self, container: NodeId) -> Result<NodeId>;

    /// Rewrites the boundary of a face.
    fn set_boundary(&mut self, node: NodeId, boundary: &Polygon) -> Result<()>;

    /// Gives a group its own storage if the host shares it with copies.
    fn make_unique(&mut self, node: NodeId);

    /// Applies the display style for a model kind.
    fn paint(&mut self, node: NodeId, kind: ModelKind);

    fn add_observer(&mut self, node: NodeId, scope: ObserverScope, observer: ObserverKey);
    fn remove_observer(&mut self, node: NodeId, scope: ObserverScope, observer: ObserverKey);

    /// Shows a message to the user.
    fn show_message(&mut self, message: &str);

    /// Callbacks raised since the last call, for hosts that buffer them.
    /// Hosts that call back directly into
    /// [`ModelManager::notify`](crate::ModelManager::notify) return nothing.
    fn take_callbacks(&mut self) -> Vec<(ObserverKey, RawCallback)> {
        Vec::new()
    }
}
