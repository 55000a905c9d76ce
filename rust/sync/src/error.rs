// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for reconciliation.
//!
//! Stale references are not errors: a deferred action whose node or proxy
//! went away is a no-op. These variants cover calls that cannot proceed.

use bem_sketch_model::ModelKind;

use crate::keys::{NodeId, ProxyKey};

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The host does not know the node.
    #[error("host node {0} not found")]
    NodeNotFound(NodeId),

    /// The node was erased or replaced by the host.
    #[error("host node {0} is no longer valid")]
    InvalidNode(NodeId),

    /// A proxy key does not reference a drawing interface.
    #[error("drawing interface not found: {0:?}")]
    ProxyNotFound(ProxyKey),

    /// No model kind could be derived for the node.
    #[error("cannot determine a model kind for node {node}")]
    NotClassifiable { node: NodeId },

    /// The kind is not allowed in the container.
    #[error("{kind} is not allowed in {}", container_label(.container))]
    Disallowed {
        kind: ModelKind,
        container: Option<ModelKind>,
    },

    /// The node already has a live drawing interface.
    #[error("node {node} is already tracked by {proxy:?}")]
    AlreadyTracked { node: NodeId, proxy: ProxyKey },

    /// The node's geometry cannot back a model object of its kind.
    #[error("host node {0} has no usable geometry")]
    InvalidGeometry(NodeId),

    /// The node's container is not tracked, so it has no model parent.
    #[error("container of node {0} is not tracked")]
    ParentNotTracked(NodeId),

    /// Error from the domain model.
    #[error(transparent)]
    Model(#[from] bem_sketch_model::Error),

    /// The host refused an operation.
    #[error("host error: {0}")]
    Host(String),
}

fn container_label(container: &Option<ModelKind>) -> &'static str {
    container.map_or("the model root", |kind| kind.as_str())
}
