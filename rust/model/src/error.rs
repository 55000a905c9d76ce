// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for model operations.

use crate::keys::{Handle, ObjectKey};
use crate::kind::ModelKind;

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing the model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced object was not found in the arena.
    #[error("model object not found: {0:?}")]
    ObjectNotFound(ObjectKey),

    /// No object carries the given handle.
    #[error("no model object with handle {0}")]
    HandleNotFound(Handle),

    /// An object with this handle already exists (restore of a live object).
    #[error("model object with handle {0} already exists")]
    DuplicateHandle(Handle),

    /// The parent kind does not accept children of this kind.
    #[error("{parent} cannot contain {child}")]
    InvalidParent { parent: ModelKind, child: ModelKind },

    /// The kind cannot be placed at the top level of the model.
    #[error("{0} cannot be placed at the top level of the model")]
    InvalidRoot(ModelKind),

    /// A planar object was given fewer than 3 vertices.
    #[error("{kind} needs at least 3 vertices, got {count}")]
    TooFewVertices { kind: ModelKind, count: usize },

    /// Vertices were given to a kind that has no boundary.
    #[error("{0} does not carry vertices")]
    NotPlanar(ModelKind),

    /// Setting the parent would make the object its own ancestor.
    #[error("parent cycle through {0:?}")]
    ParentCycle(ObjectKey),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
