// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model objects and the detached snapshots used to restore them.

use serde::{Deserialize, Serialize};

use crate::geometry::Polygon;
use crate::keys::{Handle, ObjectKey};
use crate::kind::ModelKind;

/// Data stored for one model object.
#[derive(Debug, Clone)]
pub struct ModelObject {
    pub handle: Handle,
    pub kind: ModelKind,
    pub name: String,
    pub parent: Option<ObjectKey>,
    /// Boundary for planar kinds, empty otherwise.
    pub polygon: Polygon,
}

impl ModelObject {
    /// Returns `true` if the object is usable: planar kinds need a valid
    /// boundary, other kinds are always valid.
    pub fn is_valid(&self) -> bool {
        !self.kind.is_planar() || self.polygon.is_valid()
    }
}

/// A detached copy of an object, keyed by handles instead of arena keys so it
/// stays meaningful after the object (and its parent) left the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub handle: Handle,
    pub kind: ModelKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Handle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vertices: Vec<[f64; 3]>,
}
