// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BEM-Sketch Model
//!
//! Building energy model objects that mirror what a user draws in a host 3D
//! authoring tool: spaces, their surfaces and sub-surfaces, shading and
//! interior partition groups, and point objects such as daylighting controls.
//!
//! Objects live in a [`Model`] arena keyed by generational [`ObjectKey`]s.
//! Every object also carries a persistent [`Handle`] that survives removal and
//! restoration (undo), save and reopen, and is what the host stores on its
//! scene nodes.
//!
//! The model knows nothing about the host. Keeping the two graphs consistent
//! is the job of the `bem-sketch-sync` crate.

pub mod error;
pub mod geometry;
pub mod keys;
pub mod kind;
pub mod model;
pub mod object;
pub mod serialization;

pub use error::{Error, Result};
pub use geometry::Polygon;
pub use keys::{Handle, ObjectKey};
pub use kind::ModelKind;
pub use model::Model;
pub use object::{ModelObject, ObjectSnapshot};
pub use serialization::ModelSnapshot;
