// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The closed set of model object kinds that can be drawn in the host.
//!
//! A kind is resolved once, when a host node is adopted, and is carried as a
//! tag from then on. The containment rules live here so that both the model
//! (when re-parenting) and the reconciliation engine (when classifying nodes
//! added to a container) agree on them.

use serde::{Deserialize, Serialize};

/// Kind of a drawable model object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    Space = 0,
    ShadingSurfaceGroup = 1,
    InteriorPartitionSurfaceGroup = 2,
    Surface = 3,
    SubSurface = 4,
    ShadingSurface = 5,
    InteriorPartitionSurface = 6,
    DaylightingControl = 7,
    IlluminanceMap = 8,
    Luminaire = 9,
    GlareSensor = 10,
}

impl ModelKind {
    /// Every kind, in draw order (containers before their children).
    pub const ALL: [ModelKind; 11] = [
        ModelKind::Space,
        ModelKind::ShadingSurfaceGroup,
        ModelKind::InteriorPartitionSurfaceGroup,
        ModelKind::Surface,
        ModelKind::SubSurface,
        ModelKind::ShadingSurface,
        ModelKind::InteriorPartitionSurface,
        ModelKind::DaylightingControl,
        ModelKind::IlluminanceMap,
        ModelKind::Luminaire,
        ModelKind::GlareSensor,
    ];

    /// Kinds allowed directly at the top level of a model.
    pub const ROOT_CHILDREN: &'static [ModelKind] =
        &[ModelKind::Space, ModelKind::ShadingSurfaceGroup];

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Space => "Space",
            ModelKind::ShadingSurfaceGroup => "ShadingSurfaceGroup",
            ModelKind::InteriorPartitionSurfaceGroup => "InteriorPartitionSurfaceGroup",
            ModelKind::Surface => "Surface",
            ModelKind::SubSurface => "SubSurface",
            ModelKind::ShadingSurface => "ShadingSurface",
            ModelKind::InteriorPartitionSurface => "InteriorPartitionSurface",
            ModelKind::DaylightingControl => "DaylightingControl",
            ModelKind::IlluminanceMap => "IlluminanceMap",
            ModelKind::Luminaire => "Luminaire",
            ModelKind::GlareSensor => "GlareSensor",
        }
    }

    /// Parses a kind from its name. Case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Human-readable prefix used for generated object names.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Space => "Space",
            ModelKind::ShadingSurfaceGroup => "Shading Surface Group",
            ModelKind::InteriorPartitionSurfaceGroup => "Interior Partition Surface Group",
            ModelKind::Surface => "Surface",
            ModelKind::SubSurface => "Sub Surface",
            ModelKind::ShadingSurface => "Shading Surface",
            ModelKind::InteriorPartitionSurface => "Interior Partition Surface",
            ModelKind::DaylightingControl => "Daylighting Control",
            ModelKind::IlluminanceMap => "Illuminance Map",
            ModelKind::Luminaire => "Luminaire",
            ModelKind::GlareSensor => "Glare Sensor",
        }
    }

    /// Kinds this kind may contain.
    pub fn allowed_children(&self) -> &'static [ModelKind] {
        match self {
            ModelKind::Space => &[
                ModelKind::Surface,
                ModelKind::ShadingSurfaceGroup,
                ModelKind::InteriorPartitionSurfaceGroup,
                ModelKind::DaylightingControl,
                ModelKind::IlluminanceMap,
                ModelKind::Luminaire,
                ModelKind::GlareSensor,
            ],
            ModelKind::Surface => &[ModelKind::SubSurface],
            ModelKind::ShadingSurfaceGroup => &[ModelKind::ShadingSurface],
            ModelKind::InteriorPartitionSurfaceGroup => &[ModelKind::InteriorPartitionSurface],
            _ => &[],
        }
    }

    /// Returns `true` if `child` may be placed inside this kind.
    pub fn accepts(&self, child: ModelKind) -> bool {
        self.allowed_children().contains(&child)
    }

    /// Returns `true` if `kind` may be placed under `parent`, where `None`
    /// means the top level of the model.
    pub fn allowed_under(parent: Option<ModelKind>, kind: ModelKind) -> bool {
        match parent {
            Some(parent) => parent.accepts(kind),
            None => Self::ROOT_CHILDREN.contains(&kind),
        }
    }

    /// Planar kinds are drawn as a single host face and carry vertices.
    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            ModelKind::Surface
                | ModelKind::SubSurface
                | ModelKind::ShadingSurface
                | ModelKind::InteriorPartitionSurface
        )
    }

    /// Group kinds are drawn as a host group owning a child collection.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            ModelKind::Space
                | ModelKind::ShadingSurfaceGroup
                | ModelKind::InteriorPartitionSurfaceGroup
        )
    }

    /// Point kinds are drawn as host component instances.
    pub fn is_instance(&self) -> bool {
        !self.is_planar() && !self.is_group()
    }

    /// Kinds whose host nodes can be silently replaced by the host when the
    /// user edits neighbouring geometry.
    pub fn requires_swap_check(&self) -> bool {
        self.is_planar()
    }

    /// Position in the draw order. Parents always sort before children.
    pub fn draw_order(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_accepts_surfaces_but_not_shading_surfaces() {
        assert!(ModelKind::Space.accepts(ModelKind::Surface));
        assert!(ModelKind::Space.accepts(ModelKind::ShadingSurfaceGroup));
        assert!(!ModelKind::Space.accepts(ModelKind::ShadingSurface));
        assert!(!ModelKind::Space.accepts(ModelKind::Space));
    }

    #[test]
    fn root_accepts_spaces_and_site_shading() {
        assert!(ModelKind::allowed_under(None, ModelKind::Space));
        assert!(ModelKind::allowed_under(None, ModelKind::ShadingSurfaceGroup));
        assert!(!ModelKind::allowed_under(None, ModelKind::Surface));
    }

    #[test]
    fn leaf_kinds_accept_nothing() {
        assert!(ModelKind::SubSurface.allowed_children().is_empty());
        assert!(ModelKind::Luminaire.allowed_children().is_empty());
    }

    #[test]
    fn every_kind_has_exactly_one_shape() {
        for kind in ModelKind::ALL {
            let shapes = [kind.is_planar(), kind.is_group(), kind.is_instance()];
            assert_eq!(shapes.iter().filter(|s| **s).count(), 1, "{kind}");
        }
    }

    #[test]
    fn draw_order_puts_containers_first() {
        for kind in ModelKind::ALL {
            for child in kind.allowed_children() {
                assert!(kind.draw_order() < child.draw_order(), "{kind} -> {child}");
            }
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ModelKind::parse("shadingsurface"), Some(ModelKind::ShadingSurface));
        assert_eq!(ModelKind::parse("Space"), Some(ModelKind::Space));
        assert_eq!(ModelKind::parse("Building"), None);
    }
}
