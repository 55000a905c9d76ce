// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON serialization for models.
//!
//! Objects are written in draw order (containers before their contents) and
//! reference their parent by handle, so a snapshot can be loaded back with a
//! single forward pass.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Model;
use crate::object::ObjectSnapshot;

/// Serializable representation of a whole model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(default)]
    pub north_axis_degrees: f64,
    pub objects: Vec<ObjectSnapshot>,
}

impl Model {
    /// Captures the model as a snapshot, in draw order.
    pub fn to_snapshot(&self) -> ModelSnapshot {
        let mut keys: Vec<_> = self.objects.keys().collect();
        keys.sort_by_key(|&k| self.objects[k].kind.draw_order());

        ModelSnapshot {
            north_axis_degrees: self.north_axis,
            objects: keys.into_iter().filter_map(|k| self.snapshot(k)).collect(),
        }
    }

    /// Rebuilds a model from a snapshot. Handles are preserved.
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Result<Self> {
        let mut objects = snapshot.objects.clone();
        objects.sort_by_key(|o| o.kind.draw_order());

        let mut model = Model::new();
        model.north_axis = snapshot.north_axis_degrees;
        model.restore(&objects)?;

        // Keep generated names from colliding with loaded ones.
        for object in &objects {
            let counter = model.name_counters.entry(object.kind).or_insert(0);
            *counter += 1;
        }
        Ok(model)
    }

    /// Serializes the model to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_snapshot()).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes a model from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: ModelSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::kind::ModelKind;

    fn sample() -> Model {
        let mut model = Model::new();
        model.set_north_axis(30.0);
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
        model
            .set_polygon(
                wall,
                Polygon::from_coords(&[
                    [0.0, 0.0, 0.0],
                    [5.0, 0.0, 0.0],
                    [5.0, 0.0, 3.0],
                    [0.0, 0.0, 3.0],
                ]),
            )
            .unwrap();
        model.create(ModelKind::SubSurface, Some(wall)).unwrap();
        model
    }

    #[test]
    fn snapshot_lists_containers_first() {
        let snapshot = sample().to_snapshot();
        let kinds: Vec<_> = snapshot.objects.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![ModelKind::Space, ModelKind::Surface, ModelKind::SubSurface]
        );
        assert!(snapshot.objects[0].parent.is_none());
        assert_eq!(snapshot.objects[1].parent, Some(snapshot.objects[0].handle));
    }

    #[test]
    fn json_round_trip_keeps_handles_and_settings() {
        let model = sample();
        let json = model.to_json().unwrap();
        let loaded = Model::from_json(&json).unwrap();

        assert_eq!(loaded.len(), model.len());
        assert_eq!(loaded.north_axis(), 30.0);
        for (_, object) in model.iter() {
            let key = loaded.key_for(object.handle).unwrap();
            assert_eq!(loaded.get(key).unwrap().name, object.name);
        }
        assert_eq!(loaded.to_snapshot(), model.to_snapshot());
    }

    #[test]
    fn loaded_model_continues_name_sequence() {
        let model = sample();
        let mut loaded = Model::from_json(&model.to_json().unwrap()).unwrap();
        let space = loaded.create(ModelKind::Space, None).unwrap();
        assert_eq!(loaded.get(space).unwrap().name, "Space 2");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            Model::from_json("{\"objects\": 3}"),
            Err(Error::Serialization(_))
        ));
    }
}
