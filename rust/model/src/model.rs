// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for model objects.
//!
//! The [`Model`] owns every object in a slot map with stable, generational
//! keys, keeps a handle index for persistent lookups, and maintains the
//! parent → children index. All edits go through the model so the
//! containment rules of [`ModelKind`] are enforced in one place.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::error::{Error, Result};
use crate::geometry::Polygon;
use crate::keys::{Handle, ObjectKey};
use crate::kind::ModelKind;
use crate::object::{ModelObject, ObjectSnapshot};

/// The building energy model.
///
/// # Example
///
/// ```
/// use bem_sketch_model::{Model, ModelKind};
///
/// let mut model = Model::new();
/// let space = model.create(ModelKind::Space, None).unwrap();
/// let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
///
/// assert_eq!(model.len(), 2);
/// assert_eq!(model.children(space), &[wall]);
/// ```
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) objects: SlotMap<ObjectKey, ModelObject>,
    pub(crate) by_handle: FxHashMap<Handle, ObjectKey>,
    pub(crate) children: FxHashMap<ObjectKey, Vec<ObjectKey>>,
    pub(crate) name_counters: FxHashMap<ModelKind, usize>,
    pub(crate) north_axis: f64,
}

impl Model {
    /// Creates a new, empty model.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Queries ---

    /// Returns the object for the given key, or `None` if it was removed.
    pub fn get(&self, key: ObjectKey) -> Option<&ModelObject> {
        self.objects.get(key)
    }

    /// Returns `true` if the key references a live object.
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    /// Looks up an object by its persistent handle.
    pub fn key_for(&self, handle: Handle) -> Option<ObjectKey> {
        self.by_handle.get(&handle).copied()
    }

    /// Returns the persistent handle of an object.
    pub fn handle_of(&self, key: ObjectKey) -> Option<Handle> {
        self.objects.get(key).map(|o| o.handle)
    }

    /// Number of objects in the model.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the model has no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over all objects in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, &ModelObject)> {
        self.objects.iter()
    }

    /// Number of objects of the given kind.
    pub fn count_of_kind(&self, kind: ModelKind) -> usize {
        self.objects.values().filter(|o| o.kind == kind).count()
    }

    /// Keys of all objects of the given kind.
    pub fn objects_of_kind(&self, kind: ModelKind) -> Vec<ObjectKey> {
        self.objects
            .iter()
            .filter(|(_, o)| o.kind == kind)
            .map(|(k, _)| k)
            .collect()
    }

    /// Direct children of an object.
    pub fn children(&self, key: ObjectKey) -> &[ObjectKey] {
        self.children.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Objects without a parent.
    pub fn top_level(&self) -> Vec<ObjectKey> {
        self.objects
            .iter()
            .filter(|(_, o)| o.parent.is_none())
            .map(|(k, _)| k)
            .collect()
    }

    /// The object and all its descendants, parents before children.
    pub fn subtree(&self, key: ObjectKey) -> Vec<ObjectKey> {
        let mut result = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if !self.objects.contains_key(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    /// Returns `true` if the object exists and its geometry is usable.
    pub fn is_valid(&self, key: ObjectKey) -> bool {
        self.objects.get(key).is_some_and(ModelObject::is_valid)
    }

    /// Building north axis in degrees clockwise from true north.
    pub fn north_axis(&self) -> f64 {
        self.north_axis
    }

    /// Sets the building north axis.
    pub fn set_north_axis(&mut self, degrees: f64) {
        self.north_axis = degrees;
    }

    // --- Creation ---

    /// Creates a new object of `kind` under `parent` (or at the top level)
    /// with a generated name and a fresh handle.
    pub fn create(&mut self, kind: ModelKind, parent: Option<ObjectKey>) -> Result<ObjectKey> {
        self.check_parent(parent, kind)?;
        let name = self.next_name(kind);
        Ok(self.insert(ModelObject {
            handle: Handle::new(),
            kind,
            name,
            parent,
            polygon: Polygon::default(),
        }))
    }

    /// Creates a copy of an object (without its children) under `parent`.
    /// The copy gets a new handle and a new name.
    pub fn clone_object(&mut self, key: ObjectKey, parent: Option<ObjectKey>) -> Result<ObjectKey> {
        let source = self.objects.get(key).ok_or(Error::ObjectNotFound(key))?;
        let kind = source.kind;
        let polygon = source.polygon.clone();

        self.check_parent(parent, kind)?;
        let name = self.next_name(kind);
        Ok(self.insert(ModelObject {
            handle: Handle::new(),
            kind,
            name,
            parent,
            polygon,
        }))
    }

    fn insert(&mut self, object: ModelObject) -> ObjectKey {
        let handle = object.handle;
        let parent = object.parent;
        let key = self.objects.insert(object);
        self.by_handle.insert(handle, key);
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().push(key);
        }
        tracing::trace!(?key, %handle, "model object inserted");
        key
    }

    fn next_name(&mut self, kind: ModelKind) -> String {
        let counter = self.name_counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{} {}", kind.display_name(), counter)
    }

    fn check_parent(&self, parent: Option<ObjectKey>, kind: ModelKind) -> Result<()> {
        match parent {
            Some(parent_key) => {
                let parent = self
                    .objects
                    .get(parent_key)
                    .ok_or(Error::ObjectNotFound(parent_key))?;
                if !parent.kind.accepts(kind) {
                    return Err(Error::InvalidParent {
                        parent: parent.kind,
                        child: kind,
                    });
                }
            }
            None => {
                if !ModelKind::allowed_under(None, kind) {
                    return Err(Error::InvalidRoot(kind));
                }
            }
        }
        Ok(())
    }

    // --- Editing ---

    /// Renames an object.
    pub fn set_name(&mut self, key: ObjectKey, name: impl Into<String>) -> Result<()> {
        let object = self.objects.get_mut(key).ok_or(Error::ObjectNotFound(key))?;
        object.name = name.into();
        Ok(())
    }

    /// Replaces the boundary of a planar object.
    pub fn set_polygon(&mut self, key: ObjectKey, polygon: Polygon) -> Result<()> {
        let object = self.objects.get_mut(key).ok_or(Error::ObjectNotFound(key))?;
        if !object.kind.is_planar() {
            return Err(Error::NotPlanar(object.kind));
        }
        if polygon.len() < 3 {
            return Err(Error::TooFewVertices {
                kind: object.kind,
                count: polygon.len(),
            });
        }
        object.polygon = polygon;
        Ok(())
    }

    /// Moves an object under a new parent (or to the top level).
    pub fn set_parent(&mut self, key: ObjectKey, parent: Option<ObjectKey>) -> Result<()> {
        let kind = self.objects.get(key).ok_or(Error::ObjectNotFound(key))?.kind;
        self.check_parent(parent, kind)?;

        // Walk up from the new parent; reaching `key` means a cycle.
        let mut cursor = parent;
        while let Some(current) = cursor {
            if current == key {
                return Err(Error::ParentCycle(key));
            }
            cursor = self.objects.get(current).and_then(|o| o.parent);
        }

        let old_parent = self.objects[key].parent;
        if old_parent == parent {
            return Ok(());
        }
        if let Some(old) = old_parent {
            self.unlink_child(old, key);
        }
        if let Some(new) = parent {
            self.children.entry(new).or_default().push(key);
        }
        self.objects[key].parent = parent;
        Ok(())
    }

    fn unlink_child(&mut self, parent: ObjectKey, child: ObjectKey) {
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&k| k != child);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
    }

    // --- Removal and restoration ---

    /// Returns a detached snapshot of a single object.
    pub fn snapshot(&self, key: ObjectKey) -> Option<ObjectSnapshot> {
        let object = self.objects.get(key)?;
        Some(ObjectSnapshot {
            handle: object.handle,
            kind: object.kind,
            name: object.name.clone(),
            parent: object.parent.and_then(|p| self.handle_of(p)),
            vertices: object.polygon.to_coords(),
        })
    }

    /// Removes an object and all its descendants.
    ///
    /// Returns snapshots of everything removed, parents first, suitable for
    /// [`Model::restore`].
    pub fn remove(&mut self, key: ObjectKey) -> Result<Vec<ObjectSnapshot>> {
        if !self.objects.contains_key(key) {
            return Err(Error::ObjectNotFound(key));
        }

        let keys = self.subtree(key);
        let snapshots: Vec<ObjectSnapshot> =
            keys.iter().filter_map(|&k| self.snapshot(k)).collect();

        if let Some(parent) = self.objects[key].parent {
            self.unlink_child(parent, key);
        }
        for k in keys {
            if let Some(object) = self.objects.remove(k) {
                self.by_handle.remove(&object.handle);
            }
            self.children.remove(&k);
        }

        tracing::debug!(removed = snapshots.len(), "model subtree removed");
        Ok(snapshots)
    }

    /// Re-inserts previously removed objects, keeping their handles.
    ///
    /// Snapshots must be ordered parents first. Either all snapshots are
    /// restored or none is. Returns the new keys in snapshot order.
    pub fn restore(&mut self, snapshots: &[ObjectSnapshot]) -> Result<Vec<ObjectKey>> {
        for (i, snapshot) in snapshots.iter().enumerate() {
            if self.by_handle.contains_key(&snapshot.handle) {
                return Err(Error::DuplicateHandle(snapshot.handle));
            }
            if let Some(parent) = snapshot.parent {
                let restored_earlier = snapshots[..i].iter().any(|s| s.handle == parent);
                if !restored_earlier && !self.by_handle.contains_key(&parent) {
                    return Err(Error::HandleNotFound(parent));
                }
            }
        }

        let mut keys = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let parent = snapshot.parent.and_then(|h| self.key_for(h));
            let key = self.insert(ModelObject {
                handle: snapshot.handle,
                kind: snapshot.kind,
                name: snapshot.name.clone(),
                parent,
                polygon: Polygon::from_coords(&snapshot.vertices),
            });
            keys.push(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::from_coords(&[
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            [4.0, 0.0, 3.0],
            [0.0, 0.0, 3.0],
        ])
    }

    #[test]
    fn create_enforces_containment() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();

        assert!(model.create(ModelKind::Surface, Some(space)).is_ok());
        assert!(matches!(
            model.create(ModelKind::ShadingSurface, Some(space)),
            Err(Error::InvalidParent { .. })
        ));
        assert!(matches!(
            model.create(ModelKind::Surface, None),
            Err(Error::InvalidRoot(ModelKind::Surface))
        ));
    }

    #[test]
    fn generated_names_count_per_kind() {
        let mut model = Model::new();
        let a = model.create(ModelKind::Space, None).unwrap();
        let b = model.create(ModelKind::Space, None).unwrap();
        let s = model.create(ModelKind::Surface, Some(a)).unwrap();

        assert_eq!(model.get(a).unwrap().name, "Space 1");
        assert_eq!(model.get(b).unwrap().name, "Space 2");
        assert_eq!(model.get(s).unwrap().name, "Surface 1");
    }

    #[test]
    fn set_polygon_rejects_non_planar_and_short_boundaries() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();

        assert!(matches!(
            model.set_polygon(space, square()),
            Err(Error::NotPlanar(ModelKind::Space))
        ));
        let short = Polygon::from_coords(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(matches!(
            model.set_polygon(wall, short),
            Err(Error::TooFewVertices { count: 2, .. })
        ));
        assert!(!model.is_valid(wall));

        model.set_polygon(wall, square()).unwrap();
        assert!(model.is_valid(wall));
    }

    #[test]
    fn remove_takes_subtree_and_restore_keeps_handles() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
        model.set_polygon(wall, square()).unwrap();
        let window = model.create(ModelKind::SubSurface, Some(wall)).unwrap();

        let wall_handle = model.handle_of(wall).unwrap();
        let window_handle = model.handle_of(window).unwrap();

        let removed = model.remove(wall).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].handle, wall_handle);
        assert_eq!(model.len(), 1);
        assert!(model.children(space).is_empty());
        assert!(!model.contains(window));

        let restored = model.restore(&removed).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(model.key_for(wall_handle), Some(restored[0]));
        assert_eq!(model.key_for(window_handle), Some(restored[1]));
        assert_eq!(model.children(space), &[restored[0]]);
        assert_eq!(model.get(restored[0]).unwrap().polygon.len(), 4);
    }

    #[test]
    fn restore_is_all_or_nothing() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
        let removed = model.remove(wall).unwrap();

        model.restore(&removed).unwrap();
        let before = model.len();
        assert!(matches!(
            model.restore(&removed),
            Err(Error::DuplicateHandle(_))
        ));
        assert_eq!(model.len(), before);
    }

    #[test]
    fn restore_requires_parent() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
        let wall_only = model.remove(wall).unwrap();
        model.remove(space).unwrap();

        assert!(matches!(
            model.restore(&wall_only),
            Err(Error::HandleNotFound(_))
        ));
    }

    #[test]
    fn clone_object_gets_new_identity() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
        model.set_polygon(wall, square()).unwrap();

        let copy = model.clone_object(wall, Some(space)).unwrap();
        assert_ne!(model.handle_of(copy), model.handle_of(wall));
        assert_eq!(model.get(copy).unwrap().polygon, square());
        assert_eq!(model.children(space).len(), 2);
    }

    #[test]
    fn set_parent_moves_between_containers_and_rejects_cycles() {
        let mut model = Model::new();
        let a = model.create(ModelKind::Space, None).unwrap();
        let b = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(a)).unwrap();

        model.set_parent(wall, Some(b)).unwrap();
        assert!(model.children(a).is_empty());
        assert_eq!(model.children(b), &[wall]);

        assert!(matches!(
            model.set_parent(wall, None),
            Err(Error::InvalidRoot(_))
        ));
        assert!(model.set_parent(b, Some(wall)).is_err());
    }

    #[test]
    fn subtree_is_parent_first() {
        let mut model = Model::new();
        let space = model.create(ModelKind::Space, None).unwrap();
        let wall = model.create(ModelKind::Surface, Some(space)).unwrap();
        let window = model.create(ModelKind::SubSurface, Some(wall)).unwrap();
        let shading = model.create(ModelKind::ShadingSurfaceGroup, Some(space)).unwrap();

        assert_eq!(model.subtree(space), vec![space, wall, window, shading]);
        assert_eq!(model.top_level(), vec![space]);
    }
}
