// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object identity.
//!
//! An [`ObjectKey`] is a generational slot-map index: cheap, and it goes stale
//! as soon as the object is removed. A [`Handle`] is the persistent identity of
//! an object. It is written onto host nodes, survives removal and restoration,
//! and is the only identity that appears in snapshots.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use uuid::Uuid;

new_key_type! {
    /// Key for a model object inside a [`Model`](crate::Model).
    pub struct ObjectKey;
}

/// Persistent identity of a model object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(Uuid);

impl Handle {
    /// Generates a fresh random handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parses a handle from its hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        assert_ne!(Handle::new(), Handle::new());
    }

    #[test]
    fn handle_parse_round_trip() {
        let handle = Handle::new();
        let text = handle.as_uuid().to_string();
        assert_eq!(Handle::parse(&text), Some(handle));
        assert_eq!(Handle::parse("not-a-uuid"), None);
    }

    #[test]
    fn handle_display_is_braced() {
        let handle = Handle::new();
        let shown = handle.to_string();
        assert!(shown.starts_with('{') && shown.ends_with('}'));
    }
}
