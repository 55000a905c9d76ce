// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer registry.
//!
//! One observer per tracked node, one per tracked collection, and one for the
//! document. An observer translates raw host callbacks into queued
//! [`Command`]s, but only while enabled. Observers start disabled; the engine
//! arms them once the proxy is in place and disables them around its own host
//! edits so those edits do not echo back as work.

use slotmap::SlotMap;

use crate::host::{ObserverScope, RawCallback};
use crate::keys::{NodeId, ObserverKey, ProxyKey};
use crate::queue::Command;

/// What an observer reports on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverTarget {
    /// A proxy's own node.
    Node(ProxyKey),
    /// The child collection of a proxy's node, or of the root when `None`.
    Collection(Option<ProxyKey>),
    /// The document.
    Model,
}

/// State of one observer.
#[derive(Debug, Clone)]
pub struct Observer {
    /// Cleared on destroy.
    pub target: Option<ObserverTarget>,
    pub node: NodeId,
    pub scope: ObserverScope,
    pub enabled: bool,
}

/// All observers of one open document.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: SlotMap<ObserverKey, Observer>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled observer.
    pub fn create(&mut self, target: ObserverTarget, node: NodeId, scope: ObserverScope) -> ObserverKey {
        self.observers.insert(Observer {
            target: Some(target),
            node,
            scope,
            enabled: false,
        })
    }

    pub fn get(&self, key: ObserverKey) -> Option<&Observer> {
        self.observers.get(key)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn is_enabled(&self, key: ObserverKey) -> bool {
        self.observers.get(key).is_some_and(|o| o.enabled)
    }

    /// Enables an observer. Destroyed observers stay disabled.
    pub fn enable(&mut self, key: ObserverKey) {
        if let Some(observer) = self.observers.get_mut(key) {
            observer.enabled = observer.target.is_some();
        }
    }

    /// Disables an observer and returns whether it was enabled.
    pub fn disable(&mut self, key: ObserverKey) -> bool {
        match self.observers.get_mut(key) {
            Some(observer) => std::mem::replace(&mut observer.enabled, false),
            None => false,
        }
    }

    /// Moves an observer to another node (after an identity swap).
    pub fn retarget(&mut self, key: ObserverKey, node: NodeId) {
        if let Some(observer) = self.observers.get_mut(key) {
            observer.node = node;
        }
    }

    /// Destroys an observer. Returns where it was attached so the caller can
    /// detach it from the host.
    pub fn destroy(&mut self, key: ObserverKey) -> Option<(NodeId, ObserverScope)> {
        let mut observer = self.observers.remove(key)?;
        observer.target = None;
        observer.enabled = false;
        Some((observer.node, observer.scope))
    }

    /// Destroys every observer, returning their attachments.
    pub fn destroy_all(&mut self) -> Vec<(ObserverKey, NodeId, ObserverScope)> {
        self.observers
            .drain()
            .map(|(key, o)| (key, o.node, o.scope))
            .collect()
    }

    /// Translates a raw callback into a command. `None` if the observer is
    /// disabled, destroyed, or not interested in this callback.
    pub fn translate(&self, key: ObserverKey, callback: &RawCallback) -> Option<Command> {
        let observer = self.observers.get(key)?;
        if !observer.enabled {
            return None;
        }

        match (observer.target?, callback) {
            (ObserverTarget::Node(proxy), RawCallback::Changed { node }) => {
                Some(Command::NodeChanged { proxy, node: *node })
            }
            (ObserverTarget::Node(proxy), RawCallback::Erased { node }) => {
                Some(Command::NodeErased { proxy, node: *node })
            }
            (ObserverTarget::Collection(container), RawCallback::ElementAdded { node, .. }) => {
                Some(Command::ElementAdded {
                    container,
                    node: *node,
                })
            }
            (ObserverTarget::Collection(container), RawCallback::ElementRemoved { node, .. }) => {
                Some(Command::ElementRemoved {
                    container,
                    node: *node,
                })
            }
            (ObserverTarget::Model, RawCallback::SelectionChanged { nodes }) => {
                Some(Command::SelectionChanged {
                    nodes: nodes.clone(),
                })
            }
            (ObserverTarget::Model, RawCallback::SettingsChanged { north_axis_degrees }) => {
                Some(Command::SettingsChanged {
                    north_axis_degrees: *north_axis_degrees,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn proxy() -> ProxyKey {
        ProxyKey::from(KeyData::from_ffi(1))
    }

    #[test]
    fn observers_start_disabled() {
        let mut registry = ObserverRegistry::new();
        let key = registry.create(ObserverTarget::Node(proxy()), NodeId(1), ObserverScope::Node);

        assert!(!registry.is_enabled(key));
        assert_eq!(
            registry.translate(key, &RawCallback::Changed { node: NodeId(1) }),
            None
        );
    }

    #[test]
    fn disable_reports_previous_state() {
        let mut registry = ObserverRegistry::new();
        let key = registry.create(ObserverTarget::Node(proxy()), NodeId(1), ObserverScope::Node);

        assert!(!registry.disable(key));
        registry.enable(key);
        assert!(registry.disable(key));
        assert!(!registry.disable(key));
    }

    #[test]
    fn node_observer_translates_change_and_erase() {
        let mut registry = ObserverRegistry::new();
        let key = registry.create(ObserverTarget::Node(proxy()), NodeId(7), ObserverScope::Node);
        registry.enable(key);

        assert_eq!(
            registry.translate(key, &RawCallback::Erased { node: NodeId(7) }),
            Some(Command::NodeErased {
                proxy: proxy(),
                node: NodeId(7)
            })
        );
        assert_eq!(registry.translate(key, &RawCallback::PreSave), None);
    }

    #[test]
    fn destroyed_observer_ignores_callbacks() {
        let mut registry = ObserverRegistry::new();
        let key = registry.create(ObserverTarget::Collection(None), NodeId(0), ObserverScope::Collection);
        registry.enable(key);

        assert_eq!(registry.destroy(key), Some((NodeId(0), ObserverScope::Collection)));
        registry.enable(key);
        assert!(!registry.is_enabled(key));
        let added = RawCallback::ElementAdded {
            collection: NodeId(0),
            node: NodeId(3),
        };
        assert_eq!(registry.translate(key, &added), None);
        assert_eq!(registry.destroy(key), None);
    }
}
