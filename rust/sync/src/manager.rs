// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-document reconciliation context.
//!
//! A [`ModelManager`] is created when a document opens and torn down when it
//! closes. It owns the host handle, the model, the node → proxy table, the
//! observers and the deferred queue. Everything the observers report goes
//! through the queue and is applied in [`ModelManager::drain`], which the
//! host calls once its own operation has finished.

use bem_sketch_model::{Handle, Model, ObjectKey};
use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::config::SyncConfig;
use crate::consistency::ConsistencyReport;
use crate::error::Result;
use crate::host::{Host, NodeKind, ObserverScope, RawCallback};
use crate::interface::DrawingInterface;
use crate::keys::{NodeId, ObserverKey, ProxyKey};
use crate::messages::ErrorLog;
use crate::observer::{ObserverRegistry, ObserverTarget};
use crate::queue::{Command, DeferredEventQueue};

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Actions executed, failed ones included.
    pub executed: usize,
    /// Actions that returned an error.
    pub failed: usize,
    /// Actions left queued because the per-drain limit was reached.
    pub deferred: usize,
    /// The drain did not start: processing is paused or a drain is running.
    pub skipped: bool,
    pub consistency: ConsistencyReport,
}

/// Reconciliation context for one open document.
#[derive(Debug)]
pub struct ModelManager<H: Host> {
    pub(crate) host: H,
    pub(crate) model: Model,
    pub(crate) config: SyncConfig,
    pub(crate) queue: DeferredEventQueue,
    pub(crate) observers: ObserverRegistry,
    pub(crate) proxies: SlotMap<ProxyKey, DrawingInterface>,
    /// Node → live proxy.
    pub(crate) table: FxHashMap<NodeId, ProxyKey>,
    /// Model handle → live proxy.
    pub(crate) by_object: FxHashMap<Handle, ProxyKey>,
    /// Snapshots of erased model objects, by the erased proxy's handle.
    pub(crate) deleted_objects: FxHashMap<Handle, Vec<bem_sketch_model::ObjectSnapshot>>,
    /// Erased proxies, oldest first.
    pub(crate) erased: VecDeque<ProxyKey>,
    pub(crate) root_observer: Option<ObserverKey>,
    pub(crate) model_observer: Option<ObserverKey>,
    pub(crate) errors: ErrorLog,
    pub(crate) selection: Vec<Handle>,
}

impl<H: Host> ModelManager<H> {
    /// Opens a document with an empty model.
    pub fn new(host: H, config: SyncConfig) -> Self {
        let mut manager = Self {
            host,
            model: Model::new(),
            config,
            queue: DeferredEventQueue::new(),
            observers: ObserverRegistry::new(),
            proxies: SlotMap::with_key(),
            table: FxHashMap::default(),
            by_object: FxHashMap::default(),
            deleted_objects: FxHashMap::default(),
            erased: VecDeque::new(),
            root_observer: None,
            model_observer: None,
            errors: ErrorLog::new(),
            selection: Vec::new(),
        };
        manager.install_document_observers();
        manager
    }

    fn install_document_observers(&mut self) {
        let root = self.host.root();

        let collection =
            self.observers
                .create(ObserverTarget::Collection(None), root, ObserverScope::Collection);
        self.host
            .add_observer(root, ObserverScope::Collection, collection);
        self.observers.enable(collection);

        let model = self
            .observers
            .create(ObserverTarget::Model, root, ObserverScope::Model);
        self.host.add_observer(root, ObserverScope::Model, model);
        self.observers.enable(model);

        self.root_observer = Some(collection);
        self.model_observer = Some(model);
    }

    // --- Accessors ---

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host access, for edits made on the user's behalf. Callbacks
    /// raised by those edits are picked up by the next [`Self::pump`].
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn queue(&self) -> &DeferredEventQueue {
        &self.queue
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverRegistry {
        &mut self.observers
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Handles of the model objects selected in the host.
    pub fn selection(&self) -> &[Handle] {
        &self.selection
    }

    pub fn proxy(&self, key: ProxyKey) -> Option<&DrawingInterface> {
        self.proxies.get(key)
    }

    /// Every proxy, erased ones included.
    pub fn proxies(&self) -> impl Iterator<Item = (ProxyKey, &DrawingInterface)> {
        self.proxies.iter()
    }

    pub fn live_proxies(&self) -> impl Iterator<Item = (ProxyKey, &DrawingInterface)> {
        self.proxies.iter().filter(|(_, p)| p.is_live())
    }

    /// The live proxy tracking a node.
    pub fn proxy_for_node(&self, node: NodeId) -> Option<ProxyKey> {
        self.table.get(&node).copied().filter(|&k| self.is_live(k))
    }

    /// The live proxy drawing a model object.
    pub fn proxy_for_object(&self, object: ObjectKey) -> Option<ProxyKey> {
        let handle = self.model.handle_of(object)?;
        self.by_object.get(&handle).copied().filter(|&k| self.is_live(k))
    }

    /// Tracked nodes and their proxies.
    pub fn tracked_nodes(&self) -> impl Iterator<Item = (NodeId, ProxyKey)> + '_ {
        self.table.iter().map(|(&n, &k)| (n, k))
    }

    pub fn is_live(&self, key: ProxyKey) -> bool {
        self.proxies.get(key).is_some_and(DrawingInterface::is_live)
    }

    // --- Callbacks and the queue ---

    /// Entry point for host callbacks. Document lifecycle callbacks run now,
    /// everything else is queued if the observer is enabled.
    pub fn notify(&mut self, observer: ObserverKey, callback: RawCallback) {
        match callback {
            RawCallback::PreSave if self.observers.is_enabled(observer) => self.prepare_for_save(),
            RawCallback::Close if self.observers.is_enabled(observer) => self.close(),
            callback => {
                if let Some(command) = self.observers.translate(observer, &callback) {
                    self.queue.enqueue(command);
                }
            }
        }
    }

    /// Collects callbacks buffered by the host.
    pub fn pump(&mut self) {
        for (observer, callback) in self.host.take_callbacks() {
            self.notify(observer, callback);
        }
    }

    /// Queues a command as if an observer had raised it.
    pub fn enqueue(&mut self, command: Command) -> u64 {
        self.queue.enqueue(command)
    }

    /// Called by the host when its current operation has finished.
    pub fn on_host_idle(&mut self) -> DrainReport {
        self.pump();
        self.drain()
    }

    /// Stops processing queued actions until [`Self::resume_processing`].
    pub fn pause_processing(&mut self) {
        self.queue.pause();
    }

    pub fn resume_processing(&mut self) {
        self.queue.resume();
    }

    /// Runs queued actions in order until the queue is empty, including the
    /// ones they queue, then checks consistency.
    ///
    /// A failing action is logged and does not stop the others. Does nothing
    /// when paused or when called from inside a drain.
    pub fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.queue.begin_drain() {
            tracing::trace!(paused = self.queue.is_paused(), "drain refused");
            report.skipped = true;
            return report;
        }

        let mut first_pass = true;
        'batch: loop {
            while !self.queue.is_empty() {
                if report.executed >= self.config.max_actions_per_drain {
                    report.deferred = self.queue.len();
                    tracing::error!(
                        limit = self.config.max_actions_per_drain,
                        remaining = report.deferred,
                        "action limit reached, deferring the rest"
                    );
                    break 'batch;
                }
                let Some(action) = self.queue.pop() else {
                    break;
                };
                report.executed += 1;
                let seq = action.seq;
                if let Err(error) = self.execute(action.command) {
                    report.failed += 1;
                    tracing::error!(seq, %error, "deferred action failed");
                }
                self.pump();
            }

            if !self.config.verify_after_drain {
                break;
            }
            let pass = if first_pass {
                self.verify_consistency()
            } else {
                self.verify_links()
            };
            first_pass = false;
            report.consistency.merge(&pass);
            self.pump();
            if self.queue.is_empty() {
                break;
            }
        }

        self.queue.end_drain();
        tracing::debug!(
            executed = report.executed,
            failed = report.failed,
            deferred = report.deferred,
            "queue drained"
        );
        report
    }

    /// Applies one command.
    pub(crate) fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::NodeChanged { proxy, node } => {
                if self.proxies.get(proxy).and_then(|p| p.node) != Some(node) {
                    return Ok(());
                }
                self.on_change_node(proxy)
            }
            Command::NodeErased { proxy, node } => self.on_node_gone(proxy, node),
            Command::ElementAdded { container, node } => self.on_element_added(container, node),
            Command::ElementRemoved { node, .. } => match self.table.get(&node).copied() {
                Some(proxy) => self.on_node_gone(proxy, node),
                None => Ok(()),
            },
            Command::ArmObservers { proxy } => {
                self.arm_observers(proxy);
                Ok(())
            }
            Command::Paint { proxy } => {
                self.paint(proxy);
                Ok(())
            }
            Command::SelectionChanged { nodes } => {
                self.selection = nodes
                    .iter()
                    .filter_map(|n| self.proxy_for_node(*n))
                    .map(|k| self.proxies[k].handle)
                    .collect();
                Ok(())
            }
            Command::SettingsChanged { north_axis_degrees } => {
                self.model.set_north_axis(north_axis_degrees);
                tracing::debug!(north_axis_degrees, "north axis updated");
                Ok(())
            }
            Command::DomainChanged { handle } => self.on_domain_changed(handle),
        }
    }

    // --- Observer suppression ---

    /// Runs `f` with the given observers disabled. Callbacks the host raises
    /// meanwhile are collected before the observers come back, so they are
    /// dropped. Observers that were already disabled stay disabled.
    pub(crate) fn with_suppressed<R>(
        &mut self,
        observers: &[ObserverKey],
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let was_enabled: Vec<ObserverKey> = observers
            .iter()
            .copied()
            .filter(|&o| self.observers.disable(o))
            .collect();
        let result = f(self);
        self.pump();
        self.restore_observers(&was_enabled);
        result
    }

    /// Disables the observers of a proxy and all its descendants. Returns
    /// the ones that were enabled.
    pub fn suppress_observers(&mut self, key: ProxyKey) -> Vec<ObserverKey> {
        let mut was_enabled = Vec::new();
        for k in self.proxy_subtree(key) {
            let proxy = &self.proxies[k];
            let observers: Vec<ObserverKey> = proxy
                .observer
                .into_iter()
                .chain(proxy.collection_observer)
                .collect();
            for observer in observers {
                if self.observers.disable(observer) {
                    was_enabled.push(observer);
                }
            }
        }
        was_enabled
    }

    /// Re-enables observers returned by [`Self::suppress_observers`].
    pub fn restore_observers(&mut self, observers: &[ObserverKey]) {
        for &observer in observers {
            self.observers.enable(observer);
        }
    }

    fn arm_observers(&mut self, key: ProxyKey) {
        let Some(proxy) = self.proxies.get(key).filter(|p| p.is_live()) else {
            return;
        };
        let observers: Vec<ObserverKey> = proxy
            .observer
            .into_iter()
            .chain(proxy.collection_observer)
            .collect();
        self.restore_observers(&observers);
    }

    // --- Document lifecycle ---

    /// Attaches a model to the open document: nodes carrying a handle of the
    /// model are taken over, marked nodes whose object no longer exists are
    /// erased, and objects without a node are drawn. Observers are armed by
    /// the next drain.
    pub fn attach_model(&mut self, model: Model) -> Result<()> {
        self.teardown();
        self.install_document_observers();
        self.model = model;

        self.queue.pause();
        let result = self.attach_nodes();
        self.queue.resume();

        tracing::info!(
            objects = self.model.len(),
            proxies = self.proxies.len(),
            "model attached"
        );
        result
    }

    fn attach_nodes(&mut self) -> Result<()> {
        let root = self.host.root();

        let mut by_handle: FxHashMap<Handle, NodeId> = FxHashMap::default();
        let mut stray = Vec::new();
        let mut stack = self.host.children(root);
        while let Some(node) = stack.pop() {
            self.host.set_proxy_link(node, None);
            if let Some(handle) = self.host.model_handle(node) {
                if self.model.key_for(handle).is_none() || by_handle.contains_key(&handle) {
                    stray.push(node);
                    continue;
                }
                by_handle.insert(handle, node);
            }
            stack.extend(self.host.children(node));
        }

        let document: Vec<ObserverKey> = self
            .root_observer
            .into_iter()
            .chain(self.model_observer)
            .collect();
        let erased = self.with_suppressed(&document, |manager| {
            stray.iter().filter(|&&n| manager.host.erase(n)).count()
        });
        if erased > 0 {
            tracing::info!(erased, "erased nodes of objects missing from the model");
        }

        let mut objects: Vec<ObjectKey> = self.model.iter().map(|(k, _)| k).collect();
        objects.sort_by_key(|&k| self.model.get(k).map_or(usize::MAX, |o| o.kind.draw_order()));

        let mut created = Vec::new();
        for object in objects {
            let Some(data) = self.model.get(object) else {
                continue;
            };
            let (kind, handle, name) = (data.kind, data.handle, data.name.clone());
            let parent_handle = data.parent.and_then(|p| self.model.handle_of(p));

            let parent = match parent_handle {
                Some(h) => match self.by_object.get(&h).copied() {
                    Some(parent) => Some(parent),
                    None => {
                        self.errors
                            .add_warning(format!("{name} was not drawn because its parent is not drawn"));
                        continue;
                    }
                },
                None => None,
            };

            let existing = by_handle
                .get(&handle)
                .copied()
                .filter(|&n| self.host.node_kind(n) == Some(NodeKind::for_model(kind)));

            let drawn = match existing {
                Some(node) => self.attach_existing(object, node, parent),
                None => self.draw_object(object, false),
            };
            match drawn {
                Ok(key) => created.push(key),
                Err(error) => {
                    tracing::warn!(%handle, %error, "object not drawn");
                    self.errors.add_warning(format!("{name} could not be drawn: {error}"));
                }
            }
        }

        for proxy in created {
            self.queue.enqueue(Command::ArmObservers { proxy });
        }
        Ok(())
    }

    fn attach_existing(&mut self, object: ObjectKey, node: NodeId, parent: Option<ProxyKey>) -> Result<ProxyKey> {
        let data = self
            .model
            .get(object)
            .ok_or(bem_sketch_model::Error::ObjectNotFound(object))?;
        let (kind, handle, drawable) = (data.kind, data.handle, data.is_valid());

        let key = self.create_proxy(kind, node, parent, object, false)?;
        if kind.is_planar() && drawable {
            self.on_domain_changed(handle)?;
        } else {
            self.on_change_node(key)?;
        }
        Ok(key)
    }

    fn prepare_for_save(&mut self) {
        if self.queue.is_draining() {
            return;
        }
        let report = self.drain();
        if !report.consistency.is_clean() {
            tracing::warn!(?report, "model repaired before save");
        }
    }

    /// Brings the model up to date with the scene and returns it as JSON.
    pub fn on_pre_save(&mut self) -> Result<String> {
        self.pump();
        self.prepare_for_save();
        Ok(self.model.to_json()?)
    }

    /// Tears the document context down: observers are detached, links are
    /// cleared from the nodes and all proxies (erased ones included) and
    /// queued actions are dropped. Handles and markers stay on the nodes.
    pub fn close(&mut self) {
        self.teardown();
        tracing::info!("document closed");
    }

    fn teardown(&mut self) {
        for (observer, node, scope) in self.observers.destroy_all() {
            self.host.remove_observer(node, scope, observer);
        }
        for (&node, &key) in &self.table {
            if self.host.is_valid(node) && self.host.proxy_link(node) == Some(key) {
                self.host.set_proxy_link(node, None);
            }
        }
        self.proxies.clear();
        self.table.clear();
        self.by_object.clear();
        self.deleted_objects.clear();
        self.erased.clear();
        self.queue.clear();
        self.selection.clear();
        self.root_observer = None;
        self.model_observer = None;
    }

    /// Shows accumulated errors and warnings to the user.
    pub fn show_errors(&mut self) {
        self.errors.show(&mut self.host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use bem_sketch_model::ModelKind;

    fn manager() -> ModelManager<MemoryHost> {
        ModelManager::new(MemoryHost::new(), SyncConfig::default())
    }

    #[test]
    fn suppression_restores_only_what_was_enabled() {
        let mut manager = manager();
        let root_observer = manager.root_observer.unwrap();
        let model_observer = manager.model_observer.unwrap();
        manager.observers.disable(model_observer);

        let root = manager.host.root();
        manager.with_suppressed(&[root_observer, model_observer], |m| {
            m.host.add_group(root).unwrap();
        });

        assert!(manager.queue.is_empty());
        assert!(manager.observers.is_enabled(root_observer));
        assert!(!manager.observers.is_enabled(model_observer));
    }

    #[test]
    fn drain_inside_drain_is_refused() {
        let mut manager = manager();
        assert!(manager.queue.begin_drain());
        assert!(manager.drain().skipped);
        manager.queue.end_drain();
        assert!(!manager.drain().skipped);
    }

    #[test]
    fn loose_face_at_the_root_is_ignored() {
        let mut manager = manager();
        let root = manager.host.root();
        let face = manager
            .host
            .draw_face(root, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]])
            .unwrap();

        let report = manager.on_host_idle();
        assert_eq!(report.failed, 0);
        assert!(manager.host.is_valid(face));
        assert!(manager.model.is_empty());
        assert!(manager.host.messages().is_empty());
    }

    #[test]
    fn adopt_reports_instead_of_deleting() {
        let mut manager = manager();
        let root = manager.host.root();
        let space = manager.host.draw_group(root).unwrap();
        manager.on_host_idle();

        let space_proxy = manager.proxy_for_node(space).unwrap();
        let suppressed = manager.suppress_observers(space_proxy);
        let lamp = manager.host.draw_instance(space).unwrap();
        manager.pump();
        manager.restore_observers(&suppressed);

        assert!(matches!(
            manager.adopt(lamp),
            Err(crate::SyncError::NotClassifiable { .. })
        ));
        assert!(manager.host.is_valid(lamp));

        manager.host.set_type_marker(lamp, Some(ModelKind::Luminaire));
        let key = manager.adopt(lamp).unwrap();
        assert_eq!(manager.proxy(key).unwrap().kind(), ModelKind::Luminaire);
        assert!(matches!(
            manager.adopt(lamp),
            Err(crate::SyncError::AlreadyTracked { .. })
        ));
    }
}
