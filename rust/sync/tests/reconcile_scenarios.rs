// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use bem_sketch_model::{Handle, Model, ModelKind, ObjectKey, Polygon};
use bem_sketch_sync::{
    Command, Host, MemoryHost, ModelManager, NodeId, NodeKind, ProxyKey, ProxyState, SwapOrder,
    SyncConfig,
};
use nalgebra::Vector3;

const FLOOR: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [6.0, 0.0, 0.0],
    [6.0, 4.0, 0.0],
    [0.0, 4.0, 0.0],
];

const WALL: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [6.0, 0.0, 0.0],
    [6.0, 0.0, 3.0],
    [0.0, 0.0, 3.0],
];

/// The wall with an extra vertex on its bottom edge, as left by a split.
const WALL_SPLIT: [[f64; 3]; 5] = [
    [0.0, 0.0, 0.0],
    [3.0, 0.0, 0.0],
    [6.0, 0.0, 0.0],
    [6.0, 0.0, 3.0],
    [0.0, 0.0, 3.0],
];

const FLOOR_WEST: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [3.0, 0.0, 0.0],
    [3.0, 4.0, 0.0],
    [0.0, 4.0, 0.0],
];

const FLOOR_EAST: [[f64; 3]; 4] = [
    [3.0, 0.0, 0.0],
    [6.0, 0.0, 0.0],
    [6.0, 4.0, 0.0],
    [3.0, 4.0, 0.0],
];

const WINDOW: [[f64; 3]; 4] = [
    [1.0, 0.0, 1.0],
    [2.0, 0.0, 1.0],
    [2.0, 0.0, 2.0],
    [1.0, 0.0, 2.0],
];

struct Office {
    manager: ModelManager<MemoryHost>,
    space: NodeId,
    floor: NodeId,
    wall: NodeId,
}

impl Office {
    fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    fn with_config(config: SyncConfig) -> Self {
        let mut manager = ModelManager::new(MemoryHost::new(), config);
        let root = manager.host().root();
        let space = manager.host_mut().draw_group(root).unwrap();
        let floor = manager.host_mut().draw_face(space, &FLOOR).unwrap();
        let wall = manager.host_mut().draw_face(space, &WALL).unwrap();

        let report = manager.on_host_idle();
        assert_eq!(report.failed, 0);
        assert!(manager.is_consistent());

        Self {
            manager,
            space,
            floor,
            wall,
        }
    }

    fn proxy(&self, node: NodeId) -> ProxyKey {
        self.manager.proxy_for_node(node).expect("node is tracked")
    }

    fn object(&self, node: NodeId) -> ObjectKey {
        let proxy = self.proxy(node);
        self.manager.proxy(proxy).unwrap().object().unwrap()
    }

    fn handle(&self, node: NodeId) -> Handle {
        self.manager.model().handle_of(self.object(node)).unwrap()
    }

    fn handle_on_host(&self, node: NodeId) -> Handle {
        self.manager.host().model_handle(node).unwrap()
    }

    fn surfaces(&self) -> usize {
        self.manager.model().count_of_kind(ModelKind::Surface)
    }

    fn idle(&mut self) {
        let report = self.manager.on_host_idle();
        assert_eq!(report.failed, 0, "{report:?}");
        assert!(self.manager.is_consistent());
    }
}

#[test]
fn drawing_a_space_creates_model_objects() {
    let office = Office::new();
    let model = office.manager.model();

    assert_eq!(model.count_of_kind(ModelKind::Space), 1);
    assert_eq!(office.surfaces(), 2);

    let space = office.object(office.space);
    let floor = office.object(office.floor);
    assert_eq!(model.get(floor).unwrap().parent, Some(space));
    assert_relative_eq!(model.get(floor).unwrap().polygon.area(), 24.0, epsilon = 1e-9);
    assert_eq!(
        office.manager.host().model_handle(office.floor),
        model.handle_of(floor)
    );
    assert_eq!(
        office.manager.host().type_marker(office.floor),
        Some(ModelKind::Surface)
    );
}

#[test]
fn every_tracked_node_has_one_proxy_after_each_batch() {
    let mut office = Office::new();

    let copy = office
        .manager
        .host_mut()
        .copy_paste(office.wall, office.space, Vector3::new(0.0, 1.0, 0.0))
        .unwrap();
    office.idle();
    office.manager.host_mut().user_erase(office.floor);
    office.idle();

    let tracked: Vec<_> = office.manager.tracked_nodes().collect();
    let live: Vec<_> = office.manager.live_proxies().collect();
    assert_eq!(tracked.len(), live.len());
    for (node, proxy) in tracked {
        assert_eq!(office.manager.host().proxy_link(node), Some(proxy));
        assert_eq!(office.manager.proxy(proxy).unwrap().node(), Some(node));
    }
    assert_ne!(office.proxy(copy), office.proxy(office.wall));
}

#[test]
fn erasing_a_proxy_twice_is_the_same_as_once() {
    let mut office = Office::new();
    let wall = office.proxy(office.wall);

    office.manager.on_erase_node(wall).unwrap();
    let objects = office.manager.model().len();
    let tracked = office.manager.tracked_nodes().count();

    office.manager.on_erase_node(wall).unwrap();
    assert_eq!(office.manager.model().len(), objects);
    assert_eq!(office.manager.tracked_nodes().count(), tracked);
    assert_eq!(
        office.manager.proxy(wall).unwrap().state(),
        ProxyState::Erased
    );
    assert_eq!(office.manager.host().proxy_link(office.wall), None);
}

#[test]
fn work_queued_during_a_drain_runs_in_the_same_drain() {
    let mut manager = ModelManager::new(MemoryHost::new(), SyncConfig::default());
    let root = manager.host().root();
    let space = manager.host_mut().draw_group(root).unwrap();
    let window_wall = manager.host_mut().draw_face(space, &WALL).unwrap();
    manager.host_mut().draw_face(window_wall, &WINDOW).unwrap();

    // Only the group's add reaches an observer; the faces are found by the
    // actions the group's adoption queues.
    manager.pump();
    assert_eq!(manager.queue().len(), 1);

    let report = manager.on_host_idle();
    assert!(report.executed > 1);
    assert!(manager.queue().is_empty());
    assert_eq!(manager.model().count_of_kind(ModelKind::Surface), 1);
    assert_eq!(manager.model().count_of_kind(ModelKind::SubSurface), 1);
    assert!(manager.is_consistent());
}

#[test]
fn swapped_face_keeps_its_model_object() {
    for order in [SwapOrder::EraseFirst, SwapOrder::AddFirst] {
        let mut office = Office::new();
        let proxy = office.proxy(office.wall);
        let object = office.object(office.wall);
        let handle = office.handle(office.wall);

        let twin = office
            .manager
            .host_mut()
            .swap_face(office.wall, &WALL_SPLIT, false, order)
            .unwrap();
        office.idle();

        assert_eq!(office.proxy(twin), proxy, "{order:?}");
        assert_eq!(office.object(twin), object);
        assert_eq!(office.handle(twin), handle);
        assert_eq!(office.surfaces(), 2);
        assert_eq!(
            office.manager.model().get(object).unwrap().polygon.len(),
            5
        );
        assert_eq!(office.manager.host().proxy_link(twin), Some(proxy));
    }
}

#[test]
fn swap_carries_openings_along() {
    let mut office = Office::new();
    let window = office.manager.host_mut().draw_face(office.wall, &WINDOW).unwrap();
    office.idle();
    let window_object = office.object(window);

    let twin = office
        .manager
        .host_mut()
        .swap_face(office.wall, &WALL_SPLIT, true, SwapOrder::EraseFirst)
        .unwrap();
    office.idle();

    assert_eq!(office.object(window), window_object);
    assert_eq!(office.manager.host().parent(window), Some(twin));
    assert_eq!(
        office.manager.model().get(window_object).unwrap().parent,
        Some(office.object(twin))
    );
    assert_eq!(office.manager.model().count_of_kind(ModelKind::SubSurface), 1);
}

#[test]
fn redrawn_identical_face_keeps_the_original_handle() {
    let mut office = Office::new();
    let handle = office.handle(office.wall);

    office.manager.host_mut().user_erase(office.wall);
    let redrawn = office.manager.host_mut().draw_face(office.space, &WALL).unwrap();
    office.idle();

    assert_eq!(office.handle(redrawn), handle);
    assert_eq!(office.surfaces(), 2);
}

#[test]
fn disallowed_node_is_removed_without_model_object() {
    let mut office = Office::new();
    let root = office.manager.host().root();
    let objects = office.manager.model().len();

    let sensor = office
        .manager
        .host_mut()
        .paste_foreign(root, NodeKind::Instance, ModelKind::DaylightingControl, &[])
        .unwrap();
    office.idle();

    assert!(!office.manager.host().is_valid(sensor));
    assert_eq!(office.manager.model().len(), objects);
    assert!(office.manager.errors().has_errors());
}

#[test]
fn shading_surface_pasted_into_a_space_is_rejected() {
    let mut office = Office::new();
    let surfaces = office.surfaces();

    let shade = office
        .manager
        .host_mut()
        .paste_foreign(
            office.space,
            NodeKind::Face,
            ModelKind::ShadingSurface,
            &[[0.0, 0.0, 3.0], [6.0, 0.0, 3.0], [6.0, -1.0, 3.0], [0.0, -1.0, 3.0]],
        )
        .unwrap();
    office.idle();

    assert!(!office.manager.host().is_valid(shade));
    assert_eq!(office.surfaces(), surfaces);
    assert_eq!(office.manager.model().count_of_kind(ModelKind::ShadingSurface), 0);
    assert_eq!(office.manager.host().messages().len(), 1);
    assert!(office.manager.host().messages()[0].contains("Shading Surface"));
}

#[test]
fn suppressed_observers_queue_nothing() {
    let mut office = Office::new();
    let space = office.proxy(office.space);

    let suppressed = office.manager.suppress_observers(space);
    assert!(!suppressed.is_empty());
    office
        .manager
        .host_mut()
        .move_vertices(office.floor, Vector3::new(0.0, 0.0, 0.5))
        .unwrap();
    office.manager.host_mut().draw_face(office.space, &FLOOR_EAST).unwrap();
    office.manager.pump();
    office.manager.restore_observers(&suppressed);
    office.manager.pump();

    assert!(office.manager.queue().is_empty());
    for observer in suppressed {
        assert!(office.manager.observers().is_enabled(observer));
    }
}

#[test]
fn undo_restores_the_same_handle() {
    let mut office = Office::new();
    let handle = office.handle(office.wall);
    let proxy = office.proxy(office.wall);

    office.manager.host_mut().user_erase(office.wall);
    office.idle();
    assert_eq!(office.surfaces(), 1);
    assert_eq!(office.manager.proxy(proxy).unwrap().state(), ProxyState::Erased);

    let restored = office.manager.host_mut().undo_erase().unwrap();
    office.idle();

    assert_eq!(office.proxy(restored), proxy);
    assert_eq!(office.handle(restored), handle);
    assert_eq!(office.surfaces(), 2);
}

#[test]
fn oldest_erased_proxies_are_forgotten_past_the_limit() {
    let mut office = Office::with_config(SyncConfig {
        max_erased_retained: 1,
        ..SyncConfig::default()
    });
    let wall = office.proxy(office.wall);
    let floor = office.proxy(office.floor);
    let floor_handle = office.handle(office.floor);

    office.manager.host_mut().user_erase(office.wall);
    office.idle();
    office.manager.host_mut().user_erase(office.floor);
    office.idle();

    assert!(office.manager.proxy(wall).is_none());
    assert_eq!(office.manager.proxy(floor).unwrap().state(), ProxyState::Erased);

    let restored = office.manager.host_mut().undo_erase().unwrap();
    office.idle();
    assert_eq!(office.proxy(restored), floor);
    assert_eq!(office.handle(restored), floor_handle);

    // The wall's stash went with its proxy: undo gives it a new object.
    let restored = office.manager.host_mut().undo_erase().unwrap();
    office.idle();
    assert_eq!(office.surfaces(), 2);
    assert_ne!(office.proxy(restored), wall);
}

#[test]
fn undo_of_a_space_restores_its_surfaces() {
    let mut office = Office::new();
    let handles = [
        office.handle(office.space),
        office.handle(office.floor),
        office.handle(office.wall),
    ];

    office.manager.host_mut().user_erase(office.space);
    office.idle();
    assert!(office.manager.model().is_empty());

    let restored = office.manager.host_mut().undo_erase().unwrap();
    office.idle();

    assert_eq!(office.handle(restored), handles[0]);
    let faces = office.manager.host().children(restored);
    let mut restored_handles: Vec<Handle> = faces.iter().map(|&f| office.handle(f)).collect();
    restored_handles.sort();
    let mut expected = handles[1..].to_vec();
    expected.sort();
    assert_eq!(restored_handles, expected);

    let space = office.object(restored);
    for face in faces {
        assert_eq!(
            office.manager.model().get(office.object(face)).unwrap().parent,
            Some(space)
        );
    }
}

#[test]
fn divide_keeps_the_original_and_adds_one_object() {
    let mut office = Office::new();
    let object = office.object(office.floor);
    let handle = office.handle(office.floor);

    let offcut = office
        .manager
        .host_mut()
        .divide_face(office.floor, &FLOOR_WEST, &FLOOR_EAST)
        .unwrap();
    office.idle();

    assert_eq!(office.surfaces(), 3);
    assert_eq!(office.object(office.floor), object);
    assert_eq!(office.handle(office.floor), handle);
    assert_ne!(office.handle(offcut), handle);

    let model = office.manager.model();
    assert_relative_eq!(model.get(object).unwrap().polygon.area(), 12.0, epsilon = 1e-9);
    assert_relative_eq!(
        model.get(office.object(offcut)).unwrap().polygon.area(),
        12.0,
        epsilon = 1e-9
    );
}

#[test]
fn copied_space_gets_new_objects() {
    let mut office = Office::new();
    let root = office.manager.host().root();
    let originals = [
        office.object(office.space),
        office.object(office.floor),
        office.object(office.wall),
    ];
    let floor_polygon = office.manager.model().get(originals[1]).unwrap().polygon.clone();

    let copy = office
        .manager
        .host_mut()
        .copy_paste(office.space, root, Vector3::new(10.0, 0.0, 0.0))
        .unwrap();
    office.idle();

    let model = office.manager.model();
    assert_eq!(model.count_of_kind(ModelKind::Space), 2);
    assert_eq!(model.count_of_kind(ModelKind::Surface), 4);
    assert!(!office.manager.host().is_shared(copy));

    let copied_space = office.object(copy);
    assert!(!originals.contains(&copied_space));
    for face in office.manager.host().children(copy) {
        let object = office.object(face);
        assert!(!originals.contains(&object));
        assert_eq!(model.get(object).unwrap().parent, Some(copied_space));
    }

    assert_eq!(office.object(office.floor), originals[1]);
    assert_eq!(model.get(originals[1]).unwrap().polygon, floor_polygon);
    assert_eq!(model.children(originals[0]).len(), 2);
}

#[test]
fn copy_within_the_same_space_is_not_a_divide() {
    let mut office = Office::new();

    let copy = office
        .manager
        .host_mut()
        .copy_paste(office.wall, office.space, Vector3::new(0.0, 4.0, 0.0))
        .unwrap();
    office.idle();

    assert_eq!(office.surfaces(), 3);
    assert_ne!(office.object(copy), office.object(office.wall));
}

#[test]
fn paused_queue_does_not_drain() {
    let mut manager = ModelManager::new(MemoryHost::new(), SyncConfig::default());
    let root = manager.host().root();
    manager.pause_processing();
    manager.host_mut().draw_group(root).unwrap();

    let report = manager.on_host_idle();
    assert!(report.skipped);
    assert_eq!(report.executed, 0);
    assert_eq!(manager.queue().len(), 1);
    assert!(manager.model().is_empty());

    manager.resume_processing();
    let report = manager.on_host_idle();
    assert!(!report.skipped);
    assert_eq!(manager.model().count_of_kind(ModelKind::Space), 1);
}

#[test]
fn failing_action_does_not_stop_the_rest() {
    let mut manager = ModelManager::new(MemoryHost::new(), SyncConfig::default());
    let root = manager.host().root();
    manager.enqueue(Command::DomainChanged {
        handle: Handle::new(),
    });
    manager.host_mut().draw_group(root).unwrap();

    let report = manager.on_host_idle();
    assert_eq!(report.failed, 1);
    assert_eq!(manager.model().count_of_kind(ModelKind::Space), 1);
    assert!(manager.queue().is_empty());
}

#[test]
fn action_limit_defers_the_rest() {
    let config = SyncConfig {
        max_actions_per_drain: 1,
        ..SyncConfig::default()
    };
    let mut manager = ModelManager::new(MemoryHost::new(), config);
    let root = manager.host().root();
    let space = manager.host_mut().draw_group(root).unwrap();
    manager.host_mut().draw_face(space, &FLOOR).unwrap();

    let report = manager.on_host_idle();
    assert_eq!(report.executed, 1);
    assert_eq!(report.deferred, 2);
    assert_eq!(manager.queue().len(), 2);
}

#[test]
fn lost_erase_is_caught_by_the_consistency_pass() {
    let mut office = Office::new();
    let space = office.proxy(office.space);

    let suppressed = office.manager.suppress_observers(space);
    office.manager.host_mut().user_erase(office.wall);
    office.manager.pump();
    office.manager.restore_observers(&suppressed);

    let report = office.manager.on_host_idle();
    assert_eq!(report.consistency.discarded, 1);
    assert_eq!(office.surfaces(), 1);
    assert!(office.manager.is_consistent());
}

#[test]
fn lost_swap_is_repaired_by_the_consistency_pass() {
    let mut office = Office::new();
    let object = office.object(office.wall);
    let space = office.proxy(office.space);

    let suppressed = office.manager.suppress_observers(space);
    let twin = office
        .manager
        .host_mut()
        .swap_face(office.wall, &WALL_SPLIT, false, SwapOrder::EraseFirst)
        .unwrap();
    office.manager.pump();
    office.manager.restore_observers(&suppressed);

    let report = office.manager.on_host_idle();
    assert_eq!(report.consistency.repaired, 1);
    assert_eq!(office.object(twin), object);
    assert!(office.manager.is_consistent());
}

#[test]
fn silently_added_marked_node_is_adopted() {
    let mut office = Office::new();
    let space = office.proxy(office.space);

    let suppressed = office.manager.suppress_observers(space);
    let pasted = office
        .manager
        .host_mut()
        .paste_foreign(office.space, NodeKind::Face, ModelKind::Surface, &FLOOR_EAST)
        .unwrap();
    office.manager.pump();
    office.manager.restore_observers(&suppressed);

    let report = office.manager.on_host_idle();
    assert_eq!(report.consistency.adopted, 1);
    assert_eq!(office.surfaces(), 3);
    assert!(office.manager.proxy_for_node(pasted).is_some());
}

#[test]
fn moved_face_changes_model_parent() {
    let mut office = Office::new();
    let root = office.manager.host().root();
    let other = office.manager.host_mut().draw_group(root).unwrap();
    office.idle();

    office.manager.host_mut().move_node(office.wall, other).unwrap();
    office.idle();

    let wall = office.object(office.wall);
    assert_eq!(
        office.manager.model().get(wall).unwrap().parent,
        Some(office.object(other))
    );
    assert_eq!(office.manager.model().children(office.object(office.space)).len(), 1);
}

#[test]
fn space_moved_into_a_space_is_rejected() {
    let mut office = Office::new();
    let root = office.manager.host().root();
    let annex = office.manager.host_mut().draw_group(root).unwrap();
    let annex_floor = office.manager.host_mut().draw_face(annex, &FLOOR_EAST).unwrap();
    office.idle();
    let annex_proxy = office.proxy(annex);
    let annex_object = office.object(annex);
    let annex_floor_object = office.object(annex_floor);

    office.manager.host_mut().move_node(annex, office.space).unwrap();
    office.idle();

    assert!(!office.manager.host().is_valid(annex));
    assert_eq!(
        office.manager.proxy(annex_proxy).unwrap().state(),
        ProxyState::Erased
    );
    assert!(!office.manager.model().contains(annex_object));
    assert!(!office.manager.model().contains(annex_floor_object));
    assert_eq!(office.manager.model().count_of_kind(ModelKind::Space), 1);
    assert_eq!(office.surfaces(), 2);
    assert!(office.manager.errors().has_errors());
    assert_eq!(office.manager.host().messages().len(), 1);
    assert!(office.manager.host().messages()[0].contains("Space cannot be placed in Space"));
}

#[test]
fn zero_area_face_gets_no_model_object() {
    let mut office = Office::new();
    let sliver = office
        .manager
        .host_mut()
        .draw_face(
            office.space,
            &[[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [6.0, 0.0, 0.0]],
        )
        .unwrap();
    office.idle();

    assert!(office.manager.host().is_valid(sliver));
    assert!(office.manager.proxy_for_node(sliver).is_none());
    assert_eq!(office.manager.host().type_marker(sliver), None);
    assert_eq!(office.surfaces(), 2);
    assert!(!office.manager.errors().has_errors());
}

#[test]
fn face_flattened_to_zero_area_keeps_its_last_polygon() {
    let mut office = Office::new();
    let floor = office.proxy(office.floor);
    let object = office.object(office.floor);

    office
        .manager
        .host_mut()
        .set_boundary(
            office.floor,
            &Polygon::from_coords(&[[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [6.0, 0.0, 0.0]]),
        )
        .unwrap();
    office.idle();

    assert!(!office.manager.valid_entity(floor));
    assert_eq!(office.object(office.floor), object);
    let polygon = &office.manager.model().get(object).unwrap().polygon;
    assert_relative_eq!(polygon.area(), 24.0, epsilon = 1e-9);
}

#[test]
fn first_of_several_twins_takes_over_the_erased_face() {
    let mut office = Office::new();
    let proxy = office.proxy(office.wall);
    let object = office.object(office.wall);
    let space = office.proxy(office.space);

    // Two untracked twins drawn while nothing is watching.
    let suppressed = office.manager.suppress_observers(space);
    let first = office.manager.host_mut().draw_face(office.space, &WALL_SPLIT).unwrap();
    let second = office.manager.host_mut().draw_face(office.space, &WALL).unwrap();
    office.manager.pump();
    office.manager.restore_observers(&suppressed);
    assert!(office.manager.queue().is_empty());

    office.manager.host_mut().user_erase(office.wall);
    office.idle();

    assert_eq!(office.proxy(first), proxy);
    assert_eq!(office.object(first), object);
    assert_eq!(office.manager.model().get(object).unwrap().polygon.len(), 5);
    assert!(office.manager.proxy_for_node(second).is_none());
    assert_eq!(office.surfaces(), 2);
}

#[test]
fn tracked_sibling_is_never_taken_as_a_twin() {
    let mut office = Office::new();
    let wall = office.proxy(office.wall);
    let wall_object = office.object(office.wall);

    let sibling = office.manager.host_mut().draw_face(office.space, &WALL_SPLIT).unwrap();
    office.idle();
    let sibling_proxy = office.proxy(sibling);
    let sibling_object = office.object(sibling);
    assert_ne!(sibling_proxy, wall);
    assert_eq!(office.surfaces(), 3);

    office.manager.host_mut().user_erase(office.wall);
    office.idle();

    assert_eq!(office.manager.proxy(wall).unwrap().state(), ProxyState::Erased);
    assert!(!office.manager.model().contains(wall_object));
    assert_eq!(office.proxy(sibling), sibling_proxy);
    assert_eq!(office.object(sibling), sibling_object);
    assert_eq!(office.surfaces(), 2);
}

#[test]
fn vertex_moves_update_the_model() {
    let mut office = Office::new();
    office
        .manager
        .host_mut()
        .move_vertices(office.floor, Vector3::new(0.0, 0.0, 2.5))
        .unwrap();
    office.idle();

    let polygon = &office.manager.model().get(office.object(office.floor)).unwrap().polygon;
    for point in polygon.to_coords() {
        assert_relative_eq!(point[2], 2.5, epsilon = 1e-12);
    }
}

#[test]
fn domain_side_objects_are_drawn() {
    let mut manager = ModelManager::new(MemoryHost::new(), SyncConfig::default());
    let space = manager.model_mut().create(ModelKind::Space, None).unwrap();
    let surface = manager
        .model_mut()
        .create(ModelKind::Surface, Some(space))
        .unwrap();
    manager
        .model_mut()
        .set_polygon(surface, Polygon::from_coords(&FLOOR))
        .unwrap();

    let space_proxy = manager.draw(space).unwrap();
    let surface_proxy = manager.draw(surface).unwrap();
    let report = manager.on_host_idle();
    assert_eq!(report.failed, 0);
    assert!(manager.is_consistent());

    let group = manager.proxy(space_proxy).unwrap().node().unwrap();
    let face = manager.proxy(surface_proxy).unwrap().node().unwrap();
    assert_eq!(manager.host().parent(face), Some(group));
    assert_eq!(manager.model().len(), 2);

    manager
        .set_object_vertices(surface, Polygon::from_coords(&FLOOR_WEST))
        .unwrap();
    manager.on_host_idle();
    let boundary = manager.host().boundary(face).unwrap();
    assert_relative_eq!(boundary.area(), 12.0, epsilon = 1e-9);
    assert_eq!(manager.model().len(), 2);
    assert!(manager.host().paint_count(face) >= 1);
}

#[test]
fn detach_removes_node_and_objects() {
    let mut office = Office::new();
    let space = office.proxy(office.space);

    office.manager.detach(space).unwrap();
    office.idle();

    assert!(!office.manager.host().is_valid(office.space));
    assert!(!office.manager.host().is_valid(office.floor));
    assert!(office.manager.model().is_empty());
    assert!(office.manager.proxy(space).is_none());
}

#[test]
fn attach_model_reuses_marked_nodes_and_draws_missing_ones() {
    let mut office = Office::new();
    let json = office.manager.on_pre_save().unwrap();
    let wall_handle = office.handle(office.wall);

    // A node whose object is not in the saved model.
    let stray = office
        .manager
        .host_mut()
        .paste_foreign(office.space, NodeKind::Face, ModelKind::Surface, &FLOOR_EAST)
        .unwrap();
    office.manager.host_mut().set_model_handle(stray, Some(Handle::new()));
    office.manager.close();

    let mut model = Model::from_json(&json).unwrap();
    let space = model.key_for(office.handle_on_host(office.space)).unwrap();
    let extra = model.create(ModelKind::Surface, Some(space)).unwrap();
    model
        .set_polygon(extra, Polygon::from_coords(&FLOOR_EAST))
        .unwrap();

    office.manager.attach_model(model).unwrap();
    office.idle();

    assert!(!office.manager.host().is_valid(stray));
    assert_eq!(office.surfaces(), 3);
    assert_eq!(office.handle(office.wall), wall_handle);
    assert_eq!(office.manager.host().children(office.space).len(), 3);

    // Observers are armed again: a swap is still repaired.
    let object = office.object(office.wall);
    let twin = office
        .manager
        .host_mut()
        .swap_face(office.wall, &WALL_SPLIT, false, SwapOrder::EraseFirst)
        .unwrap();
    office.idle();
    assert_eq!(office.object(twin), object);
}

#[test]
fn document_callbacks_reach_the_model() {
    let mut office = Office::new();

    office.manager.host_mut().set_north_axis(30.0);
    office.manager.host_mut().select(vec![office.floor, office.wall]);
    office.idle();

    assert_relative_eq!(office.manager.model().north_axis(), 30.0);
    assert_eq!(
        office.manager.selection(),
        &[office.handle(office.floor), office.handle(office.wall)]
    );
}

#[test]
fn pre_save_callback_drains_the_queue() {
    let mut manager = ModelManager::new(MemoryHost::new(), SyncConfig::default());
    let root = manager.host().root();
    manager.host_mut().draw_group(root).unwrap();
    manager.host_mut().save();

    manager.pump();
    assert!(manager.queue().is_empty());
    assert_eq!(manager.model().count_of_kind(ModelKind::Space), 1);
}

#[test]
fn close_releases_nodes_and_observers() {
    let mut office = Office::new();
    office.manager.host_mut().close_document();
    office.manager.pump();

    assert_eq!(office.manager.proxies().count(), 0);
    assert!(office.manager.observers().is_empty());
    assert_eq!(office.manager.host().proxy_link(office.wall), None);
    assert_eq!(office.manager.host().observer_count(office.space), 0);
    assert!(office.manager.host().model_handle(office.wall).is_some());
}
