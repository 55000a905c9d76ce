// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BEM-Sketch Sync
//!
//! Keeps a [`bem_sketch_model::Model`] in step with the scene graph of a host
//! authoring application the engine does not control.
//!
//! ## Overview
//!
//! - **Drawing interfaces**: one proxy per tracked node, owning the model
//!   object it created and linked back from the node through a host attribute
//! - **Deferred queue**: host callbacks become [`Command`]s that run at host
//!   idle points, never inside the callback
//! - **Observers**: per node, per collection and per document; disabled
//!   around the engine's own edits so they do not echo back
//! - **Swap repair**: faces the host silently replaces with a twin keep their
//!   model object
//! - **Consistency pass**: after every drain each tracked node has exactly one
//!   live proxy and the other way round
//!
//! ## Quick Start
//!
//! ```rust
//! use bem_sketch_model::ModelKind;
//! use bem_sketch_sync::{Host, MemoryHost, ModelManager, SyncConfig};
//!
//! let mut manager = ModelManager::new(MemoryHost::new(), SyncConfig::default());
//!
//! let root = manager.host().root();
//! let space = manager.host_mut().draw_group(root).unwrap();
//! manager
//!     .host_mut()
//!     .draw_face(space, &[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 3.0, 0.0], [0.0, 3.0, 0.0]])
//!     .unwrap();
//!
//! manager.on_host_idle();
//!
//! assert_eq!(manager.model().count_of_kind(ModelKind::Space), 1);
//! assert_eq!(manager.model().count_of_kind(ModelKind::Surface), 1);
//! assert!(manager.is_consistent());
//! ```

pub mod classify;
pub mod config;
pub mod consistency;
pub mod error;
pub mod host;
pub mod interface;
pub mod keys;
pub mod manager;
pub mod memory;
pub mod messages;
pub mod observer;
pub mod queue;
pub mod swap;

pub use classify::{classify, AddedNode};
pub use config::SyncConfig;
pub use consistency::ConsistencyReport;
pub use error::{Result, SyncError};
pub use host::{Host, NodeKind, ObserverScope, RawCallback};
pub use interface::{DrawingInterface, ProxyState};
pub use keys::{NodeId, ObserverKey, ProxyKey};
pub use manager::{DrainReport, ModelManager};
pub use memory::{MemoryHost, SwapOrder};
pub use messages::{ErrorLog, LogEntry, Severity};
pub use observer::{Observer, ObserverRegistry, ObserverTarget};
pub use queue::{Command, DeferredAction, DeferredEventQueue};
