// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: replay a script of user edits against an in-memory host and
//! print the reconciled model as JSON.
//!
//! Usage:
//!   bem-sketch-replay <script.json>
//!
//! A script is `{ "config": {...}, "steps": [...] }`. Nodes created by a step
//! are given a label that later steps refer to; `root` is predefined. See
//! `scenarios/` for samples.

use std::env;
use std::fs;

use anyhow::{bail, Context};
use bem_sketch_model::ModelKind;
use bem_sketch_sync::{Host, MemoryHost, ModelManager, NodeId, NodeKind, SwapOrder, SyncConfig};
use nalgebra::Vector3;
use rustc_hash::FxHashMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Script {
    config: Option<SyncConfig>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    DrawGroup {
        label: String,
        container: String,
    },
    DrawFace {
        label: String,
        container: String,
        points: Vec<[f64; 3]>,
    },
    DrawInstance {
        label: String,
        container: String,
    },
    Erase {
        node: String,
    },
    Undo {
        label: Option<String>,
    },
    Swap {
        node: String,
        label: String,
        points: Vec<[f64; 3]>,
        #[serde(default)]
        carry_link: bool,
        #[serde(default = "erase_first")]
        order: SwapOrder,
    },
    Divide {
        node: String,
        label: String,
        keep: Vec<[f64; 3]>,
        offcut: Vec<[f64; 3]>,
    },
    Copy {
        node: String,
        label: String,
        container: String,
        offset: [f64; 3],
    },
    PasteForeign {
        label: String,
        container: String,
        kind: NodeKind,
        marker: ModelKind,
        #[serde(default)]
        points: Vec<[f64; 3]>,
    },
    MoveVertices {
        node: String,
        offset: [f64; 3],
    },
    MoveNode {
        node: String,
        container: String,
    },
    NorthAxis {
        degrees: f64,
    },
    Idle,
}

fn erase_first() -> SwapOrder {
    SwapOrder::EraseFirst
}

struct Replay {
    manager: ModelManager<MemoryHost>,
    labels: FxHashMap<String, NodeId>,
}

impl Replay {
    fn new(config: SyncConfig) -> Self {
        let manager = ModelManager::new(MemoryHost::new(), config);
        let mut labels = FxHashMap::default();
        labels.insert("root".to_string(), manager.host().root());
        Self { manager, labels }
    }

    fn node(&self, label: &str) -> anyhow::Result<NodeId> {
        match self.labels.get(label) {
            Some(&node) => Ok(node),
            None => bail!("unknown node label '{label}'"),
        }
    }

    fn run(&mut self, index: usize, step: Step) -> anyhow::Result<()> {
        tracing::debug!(index, ?step, "step");
        match step {
            Step::DrawGroup { label, container } => {
                let container = self.node(&container)?;
                let node = self.manager.host_mut().draw_group(container)?;
                self.labels.insert(label, node);
            }
            Step::DrawFace {
                label,
                container,
                points,
            } => {
                let container = self.node(&container)?;
                let node = self.manager.host_mut().draw_face(container, &points)?;
                self.labels.insert(label, node);
            }
            Step::DrawInstance { label, container } => {
                let container = self.node(&container)?;
                let node = self.manager.host_mut().draw_instance(container)?;
                self.labels.insert(label, node);
            }
            Step::Erase { node } => {
                let node = self.node(&node)?;
                if !self.manager.host_mut().user_erase(node) {
                    tracing::warn!(index, node = %node, "nothing to erase");
                }
            }
            Step::Undo { label } => match self.manager.host_mut().undo_erase() {
                Some(node) => {
                    if let Some(label) = label {
                        self.labels.insert(label, node);
                    }
                }
                None => tracing::warn!(index, "nothing to undo"),
            },
            Step::Swap {
                node,
                label,
                points,
                carry_link,
                order,
            } => {
                let node = self.node(&node)?;
                let twin = self
                    .manager
                    .host_mut()
                    .swap_face(node, &points, carry_link, order)?;
                self.labels.insert(label, twin);
            }
            Step::Divide {
                node,
                label,
                keep,
                offcut,
            } => {
                let node = self.node(&node)?;
                let piece = self.manager.host_mut().divide_face(node, &keep, &offcut)?;
                self.labels.insert(label, piece);
            }
            Step::Copy {
                node,
                label,
                container,
                offset,
            } => {
                let (node, container) = (self.node(&node)?, self.node(&container)?);
                let offset = Vector3::new(offset[0], offset[1], offset[2]);
                let copy = self.manager.host_mut().copy_paste(node, container, offset)?;
                self.labels.insert(label, copy);
            }
            Step::PasteForeign {
                label,
                container,
                kind,
                marker,
                points,
            } => {
                let container = self.node(&container)?;
                let node = self
                    .manager
                    .host_mut()
                    .paste_foreign(container, kind, marker, &points)?;
                self.labels.insert(label, node);
            }
            Step::MoveVertices { node, offset } => {
                let node = self.node(&node)?;
                let offset = Vector3::new(offset[0], offset[1], offset[2]);
                self.manager.host_mut().move_vertices(node, offset)?;
            }
            Step::MoveNode { node, container } => {
                let (node, container) = (self.node(&node)?, self.node(&container)?);
                self.manager.host_mut().move_node(node, container)?;
            }
            Step::NorthAxis { degrees } => self.manager.host_mut().set_north_axis(degrees),
            Step::Idle => {
                let report = self.manager.on_host_idle();
                tracing::info!(
                    index,
                    executed = report.executed,
                    failed = report.failed,
                    repaired = report.consistency.repaired,
                    "host idle"
                );
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,bem_sketch_sync=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 || args[1] == "--help" || args[1] == "-h" {
        eprintln!("Usage: bem-sketch-replay <script.json>");
        std::process::exit(2);
    }

    let text = fs::read_to_string(&args[1]).with_context(|| format!("reading {}", args[1]))?;
    let script: Script = serde_json::from_str(&text).context("parsing replay script")?;

    let mut replay = Replay::new(script.config.unwrap_or_else(SyncConfig::from_env));
    for (index, step) in script.steps.into_iter().enumerate() {
        replay
            .run(index, step)
            .with_context(|| format!("step {index}"))?;
    }

    let json = replay.manager.on_pre_save()?;
    if replay.manager.errors().unviewed() {
        replay.manager.show_errors();
        for message in replay.manager.host().messages() {
            eprintln!("{message}");
        }
    }
    tracing::info!(
        objects = replay.manager.model().len(),
        consistent = replay.manager.is_consistent(),
        "replay finished"
    );
    println!("{json}");
    Ok(())
}
