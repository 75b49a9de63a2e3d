//! Generic prerequisite graph for quests and achievements.
//!
//! `DependencyGraph` holds immutable [`NodeDef`] content plus each node's
//! lifecycle state and objective counters:
//!
//! ```text
//! Locked ──► Available ──► Active ──► Completed
//!                            │
//!                            └──────► Failed
//! ```
//!
//! Transitions only move forward. A node becomes `Available` once every
//! prerequisite is `Completed`. A reward's `next` id is folded into the
//! target's prerequisite list at construction, so a linear story arc is
//! just a chain of single-predecessor edges and needs no special casing.
//!
//! Rewards are queued exactly once, on the first successful
//! [`DependencyGraph::check_completion`], and handed to the caller through
//! [`DependencyGraph::take_rewards`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::{Attribute, StatModel};

/// One countable sub-goal of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub target: u32,
    #[serde(default)]
    pub description: String,
}

/// What a completed node grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    #[serde(default)]
    pub resources: BTreeMap<String, u64>,
    #[serde(default)]
    pub attributes: BTreeMap<Attribute, u32>,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Node to unlock immediately on completion (story chaining).
    #[serde(default)]
    pub next: Option<String>,
}

impl Reward {
    /// Apply resource, attribute and flag grants to a model.
    pub fn apply(&self, model: &mut StatModel) {
        for (name, amount) in &self.resources {
            model.add_resource(name, *amount);
        }
        for (attribute, amount) in &self.attributes {
            model.raise_attribute(*attribute, *amount);
        }
        for flag in &self.flags {
            model.set_flag(flag);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
            && self.attributes.is_empty()
            && self.flags.is_empty()
            && self.next.is_none()
    }
}

/// Immutable quest/achievement content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    #[serde(default)]
    pub reward: Reward,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Unlock condition expression (see [`crate::condition`]). Used by
    /// achievements; quests normally leave it empty.
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Locked,
    Available,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    #[error("node `{node}` lists unknown prerequisite `{prerequisite}`")]
    UnknownPrerequisite { node: String, prerequisite: String },
    #[error("node `{node}` chains to unknown node `{next}`")]
    UnknownNext { node: String, next: String },
    #[error("prerequisite cycle through {0:?}")]
    Cycle(Vec<String>),
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    #[error("node `{node}` still needs {missing:?}")]
    PrerequisitesUnmet { node: String, missing: Vec<String> },
    #[error("node `{node}` cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        node: String,
        from: NodeState,
        to: NodeState,
    },
}

/// A node that just completed, with the reward to materialise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedNode {
    pub id: String,
    pub title: String,
    pub reward: Reward,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    def: NodeDef,
    state: NodeState,
    progress: BTreeMap<String, u32>,
}

/// Directed acyclic unlock graph with per-node lifecycle state.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, NodeEntry>,
    /// Definition order, for stable presentation.
    order: Vec<String>,
    pending: Vec<CompletedNode>,
}

impl DependencyGraph {
    /// Validate content and build a graph with every node `Locked` or
    /// `Available` (no prerequisites).
    pub fn new(defs: Vec<NodeDef>) -> Result<Self, GraphError> {
        let mut nodes: BTreeMap<String, NodeEntry> = BTreeMap::new();
        let mut order = Vec::with_capacity(defs.len());

        for def in defs {
            if nodes.contains_key(&def.id) {
                return Err(GraphError::DuplicateNode(def.id));
            }
            order.push(def.id.clone());
            nodes.insert(
                def.id.clone(),
                NodeEntry {
                    def,
                    state: NodeState::Locked,
                    progress: BTreeMap::new(),
                },
            );
        }

        // Fold `next` chaining into prerequisite edges.
        let chains: Vec<(String, String)> = nodes
            .values()
            .filter_map(|n| n.def.reward.next.clone().map(|next| (n.def.id.clone(), next)))
            .collect();
        for (from, next) in chains {
            let target = nodes.get_mut(&next).ok_or_else(|| GraphError::UnknownNext {
                node: from.clone(),
                next: next.clone(),
            })?;
            if !target.def.prerequisites.contains(&from) {
                target.def.prerequisites.push(from);
            }
        }

        for entry in nodes.values() {
            if let Some(missing) = entry
                .def
                .prerequisites
                .iter()
                .find(|p| !nodes.contains_key(*p))
            {
                return Err(GraphError::UnknownPrerequisite {
                    node: entry.def.id.clone(),
                    prerequisite: missing.clone(),
                });
            }
        }

        check_acyclic(&nodes)?;

        let mut graph = Self {
            nodes,
            order,
            pending: Vec::new(),
        };
        graph.refresh_availability();
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node definitions in content order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDef> {
        self.order.iter().filter_map(|id| self.nodes.get(id).map(|n| &n.def))
    }

    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.get(id).map(|n| &n.def)
    }

    pub fn state(&self, id: &str) -> Option<NodeState> {
        self.nodes.get(id).map(|n| n.state)
    }

    /// Objective counters of a started node.
    pub fn progress(&self, id: &str) -> Option<&BTreeMap<String, u32>> {
        self.nodes
            .get(id)
            .filter(|n| matches!(n.state, NodeState::Active | NodeState::Completed))
            .map(|n| &n.progress)
    }

    pub fn ids_in_state(&self, state: NodeState) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| n.state == state))
            .map(String::as_str)
            .collect()
    }

    pub fn completed_ids(&self) -> BTreeSet<String> {
        self.collect_state(NodeState::Completed)
    }

    pub fn failed_ids(&self) -> BTreeSet<String> {
        self.collect_state(NodeState::Failed)
    }

    /// Counters of every active node, for snapshots.
    pub fn active_progress(&self) -> BTreeMap<String, BTreeMap<String, u32>> {
        self.nodes
            .values()
            .filter(|n| n.state == NodeState::Active)
            .map(|n| (n.def.id.clone(), n.progress.clone()))
            .collect()
    }

    /// Nodes whose prerequisites all appear in `completed` and that are not
    /// themselves completed, active or failed.
    pub fn available_nodes(&self, completed: &BTreeSet<String>) -> BTreeSet<String> {
        self.nodes
            .values()
            .filter(|n| {
                !matches!(
                    n.state,
                    NodeState::Completed | NodeState::Active | NodeState::Failed
                ) && !completed.contains(&n.def.id)
                    && n.def.prerequisites.iter().all(|p| completed.contains(p))
            })
            .map(|n| n.def.id.clone())
            .collect()
    }

    /// [`available_nodes`](Self::available_nodes) against this graph's own
    /// completed set.
    pub fn available(&self) -> BTreeSet<String> {
        self.available_nodes(&self.completed_ids())
    }

    /// `Available → Active`, zeroing every objective counter.
    pub fn start(&mut self, id: &str) -> Result<(), GraphError> {
        let missing = self.missing_prerequisites(id)?;
        let entry = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;

        if !matches!(entry.state, NodeState::Locked | NodeState::Available) {
            return Err(GraphError::InvalidTransition {
                node: id.to_string(),
                from: entry.state,
                to: NodeState::Active,
            });
        }
        if !missing.is_empty() {
            return Err(GraphError::PrerequisitesUnmet {
                node: id.to_string(),
                missing,
            });
        }

        entry.state = NodeState::Active;
        entry.progress = entry
            .def
            .objectives
            .iter()
            .map(|o| (o.id.clone(), 0))
            .collect();
        Ok(())
    }

    /// Add `amount` to `objective_id` on every active node that declares it.
    /// Returns the ids of the nodes touched.
    pub fn record_progress(&mut self, objective_id: &str, amount: u32) -> Vec<String> {
        let mut touched = Vec::new();
        for id in &self.order {
            let Some(entry) = self.nodes.get_mut(id) else {
                continue;
            };
            if entry.state != NodeState::Active {
                continue;
            }
            if let Some(counter) = entry.progress.get_mut(objective_id) {
                *counter = counter.saturating_add(amount);
                touched.push(id.clone());
            }
        }
        touched
    }

    /// Whether every objective counter has reached its target.
    ///
    /// The first `true` for an active node completes it: state moves to
    /// `Completed`, the reward is queued once, chained and newly satisfied
    /// nodes unlock. Later calls keep returning `true` and queue nothing.
    pub fn check_completion(&mut self, id: &str) -> Result<bool, GraphError> {
        let entry = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;

        match entry.state {
            NodeState::Completed => return Ok(true),
            NodeState::Active => {}
            _ => return Ok(false),
        }

        let done = entry
            .def
            .objectives
            .iter()
            .all(|o| entry.progress.get(&o.id).copied().unwrap_or(0) >= o.target);
        if done {
            self.complete(id);
        }
        Ok(done)
    }

    /// Run [`check_completion`](Self::check_completion) over every active
    /// node. Returns the ids completed by this call.
    pub fn check_all_active(&mut self) -> Vec<String> {
        let active: Vec<String> = self
            .ids_in_state(NodeState::Active)
            .into_iter()
            .map(String::from)
            .collect();
        active
            .into_iter()
            .filter(|id| matches!(self.check_completion(id), Ok(true)))
            .collect()
    }

    /// `Active → Failed`. The only transition that is not forward progress.
    pub fn fail(&mut self, id: &str) -> Result<(), GraphError> {
        let entry = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        if entry.state != NodeState::Active {
            return Err(GraphError::InvalidTransition {
                node: id.to_string(),
                from: entry.state,
                to: NodeState::Failed,
            });
        }
        entry.state = NodeState::Failed;
        log::info!("Node {} failed", id);
        Ok(())
    }

    /// Drain rewards queued by completions since the last call.
    pub fn take_rewards(&mut self) -> Vec<CompletedNode> {
        std::mem::take(&mut self.pending)
    }

    /// Rebuild lifecycle state from persisted sets. No rewards are queued.
    pub fn restore(
        &mut self,
        completed: &BTreeSet<String>,
        failed: &BTreeSet<String>,
        active: &BTreeMap<String, BTreeMap<String, u32>>,
    ) -> Result<(), GraphError> {
        for id in completed.iter().chain(failed).chain(active.keys()) {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownNode(id.clone()));
            }
        }

        for entry in self.nodes.values_mut() {
            let id = &entry.def.id;
            entry.progress.clear();
            entry.state = if completed.contains(id) {
                NodeState::Completed
            } else if failed.contains(id) {
                NodeState::Failed
            } else if let Some(saved) = active.get(id) {
                entry.progress = entry
                    .def
                    .objectives
                    .iter()
                    .map(|o| (o.id.clone(), saved.get(&o.id).copied().unwrap_or(0)))
                    .collect();
                NodeState::Active
            } else {
                NodeState::Locked
            };
        }
        self.pending.clear();
        self.refresh_availability();
        Ok(())
    }

    fn complete(&mut self, id: &str) {
        let Some(entry) = self.nodes.get_mut(id) else {
            return;
        };
        entry.state = NodeState::Completed;
        let completed = CompletedNode {
            id: entry.def.id.clone(),
            title: entry.def.title.clone(),
            reward: entry.def.reward.clone(),
        };
        log::info!("Node {} ({}) completed", completed.id, completed.title);

        if let Some(next) = &completed.reward.next {
            match self.missing_prerequisites(next) {
                Ok(missing) if missing.is_empty() => {
                    if let Some(target) = self.nodes.get_mut(next) {
                        if target.state == NodeState::Locked {
                            target.state = NodeState::Available;
                            log::info!("Node {} unlocked by {}", next, id);
                        }
                    }
                }
                Ok(missing) => {
                    log::debug!("Node {} chained from {} still needs {:?}", next, id, missing)
                }
                Err(e) => log::warn!("Chained unlock from {} failed: {}", id, e),
            }
        }

        self.pending.push(completed);
        self.refresh_availability();
    }

    /// Promote every locked node whose prerequisites are all completed.
    fn refresh_availability(&mut self) {
        let completed = self.completed_ids();
        for entry in self.nodes.values_mut() {
            if entry.state == NodeState::Locked
                && entry.def.prerequisites.iter().all(|p| completed.contains(p))
            {
                entry.state = NodeState::Available;
            }
        }
    }

    fn missing_prerequisites(&self, id: &str) -> Result<Vec<String>, GraphError> {
        let entry = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        Ok(entry
            .def
            .prerequisites
            .iter()
            .filter(|p| self.state(p) != Some(NodeState::Completed))
            .cloned()
            .collect())
    }

    fn collect_state(&self, state: NodeState) -> BTreeSet<String> {
        self.nodes
            .values()
            .filter(|n| n.state == state)
            .map(|n| n.def.id.clone())
            .collect()
    }
}

/// Kahn's algorithm; any node left with unresolved in-edges is on a cycle.
fn check_acyclic(nodes: &BTreeMap<String, NodeEntry>) -> Result<(), GraphError> {
    let mut in_degree: BTreeMap<&str, usize> = nodes
        .values()
        .map(|n| (n.def.id.as_str(), n.def.prerequisites.len()))
        .collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for entry in nodes.values() {
        for prerequisite in &entry.def.prerequisites {
            dependents
                .entry(prerequisite.as_str())
                .or_default()
                .push(entry.def.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut visited = 0;

    while let Some(id) = queue.pop_front() {
        visited += 1;
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if visited == nodes.len() {
        Ok(())
    } else {
        Err(GraphError::Cycle(
            in_degree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(id, _)| id.to_string())
                .collect(),
        ))
    }
}
