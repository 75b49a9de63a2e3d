//! Condition-driven achievements on top of [`DependencyGraph`].
//!
//! An achievement is a graph node with no objectives and an unlock
//! condition. Each re-check walks the available nodes, evaluates their
//! conditions against the current stats and completes the ones that hold.
//! Completion goes through the graph, so a reward is queued at most once
//! no matter how often the check runs.

use std::collections::{BTreeMap, BTreeSet};

use crate::condition::Condition;
use crate::graph::{CompletedNode, DependencyGraph, GraphError, NodeDef};
use crate::stats::StatModel;

#[derive(Debug, Clone)]
pub struct AchievementTracker {
    graph: DependencyGraph,
    /// `None` for nodes whose condition failed to parse; those never unlock.
    conditions: BTreeMap<String, Option<Condition>>,
}

impl AchievementTracker {
    pub fn new(defs: Vec<NodeDef>) -> Result<Self, GraphError> {
        let conditions = defs
            .iter()
            .map(|def| {
                let parsed = match def.condition.as_deref() {
                    None => Some(Condition::All(Vec::new())),
                    Some(expr) => match Condition::parse(expr) {
                        Ok(c) => Some(c),
                        Err(e) => {
                            log::warn!("Achievement {} has a bad condition `{}`: {}", def.id, expr, e);
                            None
                        }
                    },
                };
                (def.id.clone(), parsed)
            })
            .collect();

        Ok(Self {
            graph: DependencyGraph::new(defs)?,
            conditions,
        })
    }

    /// Complete every available achievement whose condition holds, repeating
    /// until nothing new unlocks. Returns the newly completed nodes.
    pub fn check(&mut self, model: &StatModel) -> Vec<CompletedNode> {
        loop {
            let ready: Vec<String> = self
                .graph
                .available()
                .into_iter()
                .filter(|id| {
                    self.conditions
                        .get(id)
                        .and_then(Option::as_ref)
                        .is_some_and(|c| c.evaluate(model))
                })
                .collect();
            let mut completed_any = false;
            for id in ready {
                match self.graph.start(&id).and_then(|_| self.graph.check_completion(&id)) {
                    Ok(done) => completed_any |= done,
                    Err(e) => log::warn!("Achievement {} could not complete: {}", id, e),
                }
            }
            if !completed_any {
                break;
            }
        }

        let unlocked = self.graph.take_rewards();
        for node in &unlocked {
            log::info!("{} unlocked achievement {}", model.name, node.title);
        }
        unlocked
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.graph.completed_ids().contains(id)
    }

    pub fn unlocked_ids(&self) -> BTreeSet<String> {
        self.graph.completed_ids()
    }

    /// Unlocked definitions in content order.
    pub fn unlocked(&self) -> Vec<&NodeDef> {
        let done = self.graph.completed_ids();
        self.graph.nodes().filter(|n| done.contains(&n.id)).collect()
    }

    pub fn total(&self) -> usize {
        self.graph.len()
    }

    pub fn restore(&mut self, unlocked: &BTreeSet<String>) -> Result<(), GraphError> {
        self.graph
            .restore(unlocked, &BTreeSet::new(), &BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Reward;

    fn achievement(id: &str, condition: &str, prerequisites: &[&str]) -> NodeDef {
        let mut reward = Reward::default();
        reward.resources.insert("spirit_stones".into(), 10);
        NodeDef {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            objectives: Vec::new(),
            reward,
            prerequisites: prerequisites.iter().map(|p| (*p).into()).collect(),
            condition: Some(condition.into()),
        }
    }

    #[test]
    fn test_unlocks_once() {
        let mut tracker =
            AchievementTracker::new(vec![achievement("qi_refiner", "tier_min:1", &[])]).unwrap();
        let model = StatModel::new("Tester");
        assert!(tracker.check(&model).is_empty());

        let model = model.with_position(1, 0);
        assert_eq!(tracker.check(&model).len(), 1);
        assert!(tracker.check(&model).is_empty());
        assert!(tracker.is_unlocked("qi_refiner"));
    }

    #[test]
    fn test_chained_achievements_in_one_check() {
        let mut tracker = AchievementTracker::new(vec![
            achievement("rich", "resource:spirit_stones:100", &[]),
            achievement("richer", "resource:spirit_stones:50", &["rich"]),
        ])
        .unwrap();
        let unlocked = tracker.check(&StatModel::new("Tester"));
        let ids: Vec<&str> = unlocked.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["rich", "richer"]);
    }

    #[test]
    fn test_bad_condition_never_unlocks() {
        let mut tracker =
            AchievementTracker::new(vec![achievement("broken", "realm:golden_core", &[])]).unwrap();
        assert!(tracker.check(&StatModel::new("Tester")).is_empty());
        assert!(tracker.unlocked().is_empty());
    }

    #[test]
    fn test_conjunction_with_turn_limit() {
        let mut tracker = AchievementTracker::new(vec![achievement(
            "prodigy",
            "tier_min:4,turns_max:100",
            &[],
        )])
        .unwrap();
        let mut slow = StatModel::new("Tester").with_position(4, 0);
        for _ in 0..101 {
            slow.advance_turn();
        }
        assert!(tracker.check(&slow).is_empty());
        let fast = StatModel::new("Tester").with_position(4, 0);
        assert_eq!(tracker.check(&fast).len(), 1);
    }

    #[test]
    fn test_restore_suppresses_rewards() {
        let mut tracker =
            AchievementTracker::new(vec![achievement("qi_refiner", "tier_min:1", &[])]).unwrap();
        let mut ids = BTreeSet::new();
        ids.insert("qi_refiner".to_string());
        tracker.restore(&ids).unwrap();
        assert!(tracker.check(&StatModel::new("Tester").with_position(2, 0)).is_empty());
        assert_eq!(tracker.unlocked().len(), 1);
    }
}
