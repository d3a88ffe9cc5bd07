//! Dependency graph algorithms over plain id sets.
//!
//! The hatch hands these functions a snapshot of every registered asset as a
//! [`GraphNode`] (its id and the ids it depends on) plus the set of ids that
//! failed on their own. Nothing here touches assets, storage, or async state.
//!
//! # Pruning
//!
//! Pruning is exactly two passes:
//!
//! 1. Every asset that did not fail itself but depends on a failed asset fails
//!    by association, and all of its dependents are marked for pruning.
//! 2. Survivors of pass 1 that were marked for pruning are removed, which takes
//!    out the siblings of the failed child.
//!
//! Failure is not propagated further. A grandparent of a failed asset survives
//! pruning and is then caught by [`dangling_references`], because its direct
//! dependent was removed.

use crate::models::AssetId;
use std::collections::HashSet;

/// Runs where more than this percentage of assets failed are rejected.
pub const MAX_FAILED_PERCENT: usize = 90;

/// One registered asset as seen by the graph algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: AssetId,
    pub dependents: Vec<AssetId>,
}

impl GraphNode {
    pub fn new(id: AssetId, dependents: Vec<AssetId>) -> Self {
        Self { id, dependents }
    }
}

/// Result of [`prune`].
#[derive(Debug, Clone, Default)]
pub struct PruneOutcome {
    /// Ids kept in the hatch, in registration order.
    pub survivors: Vec<AssetId>,
    /// Ids that no other registered asset depends on.
    pub top_level: HashSet<AssetId>,
    /// Ids that failed because one of their dependents failed.
    pub failed_by_association: HashSet<AssetId>,
    /// Ids removed in the second pass as dependents of an associated failure.
    pub pruned_dependents: HashSet<AssetId>,
}

impl PruneOutcome {
    pub fn is_top_level(&self, id: &AssetId) -> bool {
        self.top_level.contains(id)
    }
}

/// Ids that appear as nobody's dependent.
///
/// Edges of every registered asset count, including assets that failed or
/// will be pruned.
pub fn top_level_ids(nodes: &[GraphNode]) -> HashSet<AssetId> {
    let mut top_level: HashSet<AssetId> = nodes.iter().map(|n| n.id.clone()).collect();
    for node in nodes {
        for dependent in &node.dependents {
            top_level.remove(dependent);
        }
    }
    top_level
}

/// Decide which registered assets survive, given the ids that failed on their own.
pub fn prune(nodes: &[GraphNode], failed: &HashSet<AssetId>) -> PruneOutcome {
    let top_level = top_level_ids(nodes);
    let mut failed_by_association = HashSet::new();
    let mut pruned_dependents = HashSet::new();

    let first_pass: Vec<&GraphNode> = nodes
        .iter()
        .filter(|node| !failed.contains(&node.id))
        .filter(|node| {
            if node.dependents.iter().any(|d| failed.contains(d)) {
                failed_by_association.insert(node.id.clone());
                pruned_dependents.extend(node.dependents.iter().cloned());
                false
            } else {
                true
            }
        })
        .collect();

    let survivors = first_pass
        .into_iter()
        .filter(|node| !pruned_dependents.contains(&node.id))
        .map(|node| node.id.clone())
        .collect();

    PruneOutcome {
        survivors,
        top_level,
        failed_by_association,
        pruned_dependents,
    }
}

/// Whether `failed` out of `total` assets is beyond [`MAX_FAILED_PERCENT`].
pub fn failure_rate_exceeded(failed: usize, total: usize) -> bool {
    total > 0 && failed * 100 > total * MAX_FAILED_PERCENT
}

/// A dependency edge whose target is not among the survivors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub parent: AssetId,
    pub missing: AssetId,
}

/// Every edge from a surviving asset to an id that is not itself a survivor.
pub fn dangling_references(nodes: &[GraphNode], survivors: &[AssetId]) -> Vec<DanglingReference> {
    let surviving: HashSet<&AssetId> = survivors.iter().collect();
    let surviving = &surviving;
    nodes
        .iter()
        .filter(|node| surviving.contains(&node.id))
        .flat_map(move |node| {
            node.dependents
                .iter()
                .filter(move |d| !surviving.contains(d))
                .map(move |d| DanglingReference {
                    parent: node.id.clone(),
                    missing: d.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<AssetId> {
        (0..n).map(|_| AssetId::generate()).collect()
    }

    fn leaf(id: &AssetId) -> GraphNode {
        GraphNode::new(id.clone(), vec![])
    }

    fn set(ids: &[&AssetId]) -> HashSet<AssetId> {
        ids.iter().map(|id| (*id).clone()).collect()
    }

    #[test]
    fn test_unrelated_assets_are_all_top_level() {
        let ids = ids(3);
        let nodes: Vec<_> = ids.iter().map(leaf).collect();
        let outcome = prune(&nodes, &HashSet::new());
        assert_eq!(outcome.survivors, ids);
        assert!(ids.iter().all(|id| outcome.is_top_level(id)));
    }

    #[test]
    fn test_dependents_are_never_top_level() {
        let ids = ids(3);
        let (parent, child, thumb) = (&ids[0], &ids[1], &ids[2]);
        let nodes = vec![
            GraphNode::new(parent.clone(), vec![child.clone(), thumb.clone()]),
            leaf(child),
            leaf(thumb),
        ];
        let outcome = prune(&nodes, &HashSet::new());
        assert!(outcome.is_top_level(parent));
        assert!(!outcome.is_top_level(child));
        assert!(!outcome.is_top_level(thumb));
        assert_eq!(outcome.survivors.len(), 3);
    }

    #[test]
    fn test_failed_child_prunes_parent_and_siblings_only() {
        let ids = ids(4);
        let (parent, img_a, img_b, other) = (&ids[0], &ids[1], &ids[2], &ids[3]);
        let nodes = vec![
            GraphNode::new(parent.clone(), vec![img_a.clone(), img_b.clone()]),
            leaf(img_a),
            leaf(img_b),
            leaf(other),
        ];
        let outcome = prune(&nodes, &set(&[img_a]));

        assert_eq!(outcome.survivors, vec![other.clone()]);
        assert_eq!(outcome.failed_by_association, set(&[parent]));
        assert_eq!(outcome.pruned_dependents, set(&[img_a, img_b]));
        assert!(outcome.is_top_level(other));
    }

    #[test]
    fn test_failed_parent_keeps_children_but_not_as_top_level() {
        let ids = ids(2);
        let (parent, child) = (&ids[0], &ids[1]);
        let nodes = vec![GraphNode::new(parent.clone(), vec![child.clone()]), leaf(child)];
        let outcome = prune(&nodes, &set(&[parent]));

        assert_eq!(outcome.survivors, vec![child.clone()]);
        assert!(!outcome.is_top_level(child));
    }

    #[test]
    fn test_failure_does_not_reach_grandparent() {
        // grandparent -> parent -> child(failed)
        let ids = ids(4);
        let (grandparent, parent, child, sibling) = (&ids[0], &ids[1], &ids[2], &ids[3]);
        let nodes = vec![
            GraphNode::new(grandparent.clone(), vec![parent.clone()]),
            GraphNode::new(parent.clone(), vec![child.clone(), sibling.clone()]),
            leaf(child),
            leaf(sibling),
        ];
        let outcome = prune(&nodes, &set(&[child]));

        assert_eq!(outcome.survivors, vec![grandparent.clone()]);
        let dangling = dangling_references(&nodes, &outcome.survivors);
        assert_eq!(
            dangling,
            vec![DanglingReference {
                parent: grandparent.clone(),
                missing: parent.clone(),
            }]
        );
    }

    #[test]
    fn test_association_uses_only_own_failures() {
        // a -> b -> c(failed): b fails by association, a is judged against the
        // original failed set and passes pass 1 regardless of iteration order.
        let ids = ids(3);
        let (a, b, c) = (&ids[0], &ids[1], &ids[2]);
        let forward = vec![
            GraphNode::new(a.clone(), vec![b.clone()]),
            GraphNode::new(b.clone(), vec![c.clone()]),
            leaf(c),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let one = prune(&forward, &set(&[c]));
        let two = prune(&backward, &set(&[c]));
        assert_eq!(one.failed_by_association, set(&[b]));
        assert_eq!(two.failed_by_association, set(&[b]));
        assert_eq!(one.survivors, vec![a.clone()]);
        assert_eq!(two.survivors, vec![a.clone()]);
    }

    #[test]
    fn test_failure_rate_threshold() {
        assert!(!failure_rate_exceeded(90, 100));
        assert!(failure_rate_exceeded(91, 100));
        assert!(!failure_rate_exceeded(0, 0));
        assert!(failure_rate_exceeded(1, 1));
        assert!(!failure_rate_exceeded(9, 10));
    }

    #[test]
    fn test_dangling_reference_to_unknown_id() {
        let ids = ids(2);
        let (parent, ghost) = (&ids[0], &ids[1]);
        let nodes = vec![GraphNode::new(parent.clone(), vec![ghost.clone()])];
        let outcome = prune(&nodes, &HashSet::new());

        assert_eq!(outcome.survivors, vec![parent.clone()]);
        assert_eq!(dangling_references(&nodes, &outcome.survivors).len(), 1);
    }

    #[test]
    fn test_closed_graph_has_no_dangling_references() {
        let ids = ids(2);
        let nodes = vec![GraphNode::new(ids[0].clone(), vec![ids[1].clone()]), leaf(&ids[1])];
        assert!(dangling_references(&nodes, &ids).is_empty());
    }
}
