//! Forest Assembly and Pruning
//!
//! Converts the flat, parent-annotated visited set into a rooted forest of
//! owned tree nodes, and prunes subtrees by field value.
//!
//! Roots are the entities whose resolved parent is absent or was never
//! discovered; children attach under their parent in first-discovery
//! order. Presentation layers may re-sort — the core guarantees only a
//! deterministic, duplicate-free forest.

use crate::models::{Entity, EntityKey};
use crate::services::traversal::VisitedSet;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One node of the reconstructed forest: an entity, its children in
/// discovery order, and the rollup values computed for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub entity: Entity,
    pub children: Vec<TreeNode>,
    /// Derived per-column values; populated by the rollup engine
    pub rollups: BTreeMap<String, f64>,
}

impl TreeNode {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            children: Vec::new(),
            rollups: BTreeMap::new(),
        }
    }

    /// Computed value of a rollup column, if that column has run.
    pub fn rollup_value(&self, column: &str) -> Option<f64> {
        self.rollups.get(column).copied()
    }

    /// Nodes in this subtree, including self.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Build the rooted forest from a traversal's visited set.
///
/// Each entity becomes a node; a node attaches under its parent when the
/// parent was discovered, otherwise it becomes a root. Both roots and
/// children keep first-discovery order.
pub fn assemble(visited: VisitedSet) -> Vec<TreeNode> {
    let (mut entities, order, parents) = visited.into_parts();

    let mut children_of: HashMap<_, Vec<_>> = HashMap::new();
    let mut roots = Vec::new();
    for key in &order {
        match parents.get(key) {
            Some(parent) if entities.contains_key(parent) => {
                children_of.entry(parent.clone()).or_default().push(key.clone());
            }
            _ => roots.push(key.clone()),
        }
    }

    fn build(
        key: &EntityKey,
        entities: &mut HashMap<EntityKey, Entity>,
        children_of: &HashMap<EntityKey, Vec<EntityKey>>,
    ) -> Option<TreeNode> {
        let entity = entities.remove(key)?;
        let mut node = TreeNode::new(entity);
        if let Some(child_keys) = children_of.get(key) {
            for child in child_keys {
                if let Some(child_node) = build(child, entities, children_of) {
                    node.children.push(child_node);
                }
            }
        }
        Some(node)
    }

    roots
        .iter()
        .filter_map(|key| build(key, &mut entities, &children_of))
        .collect()
}

/// Remove every subtree whose node's named field equals `value`.
///
/// The walk is root-to-leaf: once a node matches, it is dropped with its
/// entire subtree regardless of what its descendants hold. Non-matching
/// siblings are retained.
pub fn prune_by_field(forest: Vec<TreeNode>, field: &str, value: &Value) -> Vec<TreeNode> {
    forest
        .into_iter()
        .filter_map(|mut node| {
            if node.entity.field(field).as_ref() == Some(value) {
                return None;
            }
            node.children = prune_by_field(std::mem::take(&mut node.children), field, value);
            Some(node)
        })
        .collect()
}
