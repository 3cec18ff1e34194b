//! Rollup Aggregation Engine
//!
//! Computes derived per-node numeric columns over an assembled forest.
//! Each declared column runs one independent post-order traversal: at a
//! leaf the value is the column's calculator applied to the node's entity;
//! at an internal node it is the sum of the children's values, plus the
//! node's own calculator result unless the column is `leaves_only`.
//!
//! This is the mechanism behind "total / executed / passed / failed" style
//! counters: leaf test cases contribute 0 or 1, folders and higher
//! containers accumulate the sums. Calculators for different columns never
//! interact.

use crate::models::Entity;
use crate::services::forest::TreeNode;
use std::fmt;
use std::sync::Arc;

/// Pure function producing a column value from one entity's own fields.
pub type Calculator = Arc<dyn Fn(&Entity) -> f64 + Send + Sync>;

/// One named rollup column.
#[derive(Clone)]
pub struct ColumnSpec {
    /// Key under which the value is stored in `TreeNode::rollups`
    pub name: String,
    /// When true, internal nodes sum their children only; their own
    /// calculator result is ignored
    pub leaves_only: bool,
    /// Extra field names the calculator reads, merged into the fetch list
    pub extra_fields: Vec<String>,
    calculator: Calculator,
}

impl ColumnSpec {
    pub fn new(
        name: impl Into<String>,
        leaves_only: bool,
        calculator: impl Fn(&Entity) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            leaves_only,
            extra_fields: Vec::new(),
            calculator: Arc::new(calculator),
        }
    }

    /// Declare extra field names this column's calculator reads.
    pub fn with_extra_fields(mut self, fields: &[&str]) -> Self {
        self.extra_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn calculate(&self, entity: &Entity) -> f64 {
        (self.calculator)(entity)
    }
}

impl fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("leaves_only", &self.leaves_only)
            .field("extra_fields", &self.extra_fields)
            .finish_non_exhaustive()
    }
}

/// Run one column's post-order aggregation over the forest, annotating
/// every node with the computed value.
pub fn rollup(forest: &mut [TreeNode], column: &ColumnSpec) {
    for node in forest {
        rollup_node(node, column);
    }
}

/// Run every declared column; each is an independent traversal.
pub fn rollup_all(forest: &mut [TreeNode], columns: &[ColumnSpec]) {
    for column in columns {
        rollup(forest, column);
    }
}

fn rollup_node(node: &mut TreeNode, column: &ColumnSpec) -> f64 {
    let value = if node.children.is_empty() {
        column.calculate(&node.entity)
    } else {
        let sum: f64 = node
            .children
            .iter_mut()
            .map(|child| rollup_node(child, column))
            .sum();
        if column.leaves_only {
            sum
        } else {
            sum + column.calculate(&node.entity)
        }
    };
    node.rollups.insert(column.name.clone(), value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TypeTag;
    use serde_json::json;

    fn case(id: i64, verdict: Option<&str>) -> TreeNode {
        let mut entity = Entity::new("testcase", id, format!("Case{id}"));
        if let Some(verdict) = verdict {
            entity = entity.with_field("LastVerdict", json!(verdict));
        }
        TreeNode::new(entity)
    }

    /// Root -> Folder -> [Case1 Pass, Case2 Fail, Case3 none]
    fn fixture() -> Vec<TreeNode> {
        let mut folder = TreeNode::new(Entity::new("testfolder", 2, "Folder"));
        folder.children = vec![case(10, Some("Pass")), case(11, Some("Fail")), case(12, None)];
        let mut root = TreeNode::new(Entity::new("testfolder", 1, "Root"));
        root.children = vec![folder];
        vec![root]
    }

    fn count_cases(entity: &Entity) -> f64 {
        if entity.entity_type == TypeTag::new("testcase") {
            1.0
        } else {
            0.0
        }
    }

    #[test]
    fn leaves_only_column_counts_qualifying_descendants() {
        let mut forest = fixture();
        rollup(&mut forest, &ColumnSpec::new("total", true, count_cases));

        let root = &forest[0];
        assert_eq!(root.rollup_value("total"), Some(3.0));
        assert_eq!(root.children[0].rollup_value("total"), Some(3.0));
        assert_eq!(root.children[0].children[0].rollup_value("total"), Some(1.0));
    }

    #[test]
    fn verdict_predicate_column_counts_passes() {
        let mut forest = fixture();
        let passed = ColumnSpec::new("passed", true, |entity: &Entity| {
            if entity.entity_type == TypeTag::new("testcase")
                && entity.field("LastVerdict") == Some(json!("Pass"))
            {
                1.0
            } else {
                0.0
            }
        })
        .with_extra_fields(&["LastVerdict"]);
        rollup(&mut forest, &passed);

        assert_eq!(forest[0].rollup_value("passed"), Some(1.0));
        assert_eq!(forest[0].children[0].rollup_value("passed"), Some(1.0));
    }

    #[test]
    fn non_leaves_only_column_adds_internal_node_contributions() {
        let mut forest = fixture();
        // every node contributes 1: 5 nodes total
        rollup(&mut forest, &ColumnSpec::new("nodes", false, |_| 1.0));
        assert_eq!(forest[0].rollup_value("nodes"), Some(5.0));
        assert_eq!(forest[0].children[0].rollup_value("nodes"), Some(4.0));
    }

    #[test]
    fn columns_are_independent() {
        let mut forest = fixture();
        let columns = vec![
            ColumnSpec::new("total", true, count_cases),
            ColumnSpec::new("executed", true, |entity: &Entity| {
                if entity.entity_type == TypeTag::new("testcase")
                    && entity.field("LastVerdict").is_some()
                {
                    1.0
                } else {
                    0.0
                }
            }),
        ];
        rollup_all(&mut forest, &columns);
        assert_eq!(forest[0].rollup_value("total"), Some(3.0));
        assert_eq!(forest[0].rollup_value("executed"), Some(2.0));
    }
}
