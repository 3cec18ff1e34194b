//! Reconstruction Service - End-to-End Orchestration
//!
//! Drives one full inside-out reconstruction: parse the caller's seed
//! filter, compute the field list every fetch must carry, load the seed
//! entities, expand the hierarchy in both directions, assemble the forest,
//! apply the optional prune rule, and roll up the declared columns.
//!
//! The working set lives exactly as long as one `reconstruct` call; there
//! is no cross-request caching. An empty seed result is a valid empty
//! forest — the caller decides how to present "no data".

use crate::behaviors::RelationshipRegistry;
use crate::gateway::FetchGateway;
use crate::models::{FilterExpression, TypeTag, FIELD_NAME, FIELD_OBJECT_ID};
use crate::services::error::ReconstructionError;
use crate::services::forest::{assemble, prune_by_field, TreeNode};
use crate::services::rollup::{rollup_all, ColumnSpec};
use crate::services::traversal::{TraversalConfig, TraversalEngine, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Seed filter applied when the caller does not supply one: every entity
/// of the seed type.
pub const DEFAULT_SEED_FILTER: &str = "( ObjectID > 0 )";

/// Drop any subtree whose node's `field` equals `value` (e.g. an entire
/// "Archive" branch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneRule {
    pub field: String,
    pub value: Value,
}

/// Caller-supplied configuration for one reconstruction.
#[derive(Clone)]
pub struct ReconstructionConfig {
    /// Entity type the seed filter is applied to
    pub seed_type: TypeTag,
    /// Filter expression selecting the seed entities
    pub seed_filter: String,
    /// Search for children and other descendants
    pub expand_down: bool,
    /// Search for parents and other ancestors
    pub expand_up: bool,
    /// Maximum identities per batched lookup
    pub batch_size: usize,
    /// Optional subtree exclusion applied after assembly
    pub prune: Option<PruneRule>,
    /// Rollup columns computed over the assembled forest
    pub columns: Vec<ColumnSpec>,
}

impl ReconstructionConfig {
    pub fn new(seed_type: impl Into<TypeTag>) -> Self {
        Self {
            seed_type: seed_type.into(),
            seed_filter: DEFAULT_SEED_FILTER.to_string(),
            expand_down: true,
            expand_up: true,
            batch_size: DEFAULT_BATCH_SIZE,
            prune: None,
            columns: Vec::new(),
        }
    }
}

/// Orchestrates seed fetch, traversal, assembly, pruning and rollup.
pub struct ReconstructionService {
    gateway: Arc<dyn FetchGateway>,
    registry: Arc<RelationshipRegistry>,
}

impl ReconstructionService {
    /// Service over the default work-item relationship table.
    pub fn new(gateway: Arc<dyn FetchGateway>) -> Self {
        Self::with_registry(gateway, Arc::new(RelationshipRegistry::default()))
    }

    pub fn with_registry(
        gateway: Arc<dyn FetchGateway>,
        registry: Arc<RelationshipRegistry>,
    ) -> Self {
        Self { gateway, registry }
    }

    /// Field names every fetch must carry: the identity columns, every
    /// parent/collection field any registry rule reads, and the extra
    /// fields declared by the rollup columns. Order-preserving, no
    /// duplicates.
    pub fn fetch_field_names(&self, config: &ReconstructionConfig) -> Vec<String> {
        let mut names: Vec<String> =
            vec![FIELD_OBJECT_ID.to_string(), FIELD_NAME.to_string()];
        for name in self
            .registry
            .relationship_field_names()
            .into_iter()
            .chain(
                config
                    .columns
                    .iter()
                    .flat_map(|column| column.extra_fields.iter().cloned()),
            )
        {
            if !names.iter().any(|existing| existing == &name) {
                names.push(name);
            }
        }
        names
    }

    /// Run one full reconstruction.
    pub async fn reconstruct(
        &self,
        config: &ReconstructionConfig,
    ) -> Result<Vec<TreeNode>, ReconstructionError> {
        let filter = FilterExpression::parse(&config.seed_filter)?;
        let fields = self.fetch_field_names(config);
        info!(
            seed_type = %config.seed_type,
            filter = %filter,
            expand_down = config.expand_down,
            expand_up = config.expand_up,
            "reconstruction starting"
        );

        let seeds = self
            .gateway
            .fetch_by_filter(&config.seed_type, &filter, &fields)
            .await
            .map_err(|source| ReconstructionError::SeedFetchFailed {
                entity_type: config.seed_type.clone(),
                source,
            })?;
        debug!(seeds = seeds.len(), "seed fetch complete");
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let engine = TraversalEngine::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.registry),
            TraversalConfig {
                expand_down: config.expand_down,
                expand_up: config.expand_up,
                batch_size: config.batch_size,
                fetch_fields: fields,
            },
        );
        let visited = engine.traverse(seeds).await?;

        let mut forest = assemble(visited);
        if let Some(rule) = &config.prune {
            forest = prune_by_field(forest, &rule.field, &rule.value);
        }
        rollup_all(&mut forest, &config.columns);

        info!(roots = forest.len(), "reconstruction complete");
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    #[test]
    fn fetch_field_names_merge_registry_and_column_fields() {
        let service = ReconstructionService::new(Arc::new(MemoryGateway::new()));
        let mut config = ReconstructionConfig::new("testfolder");
        config.columns = vec![
            ColumnSpec::new("passed", true, |_| 0.0).with_extra_fields(&["LastVerdict"]),
            ColumnSpec::new("open", true, |_| 0.0).with_extra_fields(&["State", "LastVerdict"]),
        ];

        let names = service.fetch_field_names(&config);
        assert_eq!(names[0], "ObjectID");
        assert_eq!(names[1], "Name");
        for expected in ["Parent", "TestFolder", "TestCases", "LastVerdict", "State"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        // merged without duplicates
        assert_eq!(
            names.iter().filter(|n| n.as_str() == "LastVerdict").count(),
            1
        );
    }

    #[tokio::test]
    async fn malformed_seed_filter_fails_before_any_fetch() {
        let gateway = Arc::new(MemoryGateway::new());
        let service =
            ReconstructionService::new(Arc::clone(&gateway) as Arc<dyn FetchGateway>);
        let mut config = ReconstructionConfig::new("testfolder");
        config.seed_filter = "( ObjectID ".to_string();

        let error = service.reconstruct(&config).await.unwrap_err();
        assert!(matches!(error, ReconstructionError::MalformedFilter(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn no_seed_results_yield_empty_forest() {
        let gateway = Arc::new(MemoryGateway::new());
        let service =
            ReconstructionService::new(Arc::clone(&gateway) as Arc<dyn FetchGateway>);
        let config = ReconstructionConfig::new("testfolder");

        let forest = service.reconstruct(&config).await.unwrap();
        assert!(forest.is_empty());
        // only the seed query ran
        assert_eq!(gateway.call_count(), 1);
    }
}
