//! TreeScope Core
//!
//! Inside-out hierarchy reconstruction for typed work-item trees. Most
//! trees are generated top-down; this crate handles the other case: a
//! filter selects entities in the middle of a hierarchy, and the engine
//! rebuilds the context above and below them — ancestors the seeds hang
//! from, descendants they contain — then computes aggregate columns
//! bottom-up over the result.
//!
//! # Architecture
//!
//! - [`models`] - universal `Entity` records, identities, filter
//!   expressions
//! - [`behaviors`] - the per-type relationship registry (decision table)
//! - [`gateway`] - the async batched-fetch boundary to the remote store
//! - [`services`] - traversal engine, forest assembly/pruning, rollup
//!   aggregation, and the end-to-end `ReconstructionService`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use treescope_core::gateway::MemoryGateway;
//! use treescope_core::models::{Entity, TypeTag};
//! use treescope_core::services::{ColumnSpec, PruneRule, ReconstructionConfig, ReconstructionService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gateway = MemoryGateway::new();
//! gateway.insert(Entity::new("testfolder", 1, "Top"));
//!
//! let service = ReconstructionService::new(Arc::new(gateway));
//! let mut config = ReconstructionConfig::new("testfolder");
//! config.seed_filter = "( ObjectID = 1 )".to_string();
//! config.prune = Some(PruneRule { field: "Name".into(), value: json!("Archive") });
//! config.columns = vec![ColumnSpec::new("total", true, |entity: &Entity| {
//!     if entity.entity_type == TypeTag::new("testcase") { 1.0 } else { 0.0 }
//! })];
//!
//! let forest = service.reconstruct(&config).await?;
//! assert_eq!(forest.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod behaviors;
pub mod gateway;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use behaviors::{RelationshipRegistry, RelationshipRule, ReverseAssociation};
pub use gateway::{FetchGateway, GatewayCall, MemoryGateway};
pub use models::{Entity, EntityKey, FilterExpression, FilterOperator, FilterParseError, TypeTag};
pub use services::{
    assemble, prune_by_field, rollup, rollup_all, ColumnSpec, Direction, PruneRule,
    ReconstructionConfig, ReconstructionError, ReconstructionService, TraversalConfig,
    TraversalEngine, TreeNode, VisitedSet, DEFAULT_BATCH_SIZE, DEFAULT_SEED_FILTER,
};
