//! Reconstruction Services
//!
//! This module contains the core pipeline services:
//!
//! - `TraversalEngine` - bidirectional, batched, deduplicating expansion of
//!   the seed set into the full visited set
//! - `assemble` / `prune_by_field` - forest assembly and subtree pruning
//! - `rollup` / `rollup_all` - post-order column aggregation
//! - `ReconstructionService` - end-to-end orchestration
//!
//! Services coordinate between the relationship registry and the fetch
//! gateway; everything outside the gateway calls is synchronous and owned
//! by a single reconstruction.

pub mod error;
pub mod forest;
pub mod reconstruction;
pub mod rollup;
pub mod traversal;

pub use error::{Direction, ReconstructionError};
pub use forest::{assemble, prune_by_field, TreeNode};
pub use reconstruction::{
    PruneRule, ReconstructionConfig, ReconstructionService, DEFAULT_SEED_FILTER,
};
pub use rollup::{rollup, rollup_all, Calculator, ColumnSpec};
pub use traversal::{TraversalConfig, TraversalEngine, VisitedSet, DEFAULT_BATCH_SIZE};
