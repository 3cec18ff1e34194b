//! Remote Fetch Gateway
//!
//! This module defines the `FetchGateway` trait that abstracts the remote
//! entity store. The traversal engine depends only on this contract; the
//! wire protocol behind it is deliberately opaque.
//!
//! # Architecture
//!
//! - **Abstraction point**: between the reconstruction services and the
//!   remote query service
//! - **Async-first**: every operation is a network round-trip; all methods
//!   are async and implementations must be `Send + Sync`
//! - **Batched lookups**: callers guarantee identity batches are non-empty
//!   and at most the configured batch size; the gateway never re-chunks
//! - **Error handling**: `anyhow::Result` for flexible backend error
//!   context; the service layer wraps failures with round/direction
//!   diagnostics
//!
//! `MemoryGateway` is the in-process implementation used by tests and
//! embedded deployments; it evaluates filter expressions locally and
//! records every call it serves.

mod memory;

pub use memory::{GatewayCall, MemoryGateway};

use crate::models::{Entity, FilterExpression, TypeTag};
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction over the remote entity store's batched fetch operations.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// Fetch every entity of `entity_type` matching `filter`, with the
    /// named fields populated. Used for seed selection and for batched
    /// reverse-association lookups (`any of these parent IDs` filters).
    async fn fetch_by_filter(
        &self,
        entity_type: &TypeTag,
        filter: &FilterExpression,
        fields: &[String],
    ) -> Result<Vec<Entity>>;

    /// Fetch entities of `entity_type` by identity list.
    ///
    /// The caller guarantees `ids` is non-empty and no longer than the
    /// configured batch size.
    async fn fetch_by_identity_batch(
        &self,
        entity_type: &TypeTag,
        ids: &[i64],
        fields: &[String],
    ) -> Result<Vec<Entity>>;

    /// Fetch the records of a named collection on one entity (direct
    /// child-collection expansion).
    async fn fetch_collection(
        &self,
        owner: &Entity,
        collection_field: &str,
        fields: &[String],
    ) -> Result<Vec<Entity>>;
}
