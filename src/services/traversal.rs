//! Traversal Engine
//!
//! Expands a seed set of entities outward through the hierarchy in both
//! directions, producing the flat visited set the assembler builds the
//! forest from.
//!
//! # Architecture
//!
//! The engine runs an explicit round loop per direction instead of chained
//! continuations: each round gathers every fetch the current frontier
//! requires, awaits them concurrently, merges the results into the visited
//! set (first write wins), and promotes the newly inserted entities to the
//! next frontier. A round that inserts nothing terminates its expansion.
//!
//! - **Downward**: one collection fetch per non-empty (entity, collection
//!   field) pair, plus batched reverse-association lookups for child types
//!   found by foreign key rather than forward collection
//! - **Upward**: distinct unvisited parent identities grouped by type and
//!   fetched in identity batches
//!
//! Batches are capped at `TraversalConfig::batch_size` (default 70, the
//! bound that keeps "any of these IDs" queries inside URL limits) and an
//! empty batch is never issued. The visited set is exclusively owned by one
//! `traverse` call and discarded with it; first-write-wins insertion makes
//! overlapping discovery idempotent and guarantees termination even when
//! parent references form a cycle. If any fetch in a round fails, the whole
//! traversal fails — a partial hierarchy is never silently returned.

use crate::behaviors::RelationshipRegistry;
use crate::gateway::FetchGateway;
use crate::models::{Entity, EntityKey, FilterExpression, TypeTag, FIELD_OBJECT_ID};
use crate::services::error::{Direction, ReconstructionError};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Default cap on identities per batched lookup.
pub const DEFAULT_BATCH_SIZE: usize = 70;

/// Traversal tuning supplied by the caller.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Search for children and other descendants
    pub expand_down: bool,
    /// Search for parents and other ancestors
    pub expand_up: bool,
    /// Maximum identities per batched lookup (never zero)
    pub batch_size: usize,
    /// Field names the gateway must populate on every fetched record
    pub fetch_fields: Vec<String>,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            expand_down: true,
            expand_up: true,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_fields: Vec::new(),
        }
    }
}

/// The working map of discovered entities, keyed by identity.
///
/// Append-only for the lifetime of one traversal: an identity is inserted
/// at most once and never overwritten, even when rediscovered via a
/// different path. Insertion order is preserved so the assembler can keep
/// children in discovery order. The parent back-reference resolved at
/// insertion time lives in a side map; entity records stay immutable.
#[derive(Debug, Default)]
pub struct VisitedSet {
    entities: HashMap<EntityKey, Entity>,
    order: Vec<EntityKey>,
    parents: HashMap<EntityKey, EntityKey>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Parent back-reference resolved when `key` was inserted. Present even
    /// when the parent itself was never fetched.
    pub fn parent_of(&self, key: &EntityKey) -> Option<&EntityKey> {
        self.parents.get(key)
    }

    /// Keys in first-discovery order.
    pub fn keys_in_order(&self) -> impl Iterator<Item = &EntityKey> {
        self.order.iter()
    }

    /// First write wins; returns whether the entity was newly inserted.
    pub fn insert(&mut self, entity: Entity, parent: Option<EntityKey>) -> bool {
        let key = entity.key();
        if self.entities.contains_key(&key) {
            return false;
        }
        if let Some(parent) = parent {
            self.parents.insert(key.clone(), parent);
        }
        self.order.push(key.clone());
        self.entities.insert(key, entity);
        true
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        HashMap<EntityKey, Entity>,
        Vec<EntityKey>,
        HashMap<EntityKey, EntityKey>,
    ) {
        (self.entities, self.order, self.parents)
    }
}

type Fetch = BoxFuture<'static, Result<Vec<Entity>, ReconstructionError>>;

/// Bidirectional, batched, deduplicating hierarchy traversal.
pub struct TraversalEngine {
    gateway: Arc<dyn FetchGateway>,
    registry: Arc<RelationshipRegistry>,
    config: TraversalConfig,
}

impl TraversalEngine {
    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        registry: Arc<RelationshipRegistry>,
        config: TraversalConfig,
    ) -> Self {
        let config = TraversalConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            gateway,
            registry,
            config,
        }
    }

    /// Walk descendants and/or ancestors outward from the seed entities
    /// until no new frontier remains.
    ///
    /// An empty seed set returns an empty visited set without touching the
    /// gateway. Any fetch failure aborts the whole traversal.
    pub async fn traverse(
        &self,
        seeds: Vec<Entity>,
    ) -> Result<VisitedSet, ReconstructionError> {
        let mut visited = VisitedSet::new();
        if seeds.is_empty() {
            return Ok(visited);
        }

        let mut seed_keys = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let parent = self.registry.resolve_parent(&seed);
            let key = seed.key();
            if visited.insert(seed, parent) {
                seed_keys.push(key);
            }
        }
        debug!(seeds = seed_keys.len(), "traversal starting");

        if self.config.expand_down {
            self.expand_down(&mut visited, seed_keys.clone()).await?;
        }
        if self.config.expand_up {
            self.expand_up(&mut visited, seed_keys).await?;
        }

        debug!(total = visited.len(), "traversal complete");
        Ok(visited)
    }

    /// Level-by-level descendant expansion.
    async fn expand_down(
        &self,
        visited: &mut VisitedSet,
        mut frontier: Vec<EntityKey>,
    ) -> Result<(), ReconstructionError> {
        let mut round = 0usize;
        while !frontier.is_empty() {
            round += 1;
            let mut fetches: Vec<Fetch> = Vec::new();
            // (child type, filter property) -> distinct parent identities
            let mut reverse: Vec<((TypeTag, String), Vec<i64>)> = Vec::new();

            for key in &frontier {
                let Some(entity) = visited.get(key) else {
                    continue;
                };
                let Some(rule) = self.registry.rule(&entity.entity_type) else {
                    continue;
                };

                for field in &rule.child_collection_fields {
                    if entity.has_collection(field) {
                        fetches.push(self.collection_fetch(entity.clone(), field.clone(), round));
                    }
                }

                for assoc in &rule.reverse_associations {
                    let property = format!("{}.{}", assoc.association_field, FIELD_OBJECT_ID);
                    let slot = reverse
                        .iter_mut()
                        .find(|((tag, prop), _)| tag == &assoc.child_type && prop == &property);
                    match slot {
                        Some((_, ids)) => {
                            if !ids.contains(&entity.object_id) {
                                ids.push(entity.object_id);
                            }
                        }
                        None => reverse
                            .push(((assoc.child_type.clone(), property), vec![entity.object_id])),
                    }
                }
            }

            for ((child_type, property), ids) in reverse {
                for chunk in ids.chunks(self.config.batch_size) {
                    fetches.push(self.reverse_fetch(child_type.clone(), property.clone(), chunk, round));
                }
            }

            if fetches.is_empty() {
                break;
            }
            debug!(
                round,
                frontier = frontier.len(),
                fetches = fetches.len(),
                "downward round issued"
            );

            let results = try_join_all(fetches).await?;
            frontier = self.merge(visited, results);
            debug!(round, inserted = frontier.len(), total = visited.len(), "downward round merged");
        }
        Ok(())
    }

    /// Ancestor expansion keyed by resolved parent identity.
    ///
    /// Crate-visible so tests can drive it to a fixed point and assert
    /// idempotence.
    pub(crate) async fn expand_up(
        &self,
        visited: &mut VisitedSet,
        mut frontier: Vec<EntityKey>,
    ) -> Result<(), ReconstructionError> {
        let mut round = 0usize;
        while !frontier.is_empty() {
            round += 1;
            // distinct, not-yet-visited parent identities grouped by type
            let mut by_type: Vec<(TypeTag, Vec<i64>)> = Vec::new();
            for key in &frontier {
                let Some(parent) = visited.parent_of(key) else {
                    continue;
                };
                if visited.contains(parent) {
                    continue;
                }
                let slot = by_type
                    .iter_mut()
                    .find(|(tag, _)| tag == &parent.entity_type);
                match slot {
                    Some((_, ids)) => {
                        if !ids.contains(&parent.object_id) {
                            ids.push(parent.object_id);
                        }
                    }
                    None => by_type.push((parent.entity_type.clone(), vec![parent.object_id])),
                }
            }

            let mut fetches: Vec<Fetch> = Vec::new();
            for (tag, ids) in by_type {
                for chunk in ids.chunks(self.config.batch_size) {
                    fetches.push(self.identity_fetch(tag.clone(), chunk, round));
                }
            }

            if fetches.is_empty() {
                break;
            }
            debug!(
                round,
                frontier = frontier.len(),
                fetches = fetches.len(),
                "upward round issued"
            );

            let results = try_join_all(fetches).await?;
            frontier = self.merge(visited, results);
            debug!(round, inserted = frontier.len(), total = visited.len(), "upward round merged");
        }
        Ok(())
    }

    /// Merge one round's results, first write wins. Returns the keys that
    /// were newly inserted — the next round's frontier.
    fn merge(&self, visited: &mut VisitedSet, results: Vec<Vec<Entity>>) -> Vec<EntityKey> {
        let mut inserted = Vec::new();
        for entity in results.into_iter().flatten() {
            let key = entity.key();
            if visited.contains(&key) {
                continue;
            }
            let parent = self.registry.resolve_parent(&entity);
            if visited.insert(entity, parent) {
                inserted.push(key);
            }
        }
        inserted
    }

    fn collection_fetch(&self, owner: Entity, field: String, round: usize) -> Fetch {
        let gateway = Arc::clone(&self.gateway);
        let fields = self.config.fetch_fields.clone();
        async move {
            let detail = format!("collection '{}' of {}", field, owner.key());
            gateway
                .fetch_collection(&owner, &field, &fields)
                .await
                .map_err(|source| ReconstructionError::ExpansionFailed {
                    direction: Direction::Down,
                    round,
                    detail,
                    source,
                })
        }
        .boxed()
    }

    fn reverse_fetch(
        &self,
        child_type: TypeTag,
        property: String,
        ids: &[i64],
        round: usize,
    ) -> Fetch {
        let gateway = Arc::clone(&self.gateway);
        let fields = self.config.fetch_fields.clone();
        let filter = FilterExpression::any_of(&property, ids);
        let batch = ids.len();
        async move {
            gateway
                .fetch_by_filter(&child_type, &filter, &fields)
                .await
                .map_err(|source| ReconstructionError::ExpansionFailed {
                    direction: Direction::Down,
                    round,
                    detail: format!(
                        "'{child_type}' records via '{property}' (batch of {batch})"
                    ),
                    source,
                })
        }
        .boxed()
    }

    fn identity_fetch(&self, entity_type: TypeTag, ids: &[i64], round: usize) -> Fetch {
        let gateway = Arc::clone(&self.gateway);
        let fields = self.config.fetch_fields.clone();
        let ids = ids.to_vec();
        async move {
            let batch = ids.len();
            gateway
                .fetch_by_identity_batch(&entity_type, &ids, &fields)
                .await
                .map_err(|source| ReconstructionError::ExpansionFailed {
                    direction: Direction::Up,
                    round,
                    detail: format!("'{entity_type}' ancestors by identity (batch of {batch})"),
                    source,
                })
        }
        .boxed()
    }
}

#[cfg(test)]
#[path = "traversal_test.rs"]
mod traversal_test;
