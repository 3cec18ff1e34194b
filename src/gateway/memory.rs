//! In-Memory Gateway
//!
//! `MemoryGateway` serves the `FetchGateway` contract from an in-process
//! dataset. It exists for tests and embedded use: filters are evaluated
//! with `FilterExpression::matches`, collections come from an adjacency
//! map, and every call is recorded so callers can assert the traversal
//! engine's fetch discipline (no duplicate fetches, batch-size bounds,
//! zero calls on empty input).
//!
//! Entities are returned in insertion order, so fixtures produce
//! deterministic discovery order.

use crate::gateway::FetchGateway;
use crate::models::{Entity, EntityKey, FilterExpression, TypeTag};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// One recorded gateway invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ByFilter {
        entity_type: TypeTag,
        filter: String,
    },
    ByIdentityBatch {
        entity_type: TypeTag,
        ids: Vec<i64>,
    },
    Collection {
        owner: EntityKey,
        field: String,
    },
}

/// In-process `FetchGateway` over a fixture dataset with a call log.
#[derive(Default)]
pub struct MemoryGateway {
    /// Insertion-ordered entity store
    entities: Vec<Entity>,
    /// (owner, collection field) -> member keys, in link order
    collections: HashMap<(EntityKey, String), Vec<EntityKey>>,
    /// Types whose fetches fail, for error-propagation tests
    failing_types: HashSet<TypeTag>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the dataset. First insertion of an identity wins.
    pub fn insert(&mut self, entity: Entity) {
        if self.find(&entity.key()).is_none() {
            self.entities.push(entity);
        }
    }

    /// Link `member` into `owner`'s named collection and keep the owner's
    /// collection `Count` field in sync so traversal sees it as populated.
    pub fn link_collection(&mut self, owner: &EntityKey, field: &str, member: &EntityKey) {
        let members = self
            .collections
            .entry((owner.clone(), field.to_string()))
            .or_default();
        members.push(member.clone());
        let count = members.len();
        if let Some(entity) = self
            .entities
            .iter_mut()
            .find(|entity| &entity.key() == owner)
        {
            entity
                .fields
                .insert(field.to_string(), serde_json::json!({ "Count": count }));
        }
    }

    /// Make every fetch touching `entity_type` fail, for tests exercising
    /// terminal traversal failure.
    pub fn fail_type(&mut self, entity_type: impl Into<TypeTag>) {
        self.failing_types.insert(entity_type.into());
    }

    /// Snapshot of the recorded calls.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("call log poisoned").len()
    }

    fn find(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.iter().find(|entity| &entity.key() == key)
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().expect("call log poisoned").push(call);
    }

    fn check_available(&self, entity_type: &TypeTag) -> Result<()> {
        if self.failing_types.contains(entity_type) {
            return Err(anyhow!("store rejected query for type '{entity_type}'"));
        }
        Ok(())
    }

    /// Project an entity down to the requested field set; identity columns
    /// always survive. An empty field list returns the record as stored.
    fn project(entity: &Entity, fields: &[String]) -> Entity {
        if fields.is_empty() {
            return entity.clone();
        }
        let mut projected = Entity::new(
            entity.entity_type.clone(),
            entity.object_id,
            entity.name.clone(),
        );
        for field in fields {
            if let Some(value) = entity.fields.get(field) {
                projected.fields.insert(field.clone(), value.clone());
            }
        }
        projected
    }
}

#[async_trait]
impl FetchGateway for MemoryGateway {
    async fn fetch_by_filter(
        &self,
        entity_type: &TypeTag,
        filter: &FilterExpression,
        fields: &[String],
    ) -> Result<Vec<Entity>> {
        self.record(GatewayCall::ByFilter {
            entity_type: entity_type.clone(),
            filter: filter.to_string(),
        });
        self.check_available(entity_type)?;
        Ok(self
            .entities
            .iter()
            .filter(|entity| &entity.entity_type == entity_type && filter.matches(entity))
            .map(|entity| Self::project(entity, fields))
            .collect())
    }

    async fn fetch_by_identity_batch(
        &self,
        entity_type: &TypeTag,
        ids: &[i64],
        fields: &[String],
    ) -> Result<Vec<Entity>> {
        self.record(GatewayCall::ByIdentityBatch {
            entity_type: entity_type.clone(),
            ids: ids.to_vec(),
        });
        self.check_available(entity_type)?;
        if ids.is_empty() {
            return Err(anyhow!("identity batch for '{entity_type}' is empty"));
        }
        Ok(self
            .entities
            .iter()
            .filter(|entity| &entity.entity_type == entity_type && ids.contains(&entity.object_id))
            .map(|entity| Self::project(entity, fields))
            .collect())
    }

    async fn fetch_collection(
        &self,
        owner: &Entity,
        collection_field: &str,
        fields: &[String],
    ) -> Result<Vec<Entity>> {
        self.record(GatewayCall::Collection {
            owner: owner.key(),
            field: collection_field.to_string(),
        });
        let members = self
            .collections
            .get(&(owner.key(), collection_field.to_string()))
            .cloned()
            .unwrap_or_default();
        let mut results = Vec::with_capacity(members.len());
        for key in members {
            self.check_available(&key.entity_type)?;
            let entity = self
                .find(&key)
                .ok_or_else(|| anyhow!("collection member '{key}' missing from store"))?;
            results.push(Self::project(entity, fields));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn folder(id: i64, name: &str) -> Entity {
        Entity::new("testfolder", id, name)
    }

    #[tokio::test]
    async fn filter_fetch_respects_type_and_expression() {
        let mut gateway = MemoryGateway::new();
        gateway.insert(folder(1, "Top"));
        gateway.insert(folder(2, "Archive"));
        gateway.insert(Entity::new("testcase", 3, "TC"));

        let filter = FilterExpression::parse("( Name = \"Archive\" )").unwrap();
        let results = gateway
            .fetch_by_filter(&TypeTag::new("testfolder"), &filter, &[])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].object_id, 2);
    }

    #[tokio::test]
    async fn projection_keeps_identity_and_requested_fields_only() {
        let mut gateway = MemoryGateway::new();
        gateway.insert(
            Entity::new("testcase", 3, "TC")
                .with_field("LastVerdict", json!("Pass"))
                .with_field("Notes", json!("long text")),
        );

        let fields = vec!["LastVerdict".to_string()];
        let results = gateway
            .fetch_by_identity_batch(&TypeTag::new("testcase"), &[3], &fields)
            .await
            .unwrap();
        assert_eq!(results[0].field("LastVerdict"), Some(json!("Pass")));
        assert_eq!(results[0].field("Notes"), None);
        assert_eq!(results[0].name, "TC");
    }

    #[tokio::test]
    async fn collections_serve_linked_members_in_order() {
        let mut gateway = MemoryGateway::new();
        let top = folder(1, "Top");
        gateway.insert(top.clone());
        gateway.insert(Entity::new("testcase", 10, "A"));
        gateway.insert(Entity::new("testcase", 11, "B"));
        gateway.link_collection(&top.key(), "TestCases", &EntityKey::new("testcase", 10));
        gateway.link_collection(&top.key(), "TestCases", &EntityKey::new("testcase", 11));

        // owner record now advertises the populated collection
        let stored = gateway.find(&top.key()).unwrap();
        assert!(stored.has_collection("TestCases"));

        let results = gateway.fetch_collection(&top, "TestCases", &[]).await.unwrap();
        assert_eq!(
            results.iter().map(|e| e.object_id).collect::<Vec<_>>(),
            vec![10, 11]
        );
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_types_poison_fetches() {
        let mut gateway = MemoryGateway::new();
        gateway.insert(folder(1, "Top"));
        gateway.fail_type("testfolder");

        let filter = FilterExpression::parse("( ObjectID > 0 )").unwrap();
        let error = gateway
            .fetch_by_filter(&TypeTag::new("testfolder"), &filter, &[])
            .await
            .unwrap_err();
        assert!(error.to_string().contains("testfolder"));
    }
}
