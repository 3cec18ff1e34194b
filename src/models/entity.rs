//! Entity Data Structures
//!
//! This module defines the core `Entity` record and its identity types.
//! Every record fetched from the remote store — story, task, defect, test
//! folder, test case, portfolio item — is represented by the same struct;
//! type-specific data lives in the open `fields` mapping.
//!
//! # Architecture
//!
//! - **Universal Entity**: one struct for all work-item types
//! - **Open field bag**: all type-specific values in the `fields` JSON map;
//!   callers declare which field names the gateway must fetch
//! - **Identity**: an integer key scoped to the entity's type namespace
//!   (`EntityKey` pairs the two), plus a human label that is not required
//!   to be unique
//! - **Immutable after fetch**: parent back-references are resolved by the
//!   traversal layer into a side map, never written into the record
//!
//! # Examples
//!
//! ```rust
//! use treescope_core::models::{Entity, TypeTag};
//! use serde_json::json;
//!
//! let case = Entity::new(
//!     TypeTag::new("testcase"),
//!     512,
//!     "Login succeeds with valid credentials",
//! )
//! .with_field("LastVerdict", json!("Pass"))
//! .with_field("TestFolder", json!({"_type": "testfolder", "ObjectID": 40}));
//!
//! assert_eq!(case.key().to_string(), "testcase/512");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field holding the remote store's integer identity on every record.
pub const FIELD_OBJECT_ID: &str = "ObjectID";

/// Field holding the human label on every record.
pub const FIELD_NAME: &str = "Name";

/// Field carrying the type tag inside a reference object.
pub const FIELD_REF_TYPE: &str = "_type";

/// Lowercase type identifier for an entity (e.g. `"testcase"`,
/// `"hierarchicalrequirement"`, `"portfolioitem/feature"`).
///
/// Tags are normalized to lowercase on construction so that registry
/// lookups and identity comparisons are case-insensitive, matching the
/// remote store's behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Identity of an entity: type tag plus the integer key scoped to that
/// type's namespace.
///
/// Used as the visited-set key and as the parent back-reference target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityKey {
    pub entity_type: TypeTag,
    pub object_id: i64,
}

impl EntityKey {
    pub fn new(entity_type: impl Into<TypeTag>, object_id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            object_id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.object_id)
    }
}

/// One record of a domain type participating in the hierarchy.
///
/// All type-specific values live in `fields`; the struct itself carries
/// only the identity triplet. Records are immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Type tag selecting which relationship rules apply
    pub entity_type: TypeTag,

    /// Integer identity within the type's namespace
    pub object_id: i64,

    /// Human label (not required unique across types)
    pub name: String,

    /// Open mapping of fetched field values
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

impl Entity {
    pub fn new(entity_type: impl Into<TypeTag>, object_id: i64, name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            object_id,
            name: name.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Builder-style field setter, mainly for fixtures.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            entity_type: self.entity_type.clone(),
            object_id: self.object_id,
        }
    }

    /// Look up a field value by name. `ObjectID` and `Name` are always
    /// answerable even when absent from the field bag.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self.fields.get(name) {
            Some(value) => Some(value.clone()),
            None if name == FIELD_OBJECT_ID => Some(Value::from(self.object_id)),
            None if name == FIELD_NAME => Some(Value::String(self.name.clone())),
            None => None,
        }
    }

    /// Look up a dotted path (`"TestCase.ObjectID"`) through nested
    /// reference objects.
    pub fn field_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let mut current = self.field(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?.clone();
        }
        Some(current)
    }

    /// Parse a reference object (`{"_type": ..., "ObjectID": ...}`) held in
    /// the named field. Null, absent, or malformed values yield `None`.
    pub fn reference_in(&self, field: &str) -> Option<EntityKey> {
        let value = self.fields.get(field)?;
        let object = value.as_object()?;
        let object_id = object.get(FIELD_OBJECT_ID)?.as_i64()?;
        let entity_type = TypeTag::new(object.get(FIELD_REF_TYPE)?.as_str()?);
        Some(EntityKey {
            entity_type,
            object_id,
        })
    }

    /// Whether the named collection field is present and non-empty.
    ///
    /// Collection fields arrive as objects carrying a `Count`; an object
    /// without a `Count` is treated as populated, null/absent as empty.
    pub fn has_collection(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(Value::Object(object)) => match object.get("Count") {
                Some(count) => count.as_i64().unwrap_or(0) > 0,
                None => true,
            },
            Some(Value::Null) | None => false,
            Some(_) => false,
        }
    }
}
