//! Data Models
//!
//! This module contains the core data structures used throughout TreeScope:
//!
//! - `Entity` / `TypeTag` / `EntityKey` - universal typed records and their
//!   identities
//! - `FilterExpression` - parsed seed/lookup filter expressions
//!
//! All type-specific data lives in the entity's open `fields` mapping; the
//! structs here carry only identity and structure.

mod entity;
mod filter;

pub use entity::{Entity, EntityKey, TypeTag, FIELD_NAME, FIELD_OBJECT_ID, FIELD_REF_TYPE};
pub use filter::{FilterExpression, FilterOperator, FilterParseError};
