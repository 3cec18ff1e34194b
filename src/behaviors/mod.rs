//! Relationship Rule System
//!
//! This module provides the per-type relationship registry used by the
//! traversal engine:
//!
//! - `RelationshipRule` - data describing how one entity type links to its
//!   parents and children (no behavior)
//! - `RelationshipRegistry` - lookup keyed by exact type tag or by a family
//!   pattern (the portfolio subtypes share one rule)
//!
//! The registry is a pure decision table: new entity types are supported by
//! adding rows (`with_rule`), never by branching inside the traversal
//! engine. Unknown types answer with empty rules, which the engine treats
//! as "no further expansion in that direction" rather than an error — the
//! domain's type set is open-ended and leaf types legitimately have no
//! children.

use crate::models::{Entity, EntityKey, TypeTag};
use regex::Regex;

/// How children of one type are found through a reverse query: the child
/// type is fetched by filtering on `association_field.ObjectID` against a
/// batch of parent identities, instead of reading a forward collection.
#[derive(Debug, Clone)]
pub struct ReverseAssociation {
    pub child_type: TypeTag,
    pub association_field: String,
}

/// Relationship data for one entity type.
///
/// - `parent_fields`: ordered; the first field holding a non-empty
///   reference wins parent resolution
/// - `child_collection_fields`: collections fetched directly off the entity
/// - `child_types`: types that may appear as children (informational plus
///   reverse-lookup planning)
/// - `reverse_associations`: child types that must be found by reverse
///   query rather than a forward collection
#[derive(Debug, Clone, Default)]
pub struct RelationshipRule {
    pub parent_fields: Vec<String>,
    pub child_collection_fields: Vec<String>,
    pub child_types: Vec<TypeTag>,
    pub reverse_associations: Vec<ReverseAssociation>,
}

impl RelationshipRule {
    fn association_field_for(&self, child_type: &TypeTag) -> Option<&str> {
        self.reverse_associations
            .iter()
            .find(|assoc| &assoc.child_type == child_type)
            .map(|assoc| assoc.association_field.as_str())
    }
}

/// How a rule is keyed: an exact tag, or a pattern shared by a type family
/// (portfolio subtypes such as `portfolioitem/feature` all match one row).
#[derive(Debug, Clone)]
enum TypeMatcher {
    Exact(TypeTag),
    Family(Regex),
}

impl TypeMatcher {
    fn matches(&self, tag: &TypeTag) -> bool {
        match self {
            Self::Exact(exact) => exact == tag,
            Self::Family(pattern) => pattern.is_match(tag.as_str()),
        }
    }
}

/// Static lookup of relationship rules per entity type.
pub struct RelationshipRegistry {
    rules: Vec<(TypeMatcher, RelationshipRule)>,
}

impl RelationshipRegistry {
    /// Empty registry; every lookup answers "no relationships".
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule keyed by exact type tag.
    pub fn with_rule(mut self, tag: impl Into<TypeTag>, rule: RelationshipRule) -> Self {
        self.rules.push((TypeMatcher::Exact(tag.into()), rule));
        self
    }

    /// Add a rule shared by every type whose tag matches the pattern.
    pub fn with_family_rule(mut self, pattern: Regex, rule: RelationshipRule) -> Self {
        self.rules.push((TypeMatcher::Family(pattern), rule));
        self
    }

    /// Look up the rule for a type. Unknown types yield `None`.
    pub fn rule(&self, tag: &TypeTag) -> Option<&RelationshipRule> {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(tag))
            .map(|(_, rule)| rule)
    }

    /// Whether the registry has a rule for this type.
    pub fn knows(&self, tag: &TypeTag) -> bool {
        self.rule(tag).is_some()
    }

    /// Ordered parent field names for a type; empty when unknown.
    pub fn parent_fields_of(&self, tag: &TypeTag) -> &[String] {
        self.rule(tag).map(|r| r.parent_fields.as_slice()).unwrap_or(&[])
    }

    /// Direct child collection field names for a type; empty when unknown.
    pub fn child_collection_fields_of(&self, tag: &TypeTag) -> &[String] {
        self.rule(tag)
            .map(|r| r.child_collection_fields.as_slice())
            .unwrap_or(&[])
    }

    /// Types that may appear as children of a type; empty when unknown.
    pub fn child_types_of(&self, tag: &TypeTag) -> &[TypeTag] {
        self.rule(tag).map(|r| r.child_types.as_slice()).unwrap_or(&[])
    }

    /// Foreign-key field associating `child_type` records back to a parent
    /// of type `parent_type`, when children are found by reverse query.
    pub fn association_field_for(
        &self,
        child_type: &TypeTag,
        parent_type: &TypeTag,
    ) -> Option<&str> {
        self.rule(parent_type)?.association_field_for(child_type)
    }

    /// Resolve an entity's parent reference: the first non-empty parent
    /// field wins. A reference to a type this registry does not recognize
    /// resolves to no parent rather than guessing.
    pub fn resolve_parent(&self, entity: &Entity) -> Option<EntityKey> {
        for field in self.parent_fields_of(&entity.entity_type) {
            if let Some(reference) = entity.reference_in(field) {
                if self.knows(&reference.entity_type) {
                    return Some(reference);
                }
                return None;
            }
        }
        None
    }

    /// Every field name any rule reads or fetches: parent fields plus child
    /// collection fields. Used to build the gateway fetch list so parent
    /// references and collection counts always arrive with each record.
    pub fn relationship_field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (_, rule) in &self.rules {
            for field in rule
                .parent_fields
                .iter()
                .chain(rule.child_collection_fields.iter())
            {
                if !names.iter().any(|existing| existing == field) {
                    names.push(field.clone());
                }
            }
        }
        names
    }
}

impl Default for RelationshipRegistry {
    /// The work-item domain table.
    ///
    /// | type                    | parents               | collections              | reverse children      |
    /// |-------------------------|-----------------------|--------------------------|-----------------------|
    /// | hierarchicalrequirement | Parent, PortfolioItem | Tasks, Defects, Children | -                     |
    /// | portfolio family        | Parent                | Children, UserStories    | -                     |
    /// | task                    | WorkProduct           | -                        | -                     |
    /// | testfolder              | Parent                | Children, TestCases      | -                     |
    /// | testcase                | TestFolder            | -                        | defect via `TestCase` |
    /// | defect                  | TestCase, Requirement | -                        | -                     |
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let tags = |items: &[&str]| items.iter().map(TypeTag::new).collect::<Vec<_>>();

        Self::empty()
            .with_rule(
                "hierarchicalrequirement",
                RelationshipRule {
                    parent_fields: strings(&["Parent", "PortfolioItem"]),
                    child_collection_fields: strings(&["Tasks", "Defects", "Children"]),
                    child_types: tags(&["hierarchicalrequirement", "task", "defect"]),
                    reverse_associations: vec![],
                },
            )
            .with_family_rule(
                Regex::new("portfolio").expect("portfolio family pattern"),
                RelationshipRule {
                    parent_fields: strings(&["Parent"]),
                    child_collection_fields: strings(&["Children", "UserStories"]),
                    child_types: tags(&["hierarchicalrequirement", "portfolioitem"]),
                    reverse_associations: vec![],
                },
            )
            .with_rule(
                "task",
                RelationshipRule {
                    parent_fields: strings(&["WorkProduct"]),
                    ..Default::default()
                },
            )
            .with_rule(
                "testfolder",
                RelationshipRule {
                    parent_fields: strings(&["Parent"]),
                    child_collection_fields: strings(&["Children", "TestCases"]),
                    child_types: tags(&["testfolder", "testcase"]),
                    reverse_associations: vec![],
                },
            )
            .with_rule(
                "testcase",
                RelationshipRule {
                    parent_fields: strings(&["TestFolder"]),
                    child_types: tags(&["defect"]),
                    reverse_associations: vec![ReverseAssociation {
                        child_type: TypeTag::new("defect"),
                        association_field: "TestCase".to_string(),
                    }],
                    ..Default::default()
                },
            )
            .with_rule(
                "defect",
                RelationshipRule {
                    parent_fields: strings(&["TestCase", "Requirement"]),
                    ..Default::default()
                },
            )
    }
}
