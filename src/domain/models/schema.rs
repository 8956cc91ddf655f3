//! Entity schema domain models.
//!
//! An entity schema is the authoritative description of a storage table.
//! Schemas are loaded once per pipeline step and never mutated afterwards;
//! reverse relations are not stored on the schema itself but discovered by
//! scanning the whole [`SchemaCatalog`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::{DomainError, DomainResult};

/// Primary identity column of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryField {
    pub name: String,
    /// Storage type, e.g. `uuid`.
    #[serde(rename = "type", default = "default_primary_type")]
    pub ty: String,
}

fn default_primary_type() -> String {
    "uuid".to_string()
}

/// Plain scalar column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub nullable: bool,
}

/// Reference from this entity to a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BelongsTo {
    /// Relation member name, e.g. `customer`.
    pub name: String,
    /// Parent entity schema name.
    pub target: String,
    /// Foreign key column backing the relation, e.g. `shopping_customer_id`.
    pub foreign_key: String,
    #[serde(default)]
    pub nullable: bool,
    /// A unique foreign key makes the reverse side has-one instead of has-many.
    #[serde(default)]
    pub unique: bool,
    /// Member name of the reverse relation on the parent, e.g. `orders`.
    pub opposite_name: String,
}

/// Authoritative description of a storage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub name: String,
    pub primary: PrimaryField,
    #[serde(default)]
    pub plain_fields: Vec<PlainField>,
    #[serde(default)]
    pub belongs_to: Vec<BelongsTo>,
    #[serde(default)]
    pub description: Option<String>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: PrimaryField {
                name: "id".to_string(),
                ty: default_primary_type(),
            },
            plain_fields: Vec::new(),
            belongs_to: Vec::new(),
            description: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: impl Into<String>, nullable: bool) -> Self {
        self.plain_fields.push(PlainField {
            name: name.into(),
            ty: ty.into(),
            nullable,
        });
        self
    }

    pub fn with_belongs_to(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        nullable: bool,
        opposite_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let target = target.into();
        self.belongs_to.push(BelongsTo {
            foreign_key: format!("{target}_id"),
            name,
            target,
            nullable,
            unique: false,
            opposite_name: opposite_name.into(),
        });
        self
    }

    /// Mark the most recently added belongs-to relation as unique (one-to-one).
    pub fn unique(mut self) -> Self {
        if let Some(last) = self.belongs_to.last_mut() {
            last.unique = true;
        }
        self
    }
}

/// Reverse relation discovered on a parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseRelation {
    /// Member name on the parent (the child's `opposite_name`).
    pub name: String,
    /// Child entity schema that owns the foreign key.
    pub source: String,
    /// Relation member on the child pointing back here.
    pub via: String,
    /// `true` when the child's foreign key is unique (has-one).
    pub unique: bool,
}

/// Read-only collection of entity schemas, queryable by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, EntitySchema>,
}

impl SchemaCatalog {
    pub fn new(schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        Self {
            schemas: schemas.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.schemas.get(name)
    }

    pub fn require(&self, name: &str) -> DomainResult<&EntitySchema> {
        self.get(name)
            .ok_or_else(|| DomainError::EntitySchemaNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySchema> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Scan every schema for belongs-to relations pointing at `name`.
    ///
    /// Results are ordered by child schema name, then relation name.
    pub fn reverse_relations(&self, name: &str) -> Vec<ReverseRelation> {
        self.schemas
            .values()
            .flat_map(|child| {
                child
                    .belongs_to
                    .iter()
                    .filter(move |rel| rel.target == name)
                    .map(move |rel| ReverseRelation {
                        name: rel.opposite_name.clone(),
                        source: child.name.clone(),
                        via: rel.name.clone(),
                        unique: rel.unique,
                    })
            })
            .collect()
    }
}
