//! Model versions: entities, attributes and rename hints.
//!
//! A [`Model`] pairs the entity declarations of one schema version with the
//! [`SchemaSnapshot`] generated from them. Entities carry the identity the
//! correlation resolver works from; the snapshot carries the structure the
//! synthesizer compares.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{SchemaSnapshot, Value};

/// The role an attribute plays in its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    /// Primary key attribute.
    PrimaryKey,
    /// Mandatory attribute.
    Required,
    /// Attribute that may hold no value.
    Optional,
    /// Collection side of a relationship; owns no columns.
    Set,
    /// Inheritance discriminator column.
    Discriminator,
}

/// A declared entity attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute role.
    pub kind: AttrKind,
    /// Columns owned in the entity table, positional.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Static initial value used for backfills.
    #[serde(default)]
    pub initial: Option<Value>,
}

impl Attribute {
    /// Creates an attribute without columns.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: Vec::new(),
            initial: None,
        }
    }

    /// Shorthand for a single-column attribute whose column shares its name.
    #[must_use]
    pub fn simple(name: impl Into<String>, kind: AttrKind) -> Self {
        let name = name.into();
        Self::new(name.clone(), kind).column(name)
    }

    /// Adds an owned column.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Sets the initial value.
    #[must_use]
    pub fn initial(mut self, value: Value) -> Self {
        self.initial = Some(value);
        self
    }
}

/// A model entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity name.
    pub name: String,
    /// Table the entity is stored in (its root's table for derived entities).
    pub table: String,
    /// Direct superclasses; empty for root entities.
    #[serde(default)]
    pub bases: Vec<String>,
    /// Primary key attribute names. Only meaningful on root entities.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Attributes declared by this entity itself (inherited ones excluded).
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Entity {
    /// Creates a root entity.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            bases: Vec::new(),
            primary_key: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Adds a direct superclass.
    #[must_use]
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Sets the primary key attributes.
    #[must_use]
    pub fn primary_key(mut self, attributes: &[&str]) -> Self {
        self.primary_key = attributes.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        if attribute.kind == AttrKind::PrimaryKey && !self.primary_key.contains(&attribute.name) {
            self.primary_key.push(attribute.name.clone());
        }
        self.attributes.push(attribute);
        self
    }

    /// Returns true if the entity has no superclass.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.bases.is_empty()
    }

    /// Gets an own attribute by name.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// One model version: entities plus the schema generated from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Entities, in declaration order.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Generated schema.
    #[serde(default)]
    pub snapshot: SchemaSnapshot,
}

impl Model {
    /// Creates a model from its parts.
    #[must_use]
    pub fn new(entities: Vec<Entity>, snapshot: SchemaSnapshot) -> Self {
        Self { entities, snapshot }
    }

    /// Reads a model from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Gets an entity by name.
    #[must_use]
    pub fn get_entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Follows the first base until a root entity is reached.
    #[must_use]
    pub fn root_of<'a>(&'a self, entity: &'a Entity) -> Option<&'a Entity> {
        let mut current = entity;
        for _ in 0..=self.entities.len() {
            match current.bases.first() {
                None => return Some(current),
                Some(base) => current = self.get_entity(base)?,
            }
        }
        None
    }

    /// Returns true if an entity is stored in the given table.
    #[must_use]
    pub fn owns_table(&self, table: &str) -> bool {
        self.entities.iter().any(|e| e.table == table)
    }

    /// Finds the attribute owning a column, with its entity.
    #[must_use]
    pub fn attribute_for_column(&self, table: &str, column: &str) -> Option<(&Entity, &Attribute)> {
        self.entities
            .iter()
            .filter(|e| e.table == table)
            .find_map(|e| {
                e.attributes
                    .iter()
                    .find(|a| a.columns.iter().any(|c| c == column))
                    .map(|a| (e, a))
            })
    }
}

/// Explicit entity rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRename {
    /// Previous entity name.
    pub from: String,
    /// New entity name.
    pub to: String,
}

/// Explicit attribute rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRename {
    /// Entity name in the new model.
    pub entity: String,
    /// Previous attribute name.
    pub from: String,
    /// New attribute name.
    pub to: String,
}

/// The explicit rename input of a diff run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameHints {
    /// Entity renames.
    #[serde(default)]
    pub entities: Vec<EntityRename>,
    /// Attribute renames.
    #[serde(default)]
    pub attributes: Vec<AttributeRename>,
}

impl RenameHints {
    /// Creates an empty hint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity rename.
    #[must_use]
    pub fn rename_entity(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.entities.push(EntityRename {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Adds an attribute rename. `entity` is the entity's new name.
    #[must_use]
    pub fn rename_attribute(
        mut self,
        entity: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.attributes.push(AttributeRename {
            entity: entity.into(),
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Returns true if no rename is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.attributes.is_empty()
    }

    /// Reads hints from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
