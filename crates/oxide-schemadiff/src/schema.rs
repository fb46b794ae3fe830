//! Schema snapshot types.
//!
//! A [`SchemaSnapshot`] is the structural description of one schema version:
//! tables with their columns, indexes, foreign keys, constraints and
//! triggers. Snapshots are produced by an external schema generator and are
//! only read here.

use serde::{Deserialize, Serialize};

/// SQL data types understood by the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(u32),
    /// Fixed-length character string.
    Char(u32),
    /// Boolean.
    Boolean,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Timestamp with optional fractional-second precision.
    Timestamp(Option<u8>),
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Binary large object.
    Blob,
    /// JSON data.
    Json,
    /// UUID.
    Uuid,
    /// A type spelled verbatim (an explicit `sql_type` on the model).
    Custom(String),
}

impl SqlType {
    /// Returns true for character types, whose optional attributes may use
    /// the empty string as their "no value" sentinel.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Varchar(_) | Self::Char(_))
    }
}

/// A literal value: a column default or an attribute's initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Floating point literal.
    Float(f64),
    /// Exact decimal literal, kept textual (e.g. `"1.0"`).
    Decimal(String),
    /// String literal.
    String(String),
    /// Raw SQL expression (e.g. `CURRENT_TIMESTAMP`).
    Expression(String),
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// SQL data type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Column-level SQL default.
    #[serde(default)]
    pub default: Option<Value>,
    /// Whether this column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether this column auto-increments.
    #[serde(default)]
    pub auto_increment: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    /// Creates a new, nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the column-level default.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the column as (part of) the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false; // Primary keys are always NOT NULL
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Columns included in the index.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSchema {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique: false,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    /// Constraint name.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update.
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKeySchema {
    /// Creates a foreign key without referential actions.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.iter().map(|c| (*c).to_string()).collect(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// The body of a named table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// UNIQUE over one or more columns.
    Unique {
        /// Constrained columns.
        columns: Vec<String>,
    },
    /// CHECK with a raw SQL expression.
    Check {
        /// The boolean expression.
        expression: String,
    },
}

/// Schema definition for a named table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintSchema {
    /// Constraint name.
    pub name: String,
    /// Constraint body.
    pub kind: ConstraintKind,
}

impl ConstraintSchema {
    /// Creates a UNIQUE constraint.
    #[must_use]
    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Unique {
                columns: columns.iter().map(|c| (*c).to_string()).collect(),
            },
        }
    }

    /// Creates a CHECK constraint.
    #[must_use]
    pub fn check(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Check {
                expression: expression.into(),
            },
        }
    }

    /// Columns the constraint names explicitly (none for CHECK).
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match &self.kind {
            ConstraintKind::Unique { columns } => columns,
            ConstraintKind::Check { .. } => &[],
        }
    }
}

/// When a trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerTiming {
    /// BEFORE the event.
    Before,
    /// AFTER the event.
    After,
    /// INSTEAD OF the event (views).
    InsteadOf,
}

impl TriggerTiming {
    /// Returns the SQL keyword(s).
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::InsteadOf => "INSTEAD OF",
        }
    }
}

/// A data-modifying event a trigger listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
}

impl TriggerEvent {
    /// Returns the SQL keyword.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Schema definition for a row-level trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerSchema {
    /// Trigger name.
    pub name: String,
    /// Firing time.
    pub timing: TriggerTiming,
    /// Events the trigger fires on.
    pub events: Vec<TriggerEvent>,
    /// Dialect-specific action: a function call for PostgreSQL, a statement
    /// list for SQLite.
    pub action: String,
}

impl TriggerSchema {
    /// Creates a trigger.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        timing: TriggerTiming,
        events: &[TriggerEvent],
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            timing,
            events: events.to_vec(),
            action: action.into(),
        }
    }
}

/// Reference to a model attribute, by entity and attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttrRef {
    /// Entity name.
    pub entity: String,
    /// Attribute name.
    pub attribute: String,
}

impl AttrRef {
    /// Creates an attribute reference.
    #[must_use]
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Column definitions, in declaration order.
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    /// Primary key column(s).
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Index definitions.
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
    /// Foreign key definitions.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySchema>,
    /// Unique and check constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintSchema>,
    /// Triggers.
    #[serde(default)]
    pub triggers: Vec<TriggerSchema>,
    /// Participating attributes, for many-to-many junction tables.
    #[serde(default)]
    pub m2m: Vec<AttrRef>,
}

impl TableSchema {
    /// Creates a new table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            constraints: Vec::new(),
            triggers: Vec::new(),
            m2m: Vec::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        if column.primary_key && !self.primary_key.contains(&column.name) {
            self.primary_key.push(column.name.clone());
        }
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeySchema) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Adds a unique or check constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: ConstraintSchema) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Adds a trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: TriggerSchema) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Declares the table a junction table for the given attributes.
    #[must_use]
    pub fn m2m(mut self, participants: Vec<AttrRef>) -> Self {
        self.m2m = participants;
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns true for many-to-many junction tables.
    #[must_use]
    pub fn is_m2m(&self) -> bool {
        !self.m2m.is_empty()
    }
}

/// A complete schema version: every table, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// All tables.
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl SchemaSnapshot {
    /// Creates a new empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to the snapshot.
    #[must_use]
    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Gets a mutable table by name.
    #[must_use]
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.iter_mut().find(|t| t.name == name)
    }
}
