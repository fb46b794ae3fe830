//! Structural change operations.
//!
//! The synthesizer produces [`Step`]s: single [`Operation`]s or
//! [`OperationBatch`]es that must stay contiguous. The orderer flattens them
//! into the final operation list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an operation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Creates an object.
    Create,
    /// Alters an object in place.
    Alter,
    /// Drops an object.
    Drop,
    /// Renames an object.
    Rename,
    /// Backfills data (an UPDATE).
    SetDefaults,
}

impl OpKind {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Alter => "alter",
            Self::Drop => "drop",
            Self::Rename => "rename",
            Self::SetDefaults => "set_defaults",
        }
    }
}

/// The kind of schema object an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A table.
    Table,
    /// A column.
    Column,
    /// An index.
    Index,
    /// A foreign key constraint.
    ForeignKey,
    /// A unique or check constraint.
    Constraint,
    /// A trigger.
    Trigger,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Index => "index",
            Self::ForeignKey => "foreign key",
            Self::Constraint => "constraint",
            Self::Trigger => "trigger",
        };
        f.write_str(label)
    }
}

/// Identifies the object an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Object kind.
    pub kind: ObjectKind,
    /// Owning table (the table itself for tables).
    pub table: String,
    /// Object name.
    pub name: String,
}

impl ObjectRef {
    /// Creates an object reference.
    #[must_use]
    pub fn new(kind: ObjectKind, table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            name: name.into(),
        }
    }

    /// Reference to a table.
    #[must_use]
    pub fn table(name: &str) -> Self {
        Self::new(ObjectKind::Table, name, name)
    }
}

/// A single structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// What the operation does.
    pub kind: OpKind,
    /// The targeted object.
    pub object: ObjectRef,
    /// Shared statement head, e.g. `ALTER TABLE "t"`.
    #[serde(default)]
    pub prefix: Option<String>,
    /// The statement body (or the whole statement without a prefix).
    pub sql: String,
}

impl Operation {
    /// Creates an operation.
    #[must_use]
    pub fn new(kind: OpKind, object: ObjectRef, sql: impl Into<String>) -> Self {
        Self {
            kind,
            object,
            prefix: None,
            sql: sql.into(),
        }
    }

    /// Sets the statement prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Renders the complete statement.
    #[must_use]
    pub fn statement(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{} {}", prefix, self.sql),
            None => self.sql.clone(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.statement())
    }
}

/// Operations that must be emitted contiguously and in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBatch {
    /// The object the batch is about.
    pub object: ObjectRef,
    /// Member operations.
    pub operations: Vec<Operation>,
}

impl OperationBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new(object: ObjectRef) -> Self {
        Self {
            object,
            operations: Vec::new(),
        }
    }

    /// Appends an operation.
    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Returns true if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Converts into a step: a single operation stays single.
    #[must_use]
    pub fn into_step(mut self) -> Option<Step> {
        match self.operations.len() {
            0 => None,
            1 => self.operations.pop().map(Step::Single),
            _ => Some(Step::Batch(self)),
        }
    }
}

/// A unit the orderer sorts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// One operation.
    Single(Operation),
    /// A contiguous group.
    Batch(OperationBatch),
}

impl Step {
    /// Member operations, in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        match self {
            Self::Single(op) => std::slice::from_ref(op),
            Self::Batch(batch) => &batch.operations,
        }
    }

    /// Consumes the step into its operations.
    #[must_use]
    pub fn into_operations(self) -> Vec<Operation> {
        match self {
            Self::Single(op) => vec![op],
            Self::Batch(batch) => batch.operations,
        }
    }
}

impl From<Operation> for Step {
    fn from(op: Operation) -> Self {
        Self::Single(op)
    }
}
