//! Schema objects and name mapping.
//!
//! [`SchemaObject`] is the closed set of things a snapshot is made of.
//! [`objects_to_create`] lists them in an order in which they can be
//! created. [`NameMapper`] renders previous objects under their new names so
//! that two versions can be compared by canonical text.

use crate::correlate::Correlation;
use crate::dialect::MigrationDialect;
use crate::operations::{ObjectKind, ObjectRef};
use crate::schema::{
    ColumnSchema, ConstraintKind, ConstraintSchema, ForeignKeySchema, IndexSchema, SchemaSnapshot,
    TableSchema, TriggerSchema,
};

/// A borrowed schema object with its owning table.
#[derive(Debug, Clone, Copy)]
pub enum SchemaObject<'a> {
    /// A table.
    Table(&'a TableSchema),
    /// A column.
    Column(&'a TableSchema, &'a ColumnSchema),
    /// An index.
    Index(&'a TableSchema, &'a IndexSchema),
    /// A foreign key.
    ForeignKey(&'a TableSchema, &'a ForeignKeySchema),
    /// A unique or check constraint.
    Constraint(&'a TableSchema, &'a ConstraintSchema),
    /// A trigger.
    Trigger(&'a TableSchema, &'a TriggerSchema),
}

impl<'a> SchemaObject<'a> {
    /// The object kind.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Table(_) => ObjectKind::Table,
            Self::Column(..) => ObjectKind::Column,
            Self::Index(..) => ObjectKind::Index,
            Self::ForeignKey(..) => ObjectKind::ForeignKey,
            Self::Constraint(..) => ObjectKind::Constraint,
            Self::Trigger(..) => ObjectKind::Trigger,
        }
    }

    /// The owning table (the table itself for tables).
    #[must_use]
    pub fn table(&self) -> &'a TableSchema {
        match *self {
            Self::Table(t)
            | Self::Column(t, _)
            | Self::Index(t, _)
            | Self::ForeignKey(t, _)
            | Self::Constraint(t, _)
            | Self::Trigger(t, _) => t,
        }
    }

    /// The object name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match *self {
            Self::Table(t) => &t.name,
            Self::Column(_, c) => &c.name,
            Self::Index(_, i) => &i.name,
            Self::ForeignKey(_, f) => &f.name,
            Self::Constraint(_, c) => &c.name,
            Self::Trigger(_, t) => &t.name,
        }
    }

    /// Reference used in operations.
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.kind(), self.table().name.as_str(), self.name())
    }

    /// The text that creates the object; equal texts mean equal objects.
    #[must_use]
    pub fn create_text(&self, dialect: &dyn MigrationDialect) -> String {
        match *self {
            Self::Table(t) => dialect.create_table(t),
            Self::Column(_, c) => dialect.column_definition(c, None),
            Self::Index(t, i) => dialect.create_index(&t.name, i).statement(),
            Self::ForeignKey(t, f) => dialect.add_foreign_key(&t.name, f).statement(),
            Self::Constraint(t, c) => dialect.add_constraint(&t.name, c).statement(),
            Self::Trigger(t, tr) => dialect.create_trigger(&t.name, tr).statement(),
        }
    }
}

/// Lists the objects of a snapshot in creation order: per table the table,
/// its columns, indexes, constraints and triggers; then every foreign key.
///
/// Foreign keys and check constraints are part of `CREATE TABLE` on
/// dialects that cannot add constraints later, and are not listed.
#[must_use]
pub fn objects_to_create<'a>(
    snapshot: &'a SchemaSnapshot,
    dialect: &dyn MigrationDialect,
) -> Vec<SchemaObject<'a>> {
    let inline_constraints = !dialect.supports_add_constraint();
    let mut objects = Vec::new();

    for table in &snapshot.tables {
        objects.push(SchemaObject::Table(table));
        objects.extend(table.columns.iter().map(|c| SchemaObject::Column(table, c)));
        objects.extend(table.indexes.iter().map(|i| SchemaObject::Index(table, i)));
        objects.extend(
            table
                .constraints
                .iter()
                .filter(|c| !(inline_constraints && matches!(c.kind, ConstraintKind::Check { .. })))
                .map(|c| SchemaObject::Constraint(table, c)),
        );
        objects.extend(table.triggers.iter().map(|t| SchemaObject::Trigger(table, t)));
    }

    if !inline_constraints {
        for table in &snapshot.tables {
            objects.extend(table.foreign_keys.iter().map(|f| SchemaObject::ForeignKey(table, f)));
        }
    }

    objects
}

/// Finds a named object of the given kind anywhere in a snapshot.
#[must_use]
pub fn find_object<'a>(
    snapshot: &'a SchemaSnapshot,
    kind: ObjectKind,
    name: &str,
) -> Option<SchemaObject<'a>> {
    snapshot.tables.iter().find_map(|t| match kind {
        ObjectKind::Table => (t.name == name).then_some(SchemaObject::Table(t)),
        ObjectKind::Column => None,
        ObjectKind::Index => t
            .indexes
            .iter()
            .find(|i| i.name == name)
            .map(|i| SchemaObject::Index(t, i)),
        ObjectKind::ForeignKey => t
            .foreign_keys
            .iter()
            .find(|f| f.name == name)
            .map(|f| SchemaObject::ForeignKey(t, f)),
        ObjectKind::Constraint => t
            .constraints
            .iter()
            .find(|c| c.name == name)
            .map(|c| SchemaObject::Constraint(t, c)),
        ObjectKind::Trigger => t
            .triggers
            .iter()
            .find(|tr| tr.name == name)
            .map(|tr| SchemaObject::Trigger(t, tr)),
    })
}

/// Translates previous-version names into the new name space.
///
/// Unlinked names are returned unchanged.
#[derive(Debug, Clone, Copy)]
pub struct NameMapper<'c> {
    correlation: &'c Correlation,
}

impl<'c> NameMapper<'c> {
    /// Creates a mapper over a correlation.
    #[must_use]
    pub fn new(correlation: &'c Correlation) -> Self {
        Self { correlation }
    }

    /// New name of a previous table.
    #[must_use]
    pub fn table<'n>(&self, name: &'n str) -> &'n str
    where
        'c: 'n,
    {
        self.correlation.table_new(name).unwrap_or(name)
    }

    /// New name of a previous column.
    #[must_use]
    pub fn column<'n>(&self, table: &str, name: &'n str) -> &'n str
    where
        'c: 'n,
    {
        self.correlation
            .column_new(table, name)
            .map_or(name, |(_, c)| c.as_str())
    }

    /// New name of a previous named object.
    #[must_use]
    pub fn object<'n>(&self, kind: ObjectKind, name: &'n str) -> &'n str
    where
        'c: 'n,
    {
        self.correlation.object_new(kind, name).unwrap_or(name)
    }

    fn columns(&self, table: &str, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| self.column(table, c).to_string())
            .collect()
    }

    /// Index with new names.
    #[must_use]
    pub fn index(&self, table: &str, index: &IndexSchema) -> IndexSchema {
        IndexSchema {
            name: self.object(ObjectKind::Index, &index.name).to_string(),
            columns: self.columns(table, &index.columns),
            unique: index.unique,
        }
    }

    /// Foreign key with new names.
    #[must_use]
    pub fn foreign_key(&self, table: &str, fk: &ForeignKeySchema) -> ForeignKeySchema {
        ForeignKeySchema {
            name: self.object(ObjectKind::ForeignKey, &fk.name).to_string(),
            columns: self.columns(table, &fk.columns),
            references_table: self.table(&fk.references_table).to_string(),
            references_columns: self.columns(&fk.references_table, &fk.references_columns),
            on_delete: fk.on_delete,
            on_update: fk.on_update,
        }
    }

    /// Constraint with new names.
    #[must_use]
    pub fn constraint(&self, table: &str, constraint: &ConstraintSchema) -> ConstraintSchema {
        let kind = match &constraint.kind {
            ConstraintKind::Unique { columns } => ConstraintKind::Unique {
                columns: self.columns(table, columns),
            },
            ConstraintKind::Check { expression } => ConstraintKind::Check {
                expression: expression.clone(),
            },
        };
        ConstraintSchema {
            name: self.object(ObjectKind::Constraint, &constraint.name).to_string(),
            kind,
        }
    }

    /// Trigger with its new name.
    #[must_use]
    pub fn trigger(&self, trigger: &TriggerSchema) -> TriggerSchema {
        TriggerSchema {
            name: self.object(ObjectKind::Trigger, &trigger.name).to_string(),
            ..trigger.clone()
        }
    }

    /// Column with its new name.
    #[must_use]
    pub fn column_schema(&self, table: &str, column: &ColumnSchema) -> ColumnSchema {
        ColumnSchema {
            name: self.column(table, &column.name).to_string(),
            ..column.clone()
        }
    }

    /// Whole table with every name mapped.
    #[must_use]
    pub fn map_table(&self, table: &TableSchema) -> TableSchema {
        let t = table.name.as_str();
        TableSchema {
            name: self.table(t).to_string(),
            columns: table.columns.iter().map(|c| self.column_schema(t, c)).collect(),
            primary_key: self.columns(t, &table.primary_key),
            indexes: table.indexes.iter().map(|i| self.index(t, i)).collect(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|f| self.foreign_key(t, f))
                .collect(),
            constraints: table
                .constraints
                .iter()
                .map(|c| self.constraint(t, c))
                .collect(),
            triggers: table.triggers.iter().map(|tr| self.trigger(tr)).collect(),
            m2m: table.m2m.clone(),
        }
    }
}
