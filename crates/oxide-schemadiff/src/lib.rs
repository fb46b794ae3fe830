//! Rename-aware schema diffing.
//!
//! `oxide-schemadiff` compiles the difference between two versions of a data
//! model into an ordered list of SQL operations:
//!
//! - **Correlation** - links entities, attributes, tables, columns and named
//!   schema objects across the two versions, honouring rename hints
//! - **Synthesis** - emits create, alter, drop, rename and backfill steps for
//!   every object that changed
//! - **Ordering** - sorts the steps so dependent drops run under their old
//!   names, before the renames
//! - **Dialect** - renders each operation for PostgreSQL, SQLite or Oracle
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schemadiff::prelude::*;
//!
//! let prev = Model::from_json_file("models/v1.json")?;
//! let new = Model::from_json_file("models/v2.json")?;
//! let hints = RenameHints::new().rename_entity("Student", "Pupil");
//!
//! let differ = SchemaDiffer::new(PostgresDialect::new());
//! for op in differ.diff(&prev, &new, &hints)? {
//!     println!("{};", op.statement());
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the SQL turning v1 into v2
//! oxide-schemadiff diff --prev v1.json --new v2.json --renames renames.json
//!
//! # Save the operations as a script, then render it later
//! oxide-schemadiff diff --prev v1.json --new v2.json --format json -o 0002.json
//! oxide-schemadiff sql 0002.json
//! ```

pub mod correlate;
pub mod dialect;
pub mod error;
pub mod model;
pub mod object;
pub mod operations;
pub mod order;
pub mod schema;
pub mod script;
pub mod sql;
pub mod synthesize;

use tracing::info;

use crate::dialect::MigrationDialect;
use crate::error::Result;
use crate::model::{Model, RenameHints};
use crate::operations::Operation;
use crate::synthesize::{DiffOptions, SynthesisContext};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::correlate::{correlate, Correlation};
    pub use crate::dialect::{
        dialect_by_name, MigrationDialect, OracleDialect, PostgresDialect, SqliteDialect,
    };
    pub use crate::error::{MigrationError, Result};
    pub use crate::model::{AttrKind, Attribute, Entity, Model, RenameHints};
    pub use crate::operations::{ObjectKind, ObjectRef, OpKind, Operation, OperationBatch, Step};
    pub use crate::order::order;
    pub use crate::schema::{
        AttrRef, ColumnSchema, ConstraintKind, ConstraintSchema, ForeignKeyAction,
        ForeignKeySchema, IndexSchema, SchemaSnapshot, SqlType, TableSchema, TriggerEvent,
        TriggerSchema, TriggerTiming, Value,
    };
    pub use crate::script::{render_sql, script_name, MigrationScript};
    pub use crate::synthesize::{synthesize, DiffOptions, SynthesisContext};
    pub use crate::SchemaDiffer;
}

/// Runs correlation, synthesis and ordering for one dialect.
pub struct SchemaDiffer {
    dialect: Box<dyn MigrationDialect>,
    options: DiffOptions,
}

impl SchemaDiffer {
    /// Creates a differ for the given dialect with default options.
    pub fn new(dialect: impl MigrationDialect + 'static) -> Self {
        Self::from_boxed(Box::new(dialect))
    }

    /// Creates a differ from a boxed dialect, as returned by
    /// [`dialect::dialect_by_name`].
    #[must_use]
    pub fn from_boxed(dialect: Box<dyn MigrationDialect>) -> Self {
        Self {
            dialect,
            options: DiffOptions::default(),
        }
    }

    /// Replaces the diff options.
    #[must_use]
    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    /// The target dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn MigrationDialect {
        self.dialect.as_ref()
    }

    /// Computes the operations turning `prev` into `new`.
    ///
    /// Fails without partial output when the versions cannot be
    /// correlated, e.g. on a primary-key change.
    pub fn diff(&self, prev: &Model, new: &Model, hints: &RenameHints) -> Result<Vec<Operation>> {
        let correlation = correlate::correlate(prev, new, hints)?;
        let ctx = SynthesisContext {
            prev,
            new,
            correlation: &correlation,
            dialect: self.dialect.as_ref(),
            options: &self.options,
        };
        let steps = synthesize::synthesize(&ctx)?;
        let operations = order::order(steps);
        info!(
            dialect = self.dialect.name(),
            operations = operations.len(),
            "Computed schema diff"
        );
        Ok(operations)
    }
}
