//! SQLite dialect for migrations.
//!
//! SQLite has limited ALTER TABLE support, so column changes use the
//! "table recreation" strategy: create a new table, copy data, drop the old
//! table, rename the new table. Foreign keys and check constraints only
//! exist inline in `CREATE TABLE`; unique constraints are unique indexes.

use crate::schema::{ConstraintKind, ConstraintSchema, SqlType, TriggerSchema};

use super::{Fragment, MigrationDialect};

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer | SqlType::SmallInt | SqlType::BigInt => "INTEGER".to_string(),
            SqlType::Text | SqlType::Varchar(_) | SqlType::Char(_) => "TEXT".to_string(),
            SqlType::Boolean => "INTEGER".to_string(),
            SqlType::Timestamp(_) | SqlType::Date | SqlType::Time => "TEXT".to_string(),
            SqlType::Real | SqlType::Double => "REAL".to_string(),
            SqlType::Decimal(_, _) => "NUMERIC".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Json | SqlType::Uuid => "TEXT".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn rebuilds_table_on_alter(&self) -> bool {
        true
    }

    fn drop_column_cascades(&self) -> bool {
        false
    }

    fn supports_multi_clause_alter(&self) -> bool {
        false
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        Some("AUTOINCREMENT")
    }

    fn render_bool(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn rename_index(&self, _table: &str, _old_name: &str, _new_name: &str) -> Option<Fragment> {
        None
    }

    fn rename_constraint(&self, _table: &str, _old_name: &str, _new_name: &str) -> Option<Fragment> {
        None
    }

    fn add_constraint(&self, table: &str, constraint: &ConstraintSchema) -> Fragment {
        match &constraint.kind {
            ConstraintKind::Unique { columns } => Fragment::new(format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                self.quote_identifier(&constraint.name),
                self.quote_identifier(table),
                self.column_list(columns)
            )),
            // Checks are rendered inline by create_table.
            ConstraintKind::Check { .. } => Fragment::prefixed(
                self.alter_table_prefix(table),
                format!("ADD {}", self.constraint_clause(constraint)),
            ),
        }
    }

    fn drop_constraint(&self, table: &str, constraint: &ConstraintSchema) -> Fragment {
        match &constraint.kind {
            ConstraintKind::Unique { .. } => self.drop_index(table, &constraint.name),
            ConstraintKind::Check { .. } => Fragment::prefixed(
                self.alter_table_prefix(table),
                format!("DROP CONSTRAINT {}", self.quote_identifier(&constraint.name)),
            ),
        }
    }

    fn create_trigger(&self, table: &str, trigger: &TriggerSchema) -> Fragment {
        Fragment::new(format!(
            "CREATE TRIGGER {} {} ON {} FOR EACH ROW BEGIN {} END",
            self.quote_identifier(&trigger.name),
            self.trigger_event_clause(trigger),
            self.quote_identifier(table),
            trigger.action
        ))
    }

    fn rename_trigger(&self, _table: &str, _old_name: &str, _new_name: &str) -> Option<Fragment> {
        None
    }
}
