//! PostgreSQL dialect for migrations.
//!
//! PostgreSQL supports transactional DDL, in-place column alteration and
//! renaming of every object kind, so no operation needs a table rebuild.

use crate::schema::{ColumnSchema, SqlType, TriggerSchema};

use super::{Fragment, MigrationDialect};

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({})", len),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp(None) => "TIMESTAMP".to_string(),
            SqlType::Timestamp(Some(precision)) => format!("TIMESTAMP({})", precision),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal(precision, scale) => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::Json => "JSONB".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    fn supports_add_constraint(&self) -> bool {
        true
    }

    // Auto-increment keys use the SERIAL pseudo-types.
    fn column_type(&self, column: &ColumnSchema) -> String {
        if column.auto_increment {
            match column.sql_type {
                SqlType::Integer => return "SERIAL".to_string(),
                SqlType::BigInt => return "BIGSERIAL".to_string(),
                SqlType::SmallInt => return "SMALLSERIAL".to_string(),
                _ => {}
            }
        }
        self.type_name(&column.sql_type)
    }

    fn create_trigger(&self, table: &str, trigger: &TriggerSchema) -> Fragment {
        Fragment::new(format!(
            "CREATE TRIGGER {} {} ON {} FOR EACH ROW EXECUTE FUNCTION {}",
            self.quote_identifier(&trigger.name),
            self.trigger_event_clause(trigger),
            self.quote_identifier(table),
            trigger.action
        ))
    }

    fn drop_trigger(&self, table: &str, name: &str) -> Fragment {
        Fragment::new(format!(
            "DROP TRIGGER {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        ))
    }

    fn rename_trigger(&self, table: &str, old_name: &str, new_name: &str) -> Option<Fragment> {
        Some(Fragment::new(format!(
            "ALTER TRIGGER {} ON {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(table),
            self.quote_identifier(new_name)
        )))
    }
}
