//! Oracle dialect for migrations.
//!
//! Oracle alters columns with `MODIFY` and removes a default by setting it
//! to `DEFAULT NULL`.

use crate::schema::{ColumnSchema, SqlType, TriggerSchema, Value};

use super::{Fragment, MigrationDialect};

/// Oracle migration dialect.
#[derive(Debug, Clone, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer => "NUMBER(10)".to_string(),
            SqlType::BigInt => "NUMBER(19)".to_string(),
            SqlType::SmallInt => "NUMBER(5)".to_string(),
            SqlType::Text | SqlType::Json => "CLOB".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR2({})", len),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::Boolean => "NUMBER(1)".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time | SqlType::Timestamp(None) => "TIMESTAMP".to_string(),
            SqlType::Timestamp(Some(precision)) => format!("TIMESTAMP({})", precision),
            SqlType::Real => "BINARY_FLOAT".to_string(),
            SqlType::Double => "BINARY_DOUBLE".to_string(),
            SqlType::Decimal(precision, scale) => format!("NUMBER({}, {})", precision, scale),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Uuid => "RAW(16)".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    fn supports_add_constraint(&self) -> bool {
        true
    }

    fn supports_multi_clause_alter(&self) -> bool {
        false
    }

    fn modify_column_keyword(&self) -> &'static str {
        "MODIFY"
    }

    fn drop_default_clause(&self) -> &'static str {
        "DEFAULT NULL"
    }

    fn render_bool(&self, value: bool) -> &'static str {
        if value { "1" } else { "0" }
    }

    fn primary_key_column_definition(&self, column: &ColumnSchema) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.column_type(column),
        ];
        if column.auto_increment {
            parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string());
        }
        parts.push("PRIMARY KEY".to_string());
        parts.join(" ")
    }

    fn add_column(&self, table: &str, column: &ColumnSchema, default_override: Option<&Value>) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("ADD {}", self.column_definition(column, default_override)),
        )
    }

    fn alter_type_clause(&self, column: &ColumnSchema) -> String {
        format!(
            "MODIFY {} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)
        )
    }

    fn nullability_clause(&self, column: &str, nullable: bool) -> String {
        format!(
            "MODIFY {} {}",
            self.quote_identifier(column),
            if nullable { "NULL" } else { "NOT NULL" }
        )
    }

    fn default_clause(&self, column: &str, default: Option<&Value>) -> String {
        match default {
            Some(value) => format!(
                "MODIFY {} DEFAULT {}",
                self.quote_identifier(column),
                self.render_value(value)
            ),
            None => format!("MODIFY {} {}", self.quote_identifier(column), self.drop_default_clause()),
        }
    }

    fn create_trigger(&self, table: &str, trigger: &TriggerSchema) -> Fragment {
        Fragment::new(format!(
            "CREATE TRIGGER {} {} ON {} FOR EACH ROW {}",
            self.quote_identifier(&trigger.name),
            self.trigger_event_clause(trigger),
            self.quote_identifier(table),
            trigger.action
        ))
    }

    fn rename_trigger(&self, _table: &str, old_name: &str, new_name: &str) -> Option<Fragment> {
        Some(Fragment::new(format!(
            "ALTER TRIGGER {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )))
    }
}
