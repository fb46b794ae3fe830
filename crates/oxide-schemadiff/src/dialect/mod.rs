//! Database dialect implementations.
//!
//! Each dialect knows how to render schema objects and structural changes
//! as SQL for that database system. Statements that alter a table are split
//! into a shared prefix (`ALTER TABLE "t"`) and a clause so consecutive
//! clauses can be combined into one statement.

mod oracle;
mod postgres;
mod sqlite;

pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::schema::{
    ColumnSchema, ConstraintKind, ConstraintSchema, ForeignKeySchema, IndexSchema, SqlType,
    TableSchema, TriggerSchema, Value,
};
use crate::sql::{Expr, UpdateStatement};

/// A rendered statement: optional shared head plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Shared statement head.
    pub prefix: Option<String>,
    /// Statement body.
    pub sql: String,
}

impl Fragment {
    /// A complete statement without prefix.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            prefix: None,
            sql: sql.into(),
        }
    }

    /// A clause under a shared prefix.
    #[must_use]
    pub fn prefixed(prefix: String, sql: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix),
            sql: sql.into(),
        }
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

/// Which aspect of a column an alter clause changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnChange {
    /// Data type.
    Type,
    /// Column default.
    Default,
    /// NULL / NOT NULL.
    Nullability,
}

/// Looks up a dialect by its name.
#[must_use]
pub fn dialect_by_name(name: &str) -> Option<Box<dyn MigrationDialect>> {
    match name.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Some(Box::new(PostgresDialect::new())),
        "sqlite" => Some(Box::new(SqliteDialect::new())),
        "oracle" => Some(Box::new(OracleDialect::new())),
        _ => None,
    }
}

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Returns whether this dialect supports adding constraints after table creation.
    fn supports_add_constraint(&self) -> bool;

    /// Returns whether altering a table means recreating it.
    fn rebuilds_table_on_alter(&self) -> bool {
        false
    }

    /// Returns whether one ALTER TABLE may carry several comma-separated
    /// clauses.
    fn supports_multi_clause_alter(&self) -> bool {
        true
    }

    /// Returns whether dropping a column also drops indexes and constraints
    /// that use it.
    fn drop_column_cascades(&self) -> bool {
        true
    }

    /// Keyword emitted after PRIMARY KEY for auto-increment columns.
    fn auto_increment_keyword(&self) -> Option<&'static str> {
        None
    }

    /// Keyword introducing a column modification clause.
    fn modify_column_keyword(&self) -> &'static str {
        "ALTER COLUMN"
    }

    /// Clause removing a column default.
    fn drop_default_clause(&self) -> &'static str {
        "DROP DEFAULT"
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name)
    }

    /// Boolean literal.
    fn render_bool(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    /// Renders a literal value.
    fn render_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => self.render_bool(*b).to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format!("{:?}", f),
            Value::Decimal(d) => d.clone(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Expression(e) => e.clone(),
        }
    }

    /// Type of a column as written in its definition.
    fn column_type(&self, column: &ColumnSchema) -> String {
        self.type_name(&column.sql_type)
    }

    /// Column definition without any primary key clause.
    ///
    /// `default_override` replaces the column's own default, which is how
    /// temporary backfill defaults are rendered.
    fn column_definition(&self, column: &ColumnSchema, default_override: Option<&Value>) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.column_type(column),
        ];

        if let Some(default) = default_override.or(column.default.as_ref()) {
            parts.push(format!("DEFAULT {}", self.render_value(default)));
        }

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }

    /// Definition of a single-column primary key declared inline.
    fn primary_key_column_definition(&self, column: &ColumnSchema) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.column_type(column),
            "PRIMARY KEY".to_string(),
        ];
        if column.auto_increment {
            if let Some(keyword) = self.auto_increment_keyword() {
                parts.push(keyword.to_string());
            }
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.render_value(default)));
        }
        parts.join(" ")
    }

    /// `ALTER TABLE "t"`.
    fn alter_table_prefix(&self, table: &str) -> String {
        format!("ALTER TABLE {}", self.quote_identifier(table))
    }

    /// Renders `CREATE TABLE`, with foreign keys and checks inline when the
    /// dialect cannot add constraints later.
    fn create_table(&self, table: &TableSchema) -> String {
        let inline_pk = table.primary_key.len() == 1;
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                if inline_pk && table.primary_key[0] == c.name {
                    self.primary_key_column_definition(c)
                } else {
                    self.column_definition(c, None)
                }
            })
            .collect();

        if table.primary_key.len() > 1 {
            lines.push(format!("PRIMARY KEY ({})", self.column_list(&table.primary_key)));
        }

        if !self.supports_add_constraint() {
            for fk in &table.foreign_keys {
                lines.push(self.foreign_key_clause(fk));
            }
            for constraint in &table.constraints {
                if matches!(constraint.kind, ConstraintKind::Check { .. }) {
                    lines.push(self.constraint_clause(constraint));
                }
            }
        }

        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            lines.join(",\n  ")
        )
    }

    /// Renders `DROP TABLE`.
    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Renames a table.
    fn rename_table(&self, old_name: &str, new_name: &str) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(old_name),
            format!("RENAME TO {}", self.quote_identifier(new_name)),
        )
    }

    /// Adds a column.
    fn add_column(&self, table: &str, column: &ColumnSchema, default_override: Option<&Value>) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("ADD COLUMN {}", self.column_definition(column, default_override)),
        )
    }

    /// Drops a column.
    fn drop_column(&self, table: &str, column: &str) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("DROP COLUMN {}", self.quote_identifier(column)),
        )
    }

    /// Renames a column.
    fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!(
                "RENAME COLUMN {} TO {}",
                self.quote_identifier(old_name),
                self.quote_identifier(new_name)
            ),
        )
    }

    /// Clause changing a column's type.
    fn alter_type_clause(&self, column: &ColumnSchema) -> String {
        format!(
            "{} {} TYPE {}",
            self.modify_column_keyword(),
            self.quote_identifier(&column.name),
            self.column_type(column)
        )
    }

    /// Clause changing a column's nullability.
    fn nullability_clause(&self, column: &str, nullable: bool) -> String {
        format!(
            "{} {} {}",
            self.modify_column_keyword(),
            self.quote_identifier(column),
            if nullable { "DROP NOT NULL" } else { "SET NOT NULL" }
        )
    }

    /// Clause setting or removing a column's default.
    fn default_clause(&self, column: &str, default: Option<&Value>) -> String {
        match default {
            Some(value) => format!(
                "{} {} SET DEFAULT {}",
                self.modify_column_keyword(),
                self.quote_identifier(column),
                self.render_value(value)
            ),
            None => format!(
                "{} {} {}",
                self.modify_column_keyword(),
                self.quote_identifier(column),
                self.drop_default_clause()
            ),
        }
    }

    /// Alter clauses turning `prev` into `new`, in type, default,
    /// nullability order. Both columns carry the new name.
    fn alter_column_clauses(&self, prev: &ColumnSchema, new: &ColumnSchema) -> Vec<(ColumnChange, String)> {
        let mut clauses = Vec::new();
        if self.column_type(prev) != self.column_type(new) {
            clauses.push((ColumnChange::Type, self.alter_type_clause(new)));
        }
        if prev.default != new.default {
            clauses.push((
                ColumnChange::Default,
                self.default_clause(&new.name, new.default.as_ref()),
            ));
        }
        if prev.nullable != new.nullable {
            clauses.push((
                ColumnChange::Nullability,
                self.nullability_clause(&new.name, new.nullable),
            ));
        }
        clauses
    }

    /// Comma-separated quoted column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Creates an index.
    fn create_index(&self, table: &str, index: &IndexSchema) -> Fragment {
        Fragment::new(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.column_list(&index.columns)
        ))
    }

    /// Drops an index.
    fn drop_index(&self, _table: &str, name: &str) -> Fragment {
        Fragment::new(format!("DROP INDEX {}", self.quote_identifier(name)))
    }

    /// Renames an index, if the dialect can.
    fn rename_index(&self, _table: &str, old_name: &str, new_name: &str) -> Option<Fragment> {
        Some(Fragment::new(format!(
            "ALTER INDEX {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )))
    }

    /// `CONSTRAINT "fk" FOREIGN KEY (...) REFERENCES "t" (...) [ON ...]`.
    fn foreign_key_clause(&self, fk: &ForeignKeySchema) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&fk.name),
            self.column_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.column_list(&fk.references_columns)
        );
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.to_sql());
        }
        if let Some(action) = fk.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.to_sql());
        }
        sql
    }

    /// Adds a foreign key to an existing table.
    fn add_foreign_key(&self, table: &str, fk: &ForeignKeySchema) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("ADD {}", self.foreign_key_clause(fk)),
        )
    }

    /// Drops a foreign key.
    fn drop_foreign_key(&self, table: &str, name: &str) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("DROP CONSTRAINT {}", self.quote_identifier(name)),
        )
    }

    /// Renames a foreign key or table constraint, if the dialect can.
    fn rename_constraint(&self, table: &str, old_name: &str, new_name: &str) -> Option<Fragment> {
        Some(Fragment::prefixed(
            self.alter_table_prefix(table),
            format!(
                "RENAME CONSTRAINT {} TO {}",
                self.quote_identifier(old_name),
                self.quote_identifier(new_name)
            ),
        ))
    }

    /// `CONSTRAINT "n" UNIQUE (...)` or `CONSTRAINT "n" CHECK (...)`.
    fn constraint_clause(&self, constraint: &ConstraintSchema) -> String {
        match &constraint.kind {
            ConstraintKind::Unique { columns } => format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(&constraint.name),
                self.column_list(columns)
            ),
            ConstraintKind::Check { expression } => format!(
                "CONSTRAINT {} CHECK ({})",
                self.quote_identifier(&constraint.name),
                expression
            ),
        }
    }

    /// Adds a unique or check constraint.
    fn add_constraint(&self, table: &str, constraint: &ConstraintSchema) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("ADD {}", self.constraint_clause(constraint)),
        )
    }

    /// Drops a unique or check constraint.
    fn drop_constraint(&self, table: &str, constraint: &ConstraintSchema) -> Fragment {
        Fragment::prefixed(
            self.alter_table_prefix(table),
            format!("DROP CONSTRAINT {}", self.quote_identifier(&constraint.name)),
        )
    }

    /// `BEFORE INSERT OR UPDATE`.
    fn trigger_event_clause(&self, trigger: &TriggerSchema) -> String {
        let events: Vec<&str> = trigger.events.iter().map(|e| e.to_sql()).collect();
        format!("{} {}", trigger.timing.to_sql(), events.join(" OR "))
    }

    /// Creates a trigger.
    fn create_trigger(&self, table: &str, trigger: &TriggerSchema) -> Fragment;

    /// Drops a trigger.
    fn drop_trigger(&self, _table: &str, name: &str) -> Fragment {
        Fragment::new(format!("DROP TRIGGER {}", self.quote_identifier(name)))
    }

    /// Renames a trigger, if the dialect can.
    fn rename_trigger(&self, table: &str, old_name: &str, new_name: &str) -> Option<Fragment>;

    /// Renders an expression.
    fn render_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column(name) => self.quote_identifier(name),
            Expr::Value(value) => self.render_value(value),
            Expr::IsNull(inner) => format!("{} IS NULL", self.render_expr(inner)),
            Expr::Eq(lhs, rhs) => format!("{} = {}", self.render_expr(lhs), self.render_expr(rhs)),
            Expr::Or(terms) => {
                let parts: Vec<String> = terms.iter().map(|t| self.render_expr(t)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    /// Compiles an UPDATE statement.
    fn compile_update(&self, update: &UpdateStatement) -> String {
        let assignments: Vec<String> = update
            .assignments
            .iter()
            .map(|(column, expr)| format!("{} = {}", self.quote_identifier(column), self.render_expr(expr)))
            .collect();
        let mut sql = format!(
            "UPDATE {}\nSET {}",
            self.quote_identifier(&update.table),
            assignments.join(", ")
        );
        if let Some(condition) = &update.condition {
            sql.push_str("\nWHERE ");
            sql.push_str(&self.render_expr(condition));
        }
        sql
    }
}
