//! Migration scripts.
//!
//! A [`MigrationScript`] stores the ordered operations of one diff run as
//! typed JSON, so a later step can apply or inspect them without parsing
//! SQL. [`render_sql`] turns operations into a SQL script.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dialect::dialect_by_name;
use crate::error::Result;
use crate::operations::{OpKind, Operation};

/// A named, dialect-specific list of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationScript {
    /// Script name, e.g. `0002_rename_student`.
    pub name: String,
    /// Dialect the statements were rendered for.
    pub dialect: String,
    /// When the script was generated.
    pub generated_at: DateTime<Utc>,
    /// Operations in application order.
    pub operations: Vec<Operation>,
}

impl MigrationScript {
    /// Creates a script stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, dialect: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            name: name.into(),
            dialect: dialect.into(),
            generated_at: Utc::now(),
            operations,
        }
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a script from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the script as JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), operations = self.operations.len(), "Wrote migration script");
        Ok(())
    }

    /// Reads a script from a JSON file.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Renders the script as SQL. `combine_alters` is ignored for dialects
    /// that take a single clause per ALTER TABLE, and for unknown ones.
    #[must_use]
    pub fn to_sql(&self, combine_alters: bool) -> String {
        let combine = combine_alters
            && dialect_by_name(&self.dialect).is_some_and(|d| d.supports_multi_clause_alter());
        render_sql(&self.operations, combine)
    }
}

/// Builds a script name such as `0001_add_course_code`.
#[must_use]
pub fn script_name(number: u32, description: &str) -> String {
    let mut slug = String::new();
    for ch in description.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        format!("{:04}_auto", number)
    } else {
        format!("{:04}_{}", number, slug)
    }
}

struct Statement<'a> {
    prefix: Option<&'a str>,
    clauses: Vec<&'a str>,
    combinable: bool,
}

/// Renders operations as `;`-terminated statements, one per line.
///
/// With `combine_alters`, consecutive non-rename operations sharing a
/// prefix become one multi-clause statement.
#[must_use]
pub fn render_sql(operations: &[Operation], combine_alters: bool) -> String {
    let mut statements: Vec<Statement<'_>> = Vec::new();

    for op in operations {
        let combinable = combine_alters && op.prefix.is_some() && op.kind != OpKind::Rename;
        if let Some(last) = statements.last_mut() {
            if combinable && last.combinable && last.prefix == op.prefix.as_deref() {
                last.clauses.push(op.sql.as_str());
                continue;
            }
        }
        statements.push(Statement {
            prefix: op.prefix.as_deref(),
            clauses: vec![op.sql.as_str()],
            combinable,
        });
    }

    let mut out = String::new();
    for statement in statements {
        match (statement.prefix, statement.clauses.as_slice()) {
            (None, clauses) => out.push_str(&clauses.join(" ")),
            (Some(prefix), [clause]) => {
                out.push_str(prefix);
                out.push(' ');
                out.push_str(clause);
            }
            (Some(prefix), clauses) => {
                out.push_str(prefix);
                out.push_str("\n  ");
                out.push_str(&clauses.join(",\n  "));
            }
        }
        out.push_str(";\n");
    }
    out
}
