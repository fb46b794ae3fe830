//! Minimal UPDATE statement AST used for default backfills.
//!
//! Dialects compile these through
//! [`MigrationDialect::compile_update`](crate::dialect::MigrationDialect::compile_update).

use crate::schema::Value;

/// A scalar or boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference.
    Column(String),
    /// Literal.
    Value(Value),
    /// `expr IS NULL`.
    IsNull(Box<Expr>),
    /// `lhs = rhs`.
    Eq(Box<Expr>, Box<Expr>),
    /// Parenthesised disjunction.
    Or(Vec<Expr>),
}

impl Expr {
    /// Column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// Literal value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self::Value(value)
    }

    /// `self IS NULL`.
    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull(Box::new(self))
    }

    /// `self = other`.
    #[must_use]
    pub fn equals(self, other: Self) -> Self {
        Self::Eq(Box::new(self), Box::new(other))
    }

    /// Disjunction of the given expressions.
    #[must_use]
    pub fn or(terms: Vec<Self>) -> Self {
        Self::Or(terms)
    }
}

/// `UPDATE table SET ... [WHERE ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    /// Target table.
    pub table: String,
    /// Column assignments, in order.
    pub assignments: Vec<(String, Expr)>,
    /// Optional row filter.
    pub condition: Option<Expr>,
}

impl UpdateStatement {
    /// Starts an UPDATE of the given table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            condition: None,
        }
    }

    /// Adds a `column = expr` assignment.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, expr: Expr) -> Self {
        self.assignments.push((column.into(), expr));
        self
    }

    /// Sets the WHERE condition.
    #[must_use]
    pub fn filter(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }
}
