//! Error types for the schema diff engine.

/// Errors that can occur while diffing two model versions.
///
/// Every variant aborts the run: no operations are returned alongside an
/// error.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A primary key was added, removed or retyped.
    #[error("Cannot change primary key")]
    PrimaryKeyChange {
        /// Entity (or table, for free tables) whose key changed.
        owner: String,
    },

    /// A correlated attribute owns a different number of columns.
    #[error(
        "Attribute '{entity}.{attribute}' owns {prev} column(s) in the previous schema \
         and {new} in the new one; changing the column count of an attribute is not supported"
    )]
    ColumnCountMismatch {
        /// Entity name (new side).
        entity: String,
        /// Attribute name (new side).
        attribute: String,
        /// Column count before.
        prev: usize,
        /// Column count after.
        new: usize,
    },

    /// A rename hint would overwrite an existing correlation link.
    #[error("Ambiguous rename to '{target}': {reason}")]
    AmbiguousRename {
        /// The rename target.
        target: String,
        /// Why the target is ambiguous.
        reason: String,
    },

    /// A rename hint names an entity that does not exist.
    #[error("Unknown entity '{name}' in the {side} model")]
    UnknownEntity {
        /// Entity name.
        name: String,
        /// `"previous"` or `"new"`.
        side: &'static str,
    },

    /// A rename hint names an attribute that does not exist.
    #[error("Unknown attribute '{entity}.{attribute}' in the {side} model")]
    UnknownAttribute {
        /// Entity name.
        entity: String,
        /// Attribute name.
        attribute: String,
        /// `"previous"` or `"new"`.
        side: &'static str,
    },

    /// An attribute rename was requested on an entity with no counterpart.
    #[error("Cannot rename attribute '{entity}.{attribute}': entity '{entity}' has no counterpart in the previous model")]
    UncorrelatedEntity {
        /// Entity name (new side).
        entity: String,
        /// Attribute being renamed (previous name).
        attribute: String,
    },

    /// An internal invariant was violated while synthesizing operations.
    #[error("Internal inconsistency: {0}")]
    Inconsistency(String),

    /// IO error (reading/writing model or script files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for diff operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
