//! Core error types.

use setql_model::{ObjectId, QualifiedName};
use thiserror::Error;

/// Errors raised while checking or evaluating a statement.
///
/// Nothing is retried: any error aborts the statement and discards its
/// uncommitted writes.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The query is ill-formed for the data it ran against: bad arity,
    /// unresolved variable, negative limit, failed assertion and similar.
    #[error("usage error: {0}")]
    Usage(String),

    /// No overload matched, or several matched under the rejecting policy.
    #[error(
        "no unique overload of {function} for argument types ({}); candidates: {}",
        .arg_types.join(", "),
        .candidates.join("; ")
    )]
    OverloadResolution {
        /// Qualified function name.
        function: String,
        /// Synthesized argument types.
        arg_types: Vec<String>,
        /// Every candidate signature, in declaration order.
        candidates: Vec<String>,
    },

    /// A state the checker should have ruled out.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Failure reported by the database collaborator.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl EvalError {
    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        EvalError::Usage(message.into())
    }

    /// Create an internal invariant error.
    pub fn internal(message: impl Into<String>) -> Self {
        EvalError::InternalInvariant(message.into())
    }

    /// Whether this is a usage error.
    pub fn is_usage(&self) -> bool {
        matches!(self, EvalError::Usage(_))
    }
}

/// Errors raised by a [`Database`](crate::storage::Database) implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatabaseError {
    /// The identity is not stored (never inserted, or deleted).
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    /// The object has no such field.
    #[error("object {id} has no field '{field}'")]
    UnknownField {
        /// Object identity.
        id: ObjectId,
        /// Requested field.
        field: String,
    },

    /// The name does not denote an object type.
    #[error("unknown object type {0}")]
    UnknownType(QualifiedName),
}

/// Errors raised while loading configuration or schema documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed JSON input.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed input with an invalid value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
