//! Reflection errors

use thiserror::Error;

/// Errors surfaced by reflective lookups
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReflectError {
    /// No method matches the requested name and signature
    #[error("No such method: {type_name}.{name}{signature}")]
    NoSuchMethod {
        /// Queried type
        type_name: String,
        /// Requested method name
        name: String,
        /// Requested parameter list, rendered
        signature: String,
    },

    /// No field with the requested name is visible
    #[error("No such field: {type_name}.{name}")]
    NoSuchField {
        /// Queried type
        type_name: String,
        /// Requested field name
        name: String,
    },

    /// No constructor matches the requested parameter list
    #[error("No such constructor: {type_name}{signature}")]
    NoSuchConstructor {
        /// Queried type
        type_name: String,
        /// Requested parameter list, rendered
        signature: String,
    },

    /// Several unrelated declarations match and none is more specific
    #[error("Ambiguous member: {type_name}.{name}{signature} has {candidates} candidates")]
    AmbiguousMember {
        /// Queried type
        type_name: String,
        /// Requested method name
        name: String,
        /// Requested parameter list, rendered
        signature: String,
        /// Number of competing declarations
        candidates: usize,
    },

    /// Handle does not name a type known to the type graph
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// The member introspector kept racing with type redefinition
    #[error("Inconsistent member snapshot for {type_name} after {attempts} attempts")]
    InconsistentSnapshot {
        /// Type being introspected
        type_name: String,
        /// Attempts made before giving up
        attempts: usize,
    },
}

impl ReflectError {
    /// Internal conditions indicate a runtime inconsistency rather than a
    /// lookup that simply came up empty.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReflectError::UnknownType(_) | ReflectError::InconsistentSnapshot { .. }
        )
    }
}

/// Reflection result
pub type ReflectResult<T> = Result<T, ReflectError>;
