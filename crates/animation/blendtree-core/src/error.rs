//! Error types for authoring, binding, runtime evaluation and persistence.

use crate::ids::Uid;

/// Error type shared by every fallible operation in the crate.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnimError {
    /// A named group/node/link/parameter/timeline/animation/tree is absent.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A value's runtime type disagrees with the declared type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A handle no longer resolves in its owning container.
    #[error("Invalid {kind} reference: {id}")]
    InvalidReference { kind: &'static str, id: Uid },

    /// The comparison is not defined for the parameter type.
    #[error("Comparison {comparison} is not supported for {param_type} parameters")]
    UnsupportedComparison {
        param_type: String,
        comparison: String,
    },

    /// The operation would break a structural invariant.
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Persisted file missing or unreadable.
    #[error("IO error on {path}: {reason}")]
    Io { path: String, reason: String },

    /// Persisted document malformed.
    #[error("Parse error: {reason}")]
    Parse { reason: String },
}

impl AnimError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Runtime failures after which an entity keeps its last pose and the
    /// frame continues.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidReference { .. } | Self::TypeMismatch { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "lookup",
            Self::TypeMismatch { .. }
            | Self::UnsupportedComparison { .. }
            | Self::InvalidOperation { .. } => "validation",
            Self::InvalidReference { .. } => "reference",
            Self::Io { .. } | Self::Parse { .. } => "io",
        }
    }
}

impl From<serde_json::Error> for AnimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}
