//! Error types for the reconciler crate.

use thiserror::Error;
use xsoar_client::ApiError;
use xsoar_core::{Diagnostic, ObjectKind};

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What was wrong with a remote response field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeProblem {
    /// The response (or a list element) was not a JSON object.
    NotAnObject,
    /// A required field was absent or null.
    Missing,
    /// The field had the wrong JSON type.
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    /// The field had the right type but a value outside the known set.
    UnexpectedValue { expected: &'static str, found: String },
}

/// A remote response that does not match the expected contract.
///
/// Never retried: it indicates a contract violation, not a transient
/// condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} response field '{field}': {}", describe(.problem))]
pub struct ShapeError {
    pub kind: ObjectKind,
    pub field: String,
    pub problem: ShapeProblem,
}

fn describe(problem: &ShapeProblem) -> String {
    match problem {
        ShapeProblem::NotAnObject => "expected a JSON object".to_string(),
        ShapeProblem::Missing => "required field is missing".to_string(),
        ShapeProblem::WrongType { expected, found } => format!("expected {expected}, found {found}"),
        ShapeProblem::UnexpectedValue { expected, found } => {
            format!("expected {expected}, found '{found}'")
        }
    }
}

impl ShapeError {
    pub fn not_an_object(kind: ObjectKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            problem: ShapeProblem::NotAnObject,
        }
    }

    pub fn missing(kind: ObjectKind, field: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            problem: ShapeProblem::Missing,
        }
    }

    pub fn wrong_type(
        kind: ObjectKind,
        field: impl Into<String>,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            problem: ShapeProblem::WrongType { expected, found },
        }
    }

    pub fn unexpected_value(
        kind: ObjectKind,
        field: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            problem: ShapeProblem::UnexpectedValue {
                expected,
                found: found.into(),
            },
        }
    }
}

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provider has no usable client.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A remote response did not match the expected shape.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// The remote object does not exist.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: ObjectKind, key: String },

    /// A single remote call failed and was not retried.
    #[error("{operation} failed: {source}")]
    Remote {
        operation: String,
        #[source]
        source: ApiError,
    },

    /// A retried call kept failing until the retry budget ran out.
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: ApiError,
    },

    /// An immutable field changed; the object must be destroyed and recreated.
    #[error("{kind} requires replacement, immutable field(s) changed: {}", .fields.join(", "))]
    ReplacementRequired {
        kind: ObjectKind,
        fields: Vec<&'static str>,
    },

    /// A referenced object could not be resolved by name.
    #[error("{kind} '{name}' does not exist")]
    UnresolvedReference { kind: ObjectKind, name: String },
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: ObjectKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create a remote call error.
    pub fn remote(operation: impl Into<String>, source: ApiError) -> Self {
        Self::Remote {
            operation: operation.into(),
            source,
        }
    }

    /// Create a retries exhausted error.
    pub fn retries_exhausted(operation: impl Into<String>, attempts: u32, last: ApiError) -> Self {
        Self::RetriesExhausted {
            operation: operation.into(),
            attempts,
            last,
        }
    }

    /// Create a replacement required error.
    pub const fn replacement_required(kind: ObjectKind, fields: Vec<&'static str>) -> Self {
        Self::ReplacementRequired { kind, fields }
    }

    /// Create an unresolved reference error.
    pub fn unresolved_reference(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            kind,
            name: name.into(),
        }
    }

    /// Map a failed lookup: 404 becomes `NotFound`, anything else `Remote`.
    pub fn lookup(kind: ObjectKind, key: &str, operation: impl Into<String>, source: ApiError) -> Self {
        if source.is_not_found() {
            Self::not_found(kind, key)
        } else {
            Self::remote(operation, source)
        }
    }

    /// Whether the host should drop the object from tracked state.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Convert to an error diagnostic for the host.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            Self::Configuration { .. } => "Provider not configured".to_string(),
            Self::Shape(err) => format!("Unexpected {} response", err.kind),
            Self::NotFound { kind, .. } => format!("Error getting {kind}"),
            Self::Remote { operation, .. } => format!("Error during {operation}"),
            Self::RetriesExhausted { operation, .. } => format!("Timed out during {operation}"),
            Self::ReplacementRequired { kind, .. } => format!("Cannot update {kind} in place"),
            Self::UnresolvedReference { kind, .. } => format!("Unknown {kind}"),
        };
        Diagnostic::error(summary, self.to_string())
    }
}
