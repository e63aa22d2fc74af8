//! Error and diagnostic types for the semantic layer.
//!
//! Every resolution and compilation failure is a [`SemanticError`] value.
//! Compile sessions turn them into [`Diagnostic`]s so that one pass can
//! report every problem in a view instead of stopping at the first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for semantic operations.
pub type SemanticResult<T> = Result<T, SemanticError>;

/// Unified error type for registry, resolution, compilation and validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SemanticError {
    /// Referenced an entity that doesn't exist.
    #[error("Unknown entity: '{0}'")]
    UnknownEntity(String),

    /// No declared relationship connects `from` to `to`.
    #[error("Entity '{to}' is not reachable from '{from}' (hop {hop} of '{path}')")]
    UnreachableEntity {
        from: String,
        to: String,
        /// Zero-based index of the failing path segment.
        hop: usize,
        path: String,
    },

    /// Referenced a field that doesn't exist on an entity.
    #[error("Unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// Registered the same entity name twice.
    #[error("Duplicate entity name: '{0}'")]
    DuplicateEntity(String),

    /// Declared the same field name twice on one entity.
    #[error("Duplicate field '{field}' on entity '{entity}'")]
    DuplicateField { entity: String, field: String },

    /// Circular measure references, or an include cycle. The path repeats its
    /// first element at the end.
    #[error("Cyclic reference detected: {}", .0.join(" -> "))]
    CyclicReference(Vec<String>),

    /// Operand or aggregation type conflict.
    #[error("Type mismatch at '{path}': {message}")]
    TypeMismatch { path: String, message: String },

    /// Several relationships from one entity to the same target with
    /// different join conditions. The first declared one is used.
    #[error(
        "Ambiguous join from '{from}' to '{to}': {count} relationships declared, using the first"
    )]
    AmbiguousJoin {
        from: String,
        to: String,
        count: usize,
    },

    /// Malformed path or unsupported expression text.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// An entity could not be serialized for the snapshot fingerprint.
    #[error("Failed to fingerprint entity '{entity}': {message}")]
    Fingerprint { entity: String, message: String },
}

impl SemanticError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            SemanticError::UnknownEntity(_) => DiagnosticKind::UnknownEntity,
            SemanticError::UnreachableEntity { .. } => DiagnosticKind::UnreachableEntity,
            SemanticError::UnknownField { .. } => DiagnosticKind::UnknownField,
            SemanticError::DuplicateEntity(_) => DiagnosticKind::DuplicateEntity,
            SemanticError::DuplicateField { .. } => DiagnosticKind::DuplicateField,
            SemanticError::CyclicReference(_) => DiagnosticKind::CyclicReference,
            SemanticError::TypeMismatch { .. } => DiagnosticKind::TypeMismatch,
            SemanticError::AmbiguousJoin { .. } => DiagnosticKind::AmbiguousJoin,
            SemanticError::InvalidExpression(_) => DiagnosticKind::InvalidExpression,
            SemanticError::Fingerprint { .. } => DiagnosticKind::Fingerprint,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().severity() == Severity::Fatal
    }

    /// The offending path, when the error carries one.
    pub fn path(&self) -> Option<String> {
        match self {
            SemanticError::UnreachableEntity { path, .. } => Some(path.clone()),
            SemanticError::UnknownField { entity, field } => Some(format!("{}.{}", entity, field)),
            SemanticError::TypeMismatch { path, .. } => Some(path.clone()),
            SemanticError::CyclicReference(cycle) => cycle.first().cloned(),
            SemanticError::AmbiguousJoin { from, to, .. } => Some(format!("{}.{}", from, to)),
            SemanticError::Fingerprint { entity, .. } => Some(entity.clone()),
            _ => None,
        }
    }
}

/// Diagnostic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownEntity,
    UnreachableEntity,
    UnknownField,
    DuplicateEntity,
    DuplicateField,
    CyclicReference,
    TypeMismatch,
    AmbiguousJoin,
    InvalidExpression,
    Fingerprint,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::AmbiguousJoin => Severity::Advisory,
            _ => Severity::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Forces the plan into `Rejected`.
    Fatal,
    /// Reported, never rejects on its own under the default policy.
    Advisory,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::Advisory => write!(f, "advisory"),
        }
    }
}

/// A structured diagnostic handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// Offending member path or entity, if known.
    pub path: Option<String>,
}

impl Diagnostic {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Attach a path if the diagnostic doesn't carry one yet.
    pub fn or_path(mut self, path: impl Into<String>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }
}

impl From<SemanticError> for Diagnostic {
    fn from(err: SemanticError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            severity: kind.severity(),
            path: err.path(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} [{}]: {}", self.severity, path, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Does any diagnostic force rejection?
pub fn has_fatal(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_fatal)
}
