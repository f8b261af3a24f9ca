//! Compiler errors and batched diagnostics.
//!
//! Errors fall into two groups:
//!
//! - **Instance-level** (`Invalid`, `UnknownComponent`, `Multiplicity`) are
//!   collected per configured instance and never stop sibling instances.
//! - **Run-fatal** (`DuplicateIdentifier`, `UnresolvedReference`,
//!   `CyclicDependency`, `TypeMismatch`) abort emission; partial output would
//!   silently omit declarations.
//!
//! Field-level variants (`MissingRequiredField`, `InvalidFieldType`,
//! `UnknownField`) are produced by the schema validator and wrapped into
//! `Invalid` together with the label of the instance they belong to.

use std::fmt;

use thiserror::Error;

use crate::types::{IdName, InstanceLabel, SemanticType};

/// Compiler result type
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("required key '{path}' not provided")]
    MissingRequiredField { path: String },

    #[error("invalid value for '{path}': {message}")]
    InvalidFieldType { path: String, message: String },

    #[error("extra keys not allowed: '{path}'")]
    UnknownField { path: String },

    #[error("schema conflict: key '{key}' is declared twice with different constraints")]
    SchemaConflict { key: String },

    #[error("invalid schema key '{key}': {message}")]
    InvalidSchema { key: String, message: String },

    #[error("identifier '{0}' is declared more than once")]
    DuplicateIdentifier(IdName),

    #[error("couldn't find identifier(s) {}", join(.names))]
    UnresolvedReference { names: Vec<IdName> },

    #[error("cyclic dependency between {}", join(.cycle))]
    CyclicDependency { cycle: Vec<IdName> },

    #[error("identifier '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: IdName,
        expected: SemanticType,
        actual: SemanticType,
    },

    #[error("component '{0}' not found")]
    UnknownComponent(String),

    #[error("component '{kind}' does not accept a list of configurations")]
    Multiplicity { kind: String },

    #[error("code generation for {instance} failed: {message}")]
    Generation { instance: String, message: String },

    #[error("invalid configuration for {instance}: {}", join(.errors))]
    Invalid {
        instance: InstanceLabel,
        errors: Vec<Error>,
    },
}

/// Category of an [`Error`].
///
/// # Invariant
///
/// The discriminant values must match the `ERROR_KIND_NAMES` array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    // Validation
    MissingRequiredField = 0,
    InvalidFieldType = 1,
    UnknownField = 2,

    // Schema construction
    SchemaConflict = 3,
    InvalidSchema = 4,

    // Registration and sequencing
    DuplicateIdentifier = 5,
    UnresolvedReference = 6,
    CyclicDependency = 7,
    TypeMismatch = 8,

    // Document shape
    UnknownComponent = 9,
    Multiplicity = 10,

    // Generation rules
    Generation = 11,

    /// Validation failure isolated to one instance
    Invalid = 12,
}

const ERROR_KIND_NAMES: &[&str] = &[
    "missing required field", // 0: MissingRequiredField
    "invalid field type",     // 1: InvalidFieldType
    "unknown field",          // 2: UnknownField
    "schema conflict",        // 3: SchemaConflict
    "invalid schema",         // 4: InvalidSchema
    "duplicate identifier",   // 5: DuplicateIdentifier
    "unresolved reference",   // 6: UnresolvedReference
    "cyclic dependency",      // 7: CyclicDependency
    "type mismatch",          // 8: TypeMismatch
    "unknown component",      // 9: UnknownComponent
    "multiplicity",           // 10: Multiplicity
    "generation failed",      // 11: Generation
    "invalid instance",       // 12: Invalid
];

impl ErrorKind {
    /// Human-readable name of this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingRequiredField { .. } => ErrorKind::MissingRequiredField,
            Error::InvalidFieldType { .. } => ErrorKind::InvalidFieldType,
            Error::UnknownField { .. } => ErrorKind::UnknownField,
            Error::SchemaConflict { .. } => ErrorKind::SchemaConflict,
            Error::InvalidSchema { .. } => ErrorKind::InvalidSchema,
            Error::DuplicateIdentifier(_) => ErrorKind::DuplicateIdentifier,
            Error::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Error::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::UnknownComponent(_) => ErrorKind::UnknownComponent,
            Error::Multiplicity { .. } => ErrorKind::Multiplicity,
            Error::Generation { .. } => ErrorKind::Generation,
            Error::Invalid { .. } => ErrorKind::Invalid,
        }
    }

    /// Whether this error only disqualifies the instance it belongs to.
    pub fn is_instance_level(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Invalid | ErrorKind::UnknownComponent | ErrorKind::Multiplicity
        )
    }

    /// Shorthand for an invalid-value error at `path`.
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFieldType {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Batched report of every error collected during a failed run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnostics {
    pub errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors of one kind, in the order they were collected.
    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &Error> {
        self.errors.iter().filter(move |e| e.kind() == kind)
    }

    /// Labels of every instance reported as invalid.
    pub fn invalid_instances(&self) -> Vec<&InstanceLabel> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                Error::Invalid { instance, .. } => Some(instance),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "error: {}: {}", error.kind(), error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<Error> for Diagnostics {
    fn from(error: Error) -> Self {
        Self::new(vec![error])
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
