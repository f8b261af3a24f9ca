//! Core identifier and type model
//!
//! Identifiers are the names generated declarations are bound to. Each one
//! carries the semantic type it was declared with; references from other
//! configuration units are checked against that type before an expression is
//! allowed to chain on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a declared identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdName(pub String);

impl IdName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for IdName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A class in the generated program's type lattice.
///
/// Types are nominal: two types are the same when their names and parents
/// match. A type satisfies a requirement when it is the required type or
/// derives from it through any chain of parents.
///
/// # Examples
///
/// ```
/// # use stanza_core::types::SemanticType;
/// let psu = SemanticType::new("PowerSupplyComponent").extends(SemanticType::component());
/// assert!(psu.is_a(&SemanticType::component()));
/// assert!(!SemanticType::component().is_a(&psu));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticType {
    name: String,
    parents: Vec<SemanticType>,
}

impl SemanticType {
    /// Create a root type with no parents.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
        }
    }

    /// Add a parent type.
    pub fn extends(mut self, parent: SemanticType) -> Self {
        self.parents.push(parent);
        self
    }

    /// Type name as rendered in generated code.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[SemanticType] {
        &self.parents
    }

    /// Check whether this type is `other` or derives from it.
    pub fn is_a(&self, other: &SemanticType) -> bool {
        self == other || self.parents.iter().any(|p| p.is_a(other))
    }

    /// Base class of everything attached to the application lifecycle.
    pub fn component() -> Self {
        Self::new("Component")
    }

    /// Component that is additionally updated on a fixed interval.
    pub fn polling_component() -> Self {
        Self::new("PollingComponent").extends(Self::component())
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A declared name together with its semantic type.
///
/// Created exactly once per compilation run, when the declaring statement is
/// committed to the [`SymbolRegistry`](crate::registry::SymbolRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: IdName,
    pub ty: SemanticType,
}

impl Identifier {
    pub fn new(name: impl Into<IdName>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// Compile-time capability flag handed to the build manifest (e.g. `-DUSE_OUTPUT`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildFlag(pub String);

impl fmt::Display for BuildFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BuildFlag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Position of one configured instance inside the document.
///
/// Single-instance sections have no index; multi-instance sections are
/// numbered in document order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceLabel {
    pub kind: String,
    pub index: Option<usize>,
}

impl InstanceLabel {
    pub fn single(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            index: None,
        }
    }

    pub fn indexed(kind: impl Into<String>, index: usize) -> Self {
        Self {
            kind: kind.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for InstanceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(idx) => write!(f, "{}[{}]", self.kind, idx),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Lifecycle of one component instance through the pipeline.
///
/// ```text
/// Unvalidated -> Validated -> Building -> Declared -> Configured -> Done
///            \-> Invalid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Unvalidated,
    Validated,
    /// Generation started; counts how many times it has suspended so far
    Building { suspensions: u32 },
    /// Primary identifier declared
    Declared,
    /// Optional settings applied to the primary identifier
    Configured,
    /// Attached to the application lifecycle
    Done,
    /// Validation failed; the instance produced no output
    Invalid,
}

impl InstanceState {
    /// Record one more suspension while building.
    pub fn suspend(&mut self) {
        match self {
            InstanceState::Building { suspensions } => *suspensions += 1,
            InstanceState::Validated => *self = InstanceState::Building { suspensions: 1 },
            _ => {}
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::Done | InstanceState::Invalid)
    }
}
