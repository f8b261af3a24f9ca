//! Symbol registry
//!
//! One registry exists per compilation run. It is the single owner of the
//! declared [`Identifier`] set: the sequencer is its only writer, everything
//! else reads through [`SymbolRegistry::resolve`].

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{IdName, Identifier, SemanticType};

/// Declared identifiers in declaration order
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    symbols: IndexMap<IdName, Identifier>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new identifier.
    ///
    /// Fails with [`Error::DuplicateIdentifier`] if the name is taken; the
    /// registry is left unchanged in that case.
    pub fn declare(&mut self, id: Identifier) -> Result<()> {
        if self.symbols.contains_key(&id.name) {
            return Err(Error::DuplicateIdentifier(id.name));
        }
        trace!(name = %id.name, ty = %id.ty, "declared identifier");
        self.symbols.insert(id.name.clone(), id);
        Ok(())
    }

    pub fn resolve(&self, name: &IdName) -> Option<&Identifier> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &IdName) -> bool {
        self.symbols.contains_key(name)
    }

    /// Resolve `name` and check that it satisfies `expected`.
    ///
    /// Returns `Ok(None)` while the name is not declared yet.
    pub fn resolve_as(&self, name: &IdName, expected: &SemanticType) -> Result<Option<&Identifier>> {
        match self.symbols.get(name) {
            Some(id) if !id.ty.is_a(expected) => Err(Error::TypeMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: id.ty.clone(),
            }),
            found => Ok(found),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Identifiers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.symbols.values()
    }

    /// Name to declared type, in declaration order.
    pub fn types(&self) -> IndexMap<IdName, SemanticType> {
        self.symbols
            .iter()
            .map(|(name, id)| (name.clone(), id.ty.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psu() -> SemanticType {
        SemanticType::new("PowerSupplyComponent").extends(SemanticType::component())
    }

    #[test]
    fn test_declare_and_resolve() {
        let mut registry = SymbolRegistry::new();
        registry.declare(Identifier::new("psu1", psu())).unwrap();

        let found = registry.resolve(&"psu1".into()).unwrap();
        assert_eq!(found.ty, psu());
        assert!(registry.resolve(&"psu2".into()).is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = SymbolRegistry::new();
        registry.declare(Identifier::new("psu1", psu())).unwrap();

        let err = registry
            .declare(Identifier::new("psu1", SemanticType::component()))
            .unwrap_err();
        assert_eq!(err, Error::DuplicateIdentifier("psu1".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(&"psu1".into()).unwrap().ty, psu());
    }

    #[test]
    fn test_resolve_as_checks_subtype() {
        let mut registry = SymbolRegistry::new();
        registry.declare(Identifier::new("psu1", psu())).unwrap();

        assert!(registry.resolve_as(&"psu1".into(), &SemanticType::component()).unwrap().is_some());
        assert!(registry.resolve_as(&"later".into(), &psu()).unwrap().is_none());
        assert!(matches!(
            registry.resolve_as(&"psu1".into(), &SemanticType::polling_component()),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_types_in_declaration_order() {
        let mut registry = SymbolRegistry::new();
        registry.declare(Identifier::new("b", psu())).unwrap();
        registry.declare(Identifier::new("a", SemanticType::component())).unwrap();

        let names: Vec<_> = registry.types().into_keys().map(|n| n.0).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
