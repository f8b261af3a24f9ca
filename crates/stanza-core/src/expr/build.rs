//! Suspendable construction
//!
//! A generation rule does not emit statements directly. It returns a
//! [`Build`]: either a finished value or a record of the identifiers it is
//! waiting for plus the continuation that finishes the work once they exist.
//! Continuations run against a [`Scope`], which gives read access to the
//! registry and write access to the fragment under construction.
//!
//! ```text
//! rule(config) ─► Build::Suspended { needs: [hub], resume }
//!                         │  hub declared
//!                         ▼
//!                 resume(scope) ─► Build::Ready(var)
//! ```

use std::fmt;

use tracing::trace;

use crate::error::{Error, Result};
use crate::registry::SymbolRegistry;
use crate::types::{IdName, Identifier, InstanceState};
use crate::value::IdRef;

use super::ast::{Expression, Statement, VarRef};

/// Continuation of a suspended build
pub type Resume<T> = Box<dyn FnOnce(&mut Scope<'_>) -> Result<Build<T>>>;

fn resume<T, F>(f: F) -> Resume<T>
where
    F: FnOnce(&mut Scope<'_>) -> Result<Build<T>> + 'static,
{
    Box::new(f)
}

/// A value that may still be waiting on identifiers
pub enum Build<T> {
    Ready(T),
    Suspended {
        /// Identifiers that must be declared before `resume` may run
        needs: Vec<IdRef>,
        resume: Resume<T>,
    },
}

impl<T: 'static> Build<T> {
    pub fn ready(value: T) -> Self {
        Build::Ready(value)
    }

    /// Defer `f` until a scope is available; it waits on nothing.
    pub fn run<F>(f: F) -> Self
    where
        F: FnOnce(&mut Scope<'_>) -> Result<Build<T>> + 'static,
    {
        Build::Suspended {
            needs: Vec::new(),
            resume: resume(f),
        }
    }

    /// Chain `f` on the finished value.
    pub fn then<U, F>(self, f: F) -> Build<U>
    where
        U: 'static,
        F: FnOnce(T, &mut Scope<'_>) -> Result<Build<U>> + 'static,
    {
        match self {
            Build::Ready(value) => Build::run(move |scope| f(value, scope)),
            Build::Suspended { needs, resume: inner } => Build::Suspended {
                needs,
                resume: resume(move |scope| Ok(inner(scope)?.then(f))),
            },
        }
    }

    /// Transform the finished value without touching the scope.
    pub fn map<U, F>(self, f: F) -> Build<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        match self {
            Build::Ready(value) => Build::Ready(f(value)),
            Build::Suspended { needs, resume: inner } => Build::Suspended {
                needs,
                resume: resume(move |scope| Ok(inner(scope)?.map(f))),
            },
        }
    }

    /// Combine two builds; the result waits for both.
    pub fn zip<U: 'static>(self, other: Build<U>) -> Build<(T, U)> {
        match (self, other) {
            (Build::Ready(a), Build::Ready(b)) => Build::Ready((a, b)),
            (Build::Ready(a), second) => second.map(move |b| (a, b)),
            (first, second) => first.then(move |a, _| Ok(second.map(move |b| (a, b)))),
        }
    }

    /// Combine any number of builds, keeping their order.
    pub fn all<I>(builds: I) -> Build<Vec<T>>
    where
        I: IntoIterator<Item = Build<T>>,
    {
        builds
            .into_iter()
            .fold(Build::Ready(Vec::new()), |acc, next| {
                acc.zip(next).map(|(mut items, item)| {
                    items.push(item);
                    items
                })
            })
    }

    /// Identifiers the next step is waiting for; empty when ready.
    pub fn needs(&self) -> &[IdRef] {
        match self {
            Build::Ready(_) => &[],
            Build::Suspended { needs, .. } => needs,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Build::Ready(_))
    }
}

impl Build<VarRef> {
    /// Wait for `id` to be declared, then yield a handle to it.
    ///
    /// The declared type must satisfy the type `id` was validated with.
    pub fn get_variable(id: IdRef) -> Self {
        Build::Suspended {
            needs: vec![id.clone()],
            resume: resume(move |scope| scope.variable(&id).map(Build::Ready)),
        }
    }
}

impl<T> fmt::Debug for Build<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Build::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Build::Suspended { needs, .. } => f
                .debug_struct("Suspended")
                .field("needs", &needs.iter().map(|n| n.name.as_str()).collect::<Vec<_>>())
                .finish_non_exhaustive(),
        }
    }
}

/// Statements and declarations accumulated by one task
#[derive(Debug, Default)]
pub struct FragmentBuilder {
    statements: Vec<Statement>,
    declares: Vec<Identifier>,
}

impl FragmentBuilder {
    pub fn declares(&self, name: &IdName) -> bool {
        self.declares.iter().any(|d| &d.name == name)
    }

    pub fn has_declarations(&self) -> bool {
        !self.declares.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.declares.is_empty()
    }

    /// Take everything accumulated so far, leaving the builder empty.
    pub fn take(&mut self) -> (Vec<Statement>, Vec<Identifier>) {
        (
            std::mem::take(&mut self.statements),
            std::mem::take(&mut self.declares),
        )
    }
}

/// What a continuation may see and do while it runs
pub struct Scope<'a> {
    registry: &'a SymbolRegistry,
    fragment: &'a mut FragmentBuilder,
    state: &'a mut InstanceState,
}

impl<'a> Scope<'a> {
    pub fn new(registry: &'a SymbolRegistry, fragment: &'a mut FragmentBuilder, state: &'a mut InstanceState) -> Self {
        Self {
            registry,
            fragment,
            state,
        }
    }

    pub fn registry(&self) -> &SymbolRegistry {
        self.registry
    }

    /// Whether `name` is declared, either globally or earlier in this fragment.
    pub fn is_declared(&self, name: &IdName) -> bool {
        self.registry.contains(name) || self.fragment.declares(name)
    }

    /// Emit `Type *name = value;` and declare `id` with its validated type.
    pub fn declare(&mut self, id: &IdRef, value: Expression) -> Result<VarRef> {
        if self.is_declared(&id.name) {
            return Err(Error::DuplicateIdentifier(id.name.clone()));
        }
        let identifier = Identifier::new(id.name.clone(), id.ty.clone());
        let var = VarRef::from(&identifier);
        self.fragment.statements.push(Statement::Declare {
            id: identifier.clone(),
            value,
        });
        self.fragment.declares.push(identifier);
        if !matches!(self.state, InstanceState::Declared | InstanceState::Configured | InstanceState::Done) {
            *self.state = InstanceState::Declared;
        }
        trace!(name = %var.name, "declared in fragment");
        Ok(var)
    }

    /// Handle to an already declared identifier, checked against `id`'s type.
    pub fn variable(&self, id: &IdRef) -> Result<VarRef> {
        if let Some(local) = self.fragment.declares.iter().find(|d| d.name == id.name) {
            return check_type(local, id);
        }
        match self.registry.resolve_as(&id.name, &id.ty)? {
            Some(found) => Ok(VarRef::from(found)),
            None => Err(Error::UnresolvedReference {
                names: vec![id.name.clone()],
            }),
        }
    }

    /// Emit `expr;`.
    pub fn add(&mut self, expr: Expression) {
        self.fragment.statements.push(Statement::Expr(expr));
    }

    pub fn state(&self) -> InstanceState {
        *self.state
    }

    /// Move the instance to `state`.
    pub fn mark(&mut self, state: InstanceState) {
        *self.state = state;
    }
}

fn check_type(found: &Identifier, id: &IdRef) -> Result<VarRef> {
    if found.ty.is_a(&id.ty) {
        Ok(VarRef::from(found))
    } else {
        Err(Error::TypeMismatch {
            name: id.name.clone(),
            expected: id.ty.clone(),
            actual: found.ty.clone(),
        })
    }
}
