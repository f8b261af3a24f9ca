//! Expression tasks
//!
//! An [`ExpressionTask`] is the explicit record of one instance's suspended
//! generation: the fragment built so far, the identifiers it still waits
//! for, and the continuation that finishes it.
//!
//! A task that has already declared identifiers and then blocks is split:
//! the declaring part is released as a completed fragment so other tasks can
//! reference it, and the remainder continues as a follow-up task.

use indexmap::IndexSet;
use tracing::trace;

use crate::error::{Error, Result};
use crate::registry::SymbolRegistry;
use crate::types::{IdName, InstanceLabel, InstanceState};

use super::ast::StatementFragment;
use super::build::{Build, FragmentBuilder, Scope};

/// Result of driving a task
#[derive(Debug)]
pub enum Advance {
    /// Still waiting on `task.outstanding()`
    Pending(ExpressionTask),
    Complete {
        fragment: StatementFragment,
        /// Remainder of a task that blocked after declaring identifiers
        follow_up: Option<ExpressionTask>,
        state: InstanceState,
    },
}

#[derive(Debug)]
pub struct ExpressionTask {
    label: InstanceLabel,
    state: InstanceState,
    /// Identifiers this task is expected to declare
    promises: Vec<IdName>,
    outstanding: IndexSet<IdName>,
    fragment: FragmentBuilder,
    build: Build<()>,
}

impl ExpressionTask {
    /// Start a task and record which of its needs are not yet declared.
    pub fn begin(label: InstanceLabel, promises: Vec<IdName>, build: Build<()>, registry: &SymbolRegistry) -> Self {
        let mut task = Self {
            label,
            state: InstanceState::Building { suspensions: 0 },
            promises,
            outstanding: IndexSet::new(),
            fragment: FragmentBuilder::default(),
            build,
        };
        task.outstanding = task.unresolved(registry);
        task
    }

    pub fn label(&self) -> &InstanceLabel {
        &self.label
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Ready iff every dependency of the next step is declared.
    pub fn is_ready(&self) -> bool {
        self.outstanding.is_empty()
    }

    pub fn outstanding(&self) -> impl Iterator<Item = &IdName> {
        self.outstanding.iter()
    }

    pub fn is_waiting_on(&self, name: &IdName) -> bool {
        self.outstanding.contains(name)
    }

    /// Identifiers this task will declare that `registry` does not hold yet.
    pub fn pending_promises<'a>(&'a self, registry: &'a SymbolRegistry) -> impl Iterator<Item = &'a IdName> {
        self.promises.iter().filter(|name| !registry.contains(name))
    }

    /// Record that `resolved` is now declared; run the task once nothing is
    /// outstanding.
    pub fn advance(mut self, resolved: &IdName, registry: &SymbolRegistry) -> Result<Advance> {
        self.outstanding.shift_remove(resolved);
        if self.is_ready() {
            self.run(registry)
        } else {
            Ok(Advance::Pending(self))
        }
    }

    /// Drive continuations until the task completes or blocks.
    pub fn run(mut self, registry: &SymbolRegistry) -> Result<Advance> {
        loop {
            self.outstanding = self.unresolved(registry);
            if !self.outstanding.is_empty() {
                return Ok(self.block());
            }

            match std::mem::replace(&mut self.build, Build::Ready(())) {
                Build::Ready(()) => return Ok(self.complete()),
                Build::Suspended { resume, .. } => {
                    let mut scope = Scope::new(registry, &mut self.fragment, &mut self.state);
                    self.build = resume(&mut scope).map_err(|e| generation_error(&self.label, e))?;
                }
            }
        }
    }

    fn unresolved(&self, registry: &SymbolRegistry) -> IndexSet<IdName> {
        self.build
            .needs()
            .iter()
            .filter(|id| !registry.contains(&id.name) && !self.fragment.declares(&id.name))
            .map(|id| id.name.clone())
            .collect()
    }

    fn block(mut self) -> Advance {
        self.state.suspend();
        trace!(
            instance = %self.label,
            waiting = ?self.outstanding.iter().map(IdName::as_str).collect::<Vec<_>>(),
            "task suspended"
        );
        if !self.fragment.has_declarations() {
            return Advance::Pending(self);
        }
        let fragment = self.take_fragment();
        Advance::Complete {
            fragment,
            state: self.state,
            follow_up: Some(self),
        }
    }

    fn complete(mut self) -> Advance {
        if !matches!(self.state, InstanceState::Configured | InstanceState::Done) {
            self.state = InstanceState::Done;
        }
        Advance::Complete {
            fragment: self.take_fragment(),
            follow_up: None,
            state: self.state,
        }
    }

    fn take_fragment(&mut self) -> StatementFragment {
        let (statements, declares) = self.fragment.take();
        StatementFragment {
            instance: self.label.clone(),
            statements,
            declares,
        }
    }
}

/// Attribute rule failures to the instance; structural errors pass through.
fn generation_error(label: &InstanceLabel, error: Error) -> Error {
    match error {
        Error::DuplicateIdentifier(_)
        | Error::UnresolvedReference { .. }
        | Error::CyclicDependency { .. }
        | Error::TypeMismatch { .. }
        | Error::Generation { .. } => error,
        other => Error::Generation {
            instance: label.to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::Expression;
    use crate::types::{Identifier, SemanticType};
    use crate::value::{IdRef, IdRole};

    fn hub_ty() -> SemanticType {
        SemanticType::new("PCF8574Component").extends(SemanticType::component())
    }

    fn declare_ref(name: &str, ty: SemanticType) -> IdRef {
        IdRef {
            name: name.into(),
            ty,
            role: IdRole::Declare,
        }
    }

    fn pin_user() -> Build<()> {
        let hub = IdRef {
            name: "hub".into(),
            ty: hub_ty(),
            role: IdRole::Use,
        };
        let me = declare_ref("relay", SemanticType::component());
        Build::get_variable(hub).then(move |hub, scope| {
            let pin = hub.arrow("make_output_pin").call([Expression::Int(3)]);
            scope.declare(&me, Expression::app().dot("make_relay").call([pin]))?;
            Ok(Build::ready(()))
        })
    }

    #[test]
    fn test_ready_task_completes_immediately() {
        let registry = SymbolRegistry::new();
        let me = declare_ref("hub", hub_ty());
        let build = Build::run(move |scope| {
            scope.declare(&me, Expression::app().dot("make_pcf8574_component").call([Expression::Hex(0x21)]))?;
            Ok(Build::ready(()))
        });
        let task = ExpressionTask::begin(InstanceLabel::single("pcf8574"), vec!["hub".into()], build, &registry);
        assert!(task.is_ready());

        let Advance::Complete { fragment, follow_up, state } = task.run(&registry).unwrap() else {
            panic!("expected completion");
        };
        assert!(follow_up.is_none());
        assert_eq!(state, InstanceState::Done);
        assert_eq!(fragment.declares, vec![Identifier::new("hub", hub_ty())]);
    }

    #[test]
    fn test_suspends_until_dependency_declared() {
        let mut registry = SymbolRegistry::new();
        let task = ExpressionTask::begin(InstanceLabel::indexed("relay", 0), vec!["relay".into()], pin_user(), &registry);
        assert!(!task.is_ready());
        assert!(task.is_waiting_on(&"hub".into()));

        let task = match task.run(&registry).unwrap() {
            Advance::Pending(task) => task,
            other => panic!("expected pending, got {other:?}"),
        };
        assert_eq!(task.state(), InstanceState::Building { suspensions: 1 });

        registry.declare(Identifier::new("hub", hub_ty())).unwrap();
        let Advance::Complete { fragment, .. } = task.advance(&"hub".into(), &registry).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(
            fragment.statements[0].to_string(),
            "Component *relay = App.make_relay(hub->make_output_pin(3));"
        );
    }

    #[test]
    fn test_declaring_task_splits_when_blocked() {
        let registry = SymbolRegistry::new();
        let me = declare_ref("a", SemanticType::component());
        let other = IdRef {
            name: "b".into(),
            ty: SemanticType::component(),
            role: IdRole::Use,
        };
        let build = Build::run(move |scope| {
            let a = scope.declare(&me, Expression::app().dot("make_a").call([]))?;
            Ok(Build::get_variable(other).then(move |b, scope| {
                scope.add(a.arrow("set_peer").call([b.expr()]));
                Ok(Build::ready(()))
            }))
        });
        let task = ExpressionTask::begin(InstanceLabel::single("a"), vec!["a".into()], build, &registry);

        let Advance::Complete { fragment, follow_up, .. } = task.run(&registry).unwrap() else {
            panic!("expected split");
        };
        assert_eq!(fragment.declares.len(), 1);
        let follow_up = follow_up.unwrap();
        assert!(follow_up.is_waiting_on(&"b".into()));
    }

    #[test]
    fn test_rule_errors_are_attributed() {
        let registry = SymbolRegistry::new();
        let build = Build::run(|_| Err(Error::invalid("pin", "boom")));
        let task = ExpressionTask::begin(InstanceLabel::indexed("relay", 2), vec![], build, &registry);
        assert!(matches!(
            task.run(&registry),
            Err(Error::Generation { instance, .. }) if instance == "relay[2]"
        ));
    }
}
