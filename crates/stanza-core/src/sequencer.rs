//! Emission sequencer
//!
//! Runs every submitted [`ExpressionTask`] to completion with a fixed-point
//! loop. Each pass visits the pending tasks in submission order; a task whose
//! dependencies are now declared is advanced, and every completed fragment is
//! committed at once, so tasks later in the same pass already see its
//! declarations.
//!
//! A pass that neither advances a task nor commits a fragment means the rest
//! can never finish. The stall is diagnosed from the identifiers each task
//! still waits on, and every cause is reported:
//!
//! - awaited names promised by no pending task: `UnresolvedReference`
//! - awaited names that loop back through other pending tasks:
//!   `CyclicDependency`, naming the identifiers along one cycle

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{Diagnostics, Error, Result};
use crate::expr::{Advance, ExpressionTask, StatementFragment};
use crate::registry::SymbolRegistry;
use crate::types::{IdName, InstanceLabel, InstanceState};

/// Fixed-point driver over pending tasks
#[derive(Debug, Default)]
pub struct Sequencer {
    registry: SymbolRegistry,
    pending: Vec<ExpressionTask>,
}

/// Fully ordered result of a run
#[derive(Debug)]
pub struct Sequenced {
    /// Fragments in emission order
    pub fragments: Vec<StatementFragment>,
    /// Every identifier declared by the run
    pub registry: SymbolRegistry,
    /// Final state of every instance that produced a task
    pub states: IndexMap<InstanceLabel, InstanceState>,
    /// Number of passes the loop needed
    pub passes: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view used to start tasks.
    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn submit(&mut self, task: ExpressionTask) {
        self.pending.push(task);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Run all pending tasks and produce the ordered fragment sequence.
    ///
    /// Structural failures end the run; a stall reports each of its causes.
    pub fn finalize(mut self) -> std::result::Result<Sequenced, Diagnostics> {
        let mut fragments = Vec::new();
        let mut states = IndexMap::new();
        let mut passes = 0;

        while !self.pending.is_empty() {
            passes += 1;
            let mut progressed = false;
            let mut still_pending = Vec::with_capacity(self.pending.len());

            for task in std::mem::take(&mut self.pending) {
                let resolved: Vec<IdName> = task
                    .outstanding()
                    .filter(|name| self.registry.contains(name))
                    .cloned()
                    .collect();
                if !task.is_ready() && resolved.is_empty() {
                    still_pending.push(task);
                    continue;
                }
                progressed = true;

                let mut outcome = if task.is_ready() {
                    task.run(&self.registry)?
                } else {
                    Advance::Pending(task)
                };
                for name in &resolved {
                    outcome = match outcome {
                        Advance::Pending(task) => task.advance(name, &self.registry)?,
                        complete => complete,
                    };
                }

                match outcome {
                    Advance::Pending(task) => still_pending.push(task),
                    Advance::Complete {
                        fragment,
                        follow_up,
                        state,
                    } => {
                        states.insert(fragment.instance.clone(), state);
                        self.commit(fragment, &mut fragments)?;
                        if let Some(task) = follow_up {
                            still_pending.push(task);
                        }
                    }
                }
            }

            trace!(pass = passes, remaining = still_pending.len(), "sequencer pass");
            if !progressed {
                return Err(diagnose(&still_pending, &self.registry));
            }
            self.pending = still_pending;
        }

        debug!(fragments = fragments.len(), passes, "sequencing finished");
        Ok(Sequenced {
            fragments,
            registry: self.registry,
            states,
            passes,
        })
    }

    fn commit(&mut self, fragment: StatementFragment, out: &mut Vec<StatementFragment>) -> Result<()> {
        for id in &fragment.declares {
            self.registry.declare(id.clone())?;
        }
        if fragment.statements.is_empty() {
            return Ok(());
        }
        debug!(
            instance = %fragment.instance,
            statements = fragment.statements.len(),
            declares = fragment.declares.len(),
            "fragment emitted"
        );
        out.push(fragment);
        Ok(())
    }
}

/// Explain why `stalled` cannot make progress.
fn diagnose(stalled: &[ExpressionTask], registry: &SymbolRegistry) -> Diagnostics {
    let mut promised: IndexMap<&IdName, usize> = IndexMap::new();
    for (idx, task) in stalled.iter().enumerate() {
        for name in task.pending_promises(registry) {
            promised.entry(name).or_insert(idx);
        }
    }

    let mut unresolved: Vec<IdName> = Vec::new();
    for name in stalled.iter().flat_map(ExpressionTask::outstanding) {
        if !promised.contains_key(name) && !unresolved.contains(name) {
            unresolved.push(name.clone());
        }
    }
    let edges: Vec<Vec<(IdName, usize)>> = stalled
        .iter()
        .map(|task| {
            task.outstanding()
                .filter_map(|name| promised.get(name).map(|&to| (name.clone(), to)))
                .collect()
        })
        .collect();

    let mut errors = Vec::new();
    if !unresolved.is_empty() {
        errors.push(Error::UnresolvedReference { names: unresolved });
    }
    if let Some(cycle) = find_cycle(&edges) {
        errors.push(Error::CyclicDependency { cycle });
    }
    if errors.is_empty() {
        errors.push(Error::UnresolvedReference {
            names: stalled
                .iter()
                .flat_map(ExpressionTask::outstanding)
                .cloned()
                .collect(),
        });
    }
    Diagnostics::new(errors)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

/// First cycle reachable in task order; returns the awaited names along it.
fn find_cycle(edges: &[Vec<(IdName, usize)>]) -> Option<Vec<IdName>> {
    let mut marks = vec![Mark::New; edges.len()];
    let mut stack = Vec::new();
    (0..edges.len()).find_map(|start| visit(start, edges, &mut marks, &mut stack))
}

fn visit(
    node: usize,
    edges: &[Vec<(IdName, usize)>],
    marks: &mut [Mark],
    stack: &mut Vec<(usize, IdName)>,
) -> Option<Vec<IdName>> {
    if marks[node] != Mark::New {
        return None;
    }
    marks[node] = Mark::Active;
    for (name, next) in &edges[node] {
        stack.push((node, name.clone()));
        if marks[*next] == Mark::Active {
            let start = stack.iter().position(|(n, _)| n == next)?;
            return Some(stack[start..].iter().map(|(_, name)| name.clone()).collect());
        }
        if let Some(cycle) = visit(*next, edges, marks, stack) {
            return Some(cycle);
        }
        stack.pop();
    }
    marks[node] = Mark::Done;
    None
}
