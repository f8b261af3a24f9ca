//! High-level compile API
//!
//! ```text
//! document ─► Driver (validate, start tasks) ─► Sequencer (fixed point) ─► Program
//!                 │                                  │
//!                 └─ instance failures ──────────────┴─► Diagnostics
//! ```

use std::collections::BTreeSet;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use crate::driver::{Catalog, Driver};
use crate::error::{Diagnostics, Error, Result};
use crate::expr::{Statement, StatementFragment};
use crate::options::CompileOptions;
use crate::pins::{AnyPins, PinTable};
use crate::sequencer::Sequencer;
use crate::types::{BuildFlag, IdName, InstanceLabel, InstanceState, SemanticType};

/// Ordered output of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Fragments in emission order
    pub fragments: Vec<StatementFragment>,
    /// Union of every instance's build flags and the configured extras
    pub flags: BTreeSet<BuildFlag>,
    /// Declared identifier to type, in declaration order
    pub symbols: IndexMap<IdName, SemanticType>,
}

impl Program {
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.fragments.iter().flat_map(|f| f.statements.iter())
    }

    /// Render all statements, one per line, each fragment headed by a
    /// comment naming its instance.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Verify that every referenced identifier is declared by an earlier
    /// fragment (or earlier in the same fragment).
    pub fn check_order(&self) -> Result<()> {
        let mut seen: IndexSet<&IdName> = IndexSet::new();
        for fragment in &self.fragments {
            for statement in &fragment.statements {
                let missing: Vec<IdName> = statement
                    .references()
                    .into_iter()
                    .filter(|name| !seen.contains(name))
                    .collect();
                if !missing.is_empty() {
                    return Err(Error::UnresolvedReference { names: missing });
                }
                if let Statement::Declare { id, .. } = statement {
                    seen.insert(&id.name);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            writeln!(f, "// {}", fragment.instance)?;
            write!(f, "{fragment}")?;
        }
        Ok(())
    }
}

/// Result of a run that reached the end of sequencing
#[derive(Debug)]
pub struct Compilation {
    /// Output of every valid instance
    pub program: Program,
    /// Instance-level failures (`Invalid`, `UnknownComponent`, `Multiplicity`)
    pub invalid: Vec<Error>,
    /// Final state of every instance, in document order
    pub states: IndexMap<InstanceLabel, InstanceState>,
}

impl Compilation {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }

    /// The program, or every instance failure when there was any.
    pub fn into_result(self) -> std::result::Result<Program, Diagnostics> {
        if self.invalid.is_empty() {
            Ok(self.program)
        } else {
            Err(Diagnostics::new(self.invalid))
        }
    }
}

/// Compiles configuration documents against a component catalog.
pub struct Compiler {
    catalog: Catalog,
    pins: Box<dyn PinTable>,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            pins: Box::new(AnyPins),
            options: CompileOptions::default(),
        }
    }

    /// Compiler over every component linked into the binary.
    pub fn linked() -> Result<Self> {
        Ok(Self::new(Catalog::linked()?))
    }

    pub fn with_pins(mut self, pins: impl PinTable + 'static) -> Self {
        self.pins = Box::new(pins);
        self
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one document.
    ///
    /// Instance-level failures are collected into [`Compilation::invalid`];
    /// structural failures abort the run and are returned together with every
    /// instance failure collected before them. A stalled sequence reports
    /// each of its causes.
    #[instrument(skip_all, name = "compile")]
    pub fn compile(&self, document: &JsonValue) -> std::result::Result<Compilation, Diagnostics> {
        let JsonValue::Object(sections) = document else {
            return Err(Error::invalid("", "expected a mapping of component sections").into());
        };

        let driver = Driver::new(&self.catalog, self.pins.as_ref(), &self.options);
        let mut sequencer = Sequencer::new();
        let mut flags: BTreeSet<BuildFlag> = self.options.build_flags.iter().cloned().collect();
        let mut invalid = Vec::new();
        let mut order = Vec::new();

        for (kind, section) in sections {
            let run = match driver.run(kind, section, sequencer.registry()) {
                Ok(run) => run,
                Err(error) => return Err(abort(invalid, error)),
            };
            flags.extend(run.flags);
            invalid.extend(run.failures);
            order.extend(run.states);
            for task in run.tasks {
                sequencer.submit(task);
            }
        }

        let sequenced = match sequencer.finalize() {
            Ok(sequenced) => sequenced,
            Err(error) => return Err(abort(invalid, error)),
        };

        let states = order
            .into_iter()
            .map(|(label, state)| {
                let last = sequenced.states.get(&label).copied().unwrap_or(state);
                (label, last)
            })
            .collect();

        let program = Program {
            fragments: sequenced.fragments,
            flags,
            symbols: sequenced.registry.types(),
        };
        info!(
            fragments = program.fragments.len(),
            symbols = program.symbols.len(),
            flags = program.flags.len(),
            invalid = invalid.len(),
            passes = sequenced.passes,
            "compilation finished"
        );

        Ok(Compilation {
            program,
            invalid,
            states,
        })
    }
}

fn abort(mut collected: Vec<Error>, fatal: impl Into<Diagnostics>) -> Diagnostics {
    let fatal = fatal.into();
    warn!(errors = fatal.len(), "compilation aborted: {fatal}");
    collected.extend(fatal.errors);
    Diagnostics::new(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::types::Identifier;

    fn fragment(label: &str, statements: Vec<Statement>) -> StatementFragment {
        let declares = statements
            .iter()
            .filter_map(|s| match s {
                Statement::Declare { id, .. } => Some(id.clone()),
                Statement::Expr(_) => None,
            })
            .collect();
        StatementFragment {
            instance: InstanceLabel::single(label),
            statements,
            declares,
        }
    }

    fn declare(name: &str, value: Expression) -> Statement {
        Statement::Declare {
            id: Identifier::new(name, SemanticType::component()),
            value,
        }
    }

    #[test]
    fn test_render_and_order() {
        let program = Program {
            fragments: vec![
                fragment("a", vec![declare("a", Expression::app().dot("make_a").call([]))]),
                fragment(
                    "b",
                    vec![declare("b", Expression::app().dot("make_b").call([Expression::Var("a".into())]))],
                ),
            ],
            flags: BTreeSet::new(),
            symbols: IndexMap::new(),
        };
        assert!(program.check_order().is_ok());
        assert_eq!(
            program.render(),
            "// a\nComponent *a = App.make_a();\n// b\nComponent *b = App.make_b(a);\n"
        );
    }

    #[test]
    fn test_display_matches_render() {
        let program = Program {
            fragments: vec![fragment(
                "hub",
                vec![
                    declare("hub", Expression::app().dot("make_hub").call([])),
                    Statement::Expr(Expression::Var("hub".into()).arrow("setup").call([])),
                ],
            )],
            flags: BTreeSet::new(),
            symbols: IndexMap::new(),
        };
        assert_eq!(format!("{program}"), "// hub\nComponent *hub = App.make_hub();\nhub->setup();\n");
        assert_eq!(program.render(), program.to_string());
    }

    #[test]
    fn test_check_order_detects_forward_reference() {
        let program = Program {
            fragments: vec![
                fragment("b", vec![declare("b", Expression::Var("a".into()))]),
                fragment("a", vec![declare("a", Expression::Int(1))]),
            ],
            flags: BTreeSet::new(),
            symbols: IndexMap::new(),
        };
        assert_eq!(
            program.check_order(),
            Err(Error::UnresolvedReference {
                names: vec!["a".into()]
            })
        );
    }

    #[test]
    fn test_non_mapping_document_rejected() {
        let compiler = Compiler::new(Catalog::from_descriptors([]).unwrap());
        let err = compiler.compile(&serde_json::json!([1, 2])).unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_extra_flags_on_empty_document() {
        let compiler = Compiler::new(Catalog::from_descriptors([]).unwrap())
            .with_options(CompileOptions::default().with_build_flag("-DDEBUG"));
        let compilation = compiler.compile(&serde_json::json!({})).unwrap();
        assert!(compilation.is_clean());
        let program = compilation.into_result().unwrap();
        assert!(program.fragments.is_empty());
        assert!(program.flags.contains(&BuildFlag::from("-DDEBUG")));
    }
}
