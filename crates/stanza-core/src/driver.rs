//! Component catalog and driver
//!
//! Components register a static [`ComponentDescriptor`] into the
//! [`COMPONENTS`] distributed slice, the same way kernels are collected at
//! link time. A [`Catalog`] builds every descriptor's schema eagerly, so a
//! schema conflict fails the catalog before any document is read.
//!
//! The [`Driver`] takes one document section at a time and moves each
//! configured instance through its lifecycle:
//!
//! ```text
//! Unvalidated ─► Validated ─► Building ─► Declared ─► Configured ─► Done
//!      │                        (suspended 0..n times)
//!      └─► Invalid
//! ```
//!
//! Everything after `Validated` happens inside an [`ExpressionTask`] driven
//! by the sequencer.
//!
//! # Example Registration
//!
//! ```ignore
//! use stanza_core::driver::{ComponentDescriptor, Lifecycle, COMPONENTS};
//! use stanza_core::linkme::distributed_slice;
//!
//! #[distributed_slice(COMPONENTS)]
//! static RELAY: ComponentDescriptor = ComponentDescriptor {
//!     kind: "relay",
//!     doc: "Switchable relay",
//!     schema: relay_schema,
//!     generate: relay_to_code,
//!     build_flags: &["-DUSE_OUTPUT"],
//!     lifecycle: Lifecycle::Component,
//! };
//! ```

use std::collections::BTreeSet;

use indexmap::IndexMap;
use linkme::distributed_slice;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::expr::{Build, Expression, ExpressionTask, VarRef};
use crate::options::{CompileOptions, UnknownComponents};
use crate::pins::PinTable;
use crate::registry::SymbolRegistry;
use crate::schema::{
    CONF_SETUP_PRIORITY, CONF_UPDATE_INTERVAL, ConfigSchema, component_schema, polling_component_schema,
};
use crate::types::{BuildFlag, InstanceLabel, InstanceState, SemanticType};
use crate::value::ConfigMap;

/// Builds a component's own schema
pub type SchemaFn = fn() -> Result<ConfigSchema>;

/// Generation rule: validated configuration to the component's primary variable
pub type GenerateFn = fn(&ConfigMap) -> Result<Build<VarRef>>;

/// How a component attaches to the application lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not attached; no lifecycle keys
    Unattached,
    /// Registered for setup; accepts `setup_priority`
    Component,
    /// Registered for setup and periodic updates; adds `update_interval`
    Polling,
}

/// Descriptor for a registered component kind
pub struct ComponentDescriptor {
    /// Document key (e.g. "power_supply")
    pub kind: &'static str,
    /// Documentation string
    pub doc: &'static str,
    pub schema: SchemaFn,
    pub generate: GenerateFn,
    /// Flags requested by every valid instance
    pub build_flags: &'static [&'static str],
    pub lifecycle: Lifecycle,
}

/// Distributed slice collecting all component registrations.
#[distributed_slice]
pub static COMPONENTS: [ComponentDescriptor];

/// Get all registered component kinds
pub fn all_kinds() -> impl Iterator<Item = &'static str> {
    COMPONENTS.iter().map(|c| c.kind)
}

/// Look up a registered component by kind
pub fn get(kind: &str) -> Option<&'static ComponentDescriptor> {
    COMPONENTS.iter().find(|c| c.kind == kind)
}

/// A descriptor together with its fully composed schema
pub struct CatalogEntry {
    pub descriptor: &'static ComponentDescriptor,
    pub schema: ConfigSchema,
}

/// Component kinds available to one compilation run
pub struct Catalog {
    entries: IndexMap<&'static str, CatalogEntry>,
}

impl Catalog {
    /// Every component linked into the binary, sorted by kind.
    pub fn linked() -> Result<Self> {
        let mut descriptors: Vec<&'static ComponentDescriptor> = COMPONENTS.iter().collect();
        // Sort for determinism
        descriptors.sort_by_key(|d| d.kind);
        Self::from_descriptors(descriptors)
    }

    /// Catalog of exactly `descriptors`, in the given order.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'static ComponentDescriptor>,
    {
        let mut entries = IndexMap::new();
        for descriptor in descriptors {
            if entries.contains_key(descriptor.kind) {
                return Err(Error::InvalidSchema {
                    key: descriptor.kind.to_string(),
                    message: "component kind registered more than once".to_string(),
                });
            }
            let schema = compose_schema(descriptor)?;
            debug!(kind = descriptor.kind, keys = schema.keys().count(), "component schema built");
            entries.insert(descriptor.kind, CatalogEntry { descriptor, schema });
        }
        Ok(Self { entries })
    }

    pub fn get(&self, kind: &str) -> Option<&CatalogEntry> {
        self.entries.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compose_schema(descriptor: &ComponentDescriptor) -> Result<ConfigSchema> {
    let own = (descriptor.schema)()?;
    match descriptor.lifecycle {
        Lifecycle::Unattached => Ok(own),
        Lifecycle::Component => own.extend(&component_schema()?),
        Lifecycle::Polling => own.extend(&polling_component_schema()?),
    }
}

/// Outcome of driving one document section
#[derive(Debug, Default)]
pub struct SectionRun {
    /// One task per valid instance, in document order
    pub tasks: Vec<ExpressionTask>,
    /// Flags requested by the valid instances
    pub flags: BTreeSet<BuildFlag>,
    /// Instance-level failures; siblings are unaffected
    pub failures: Vec<Error>,
    /// Every instance in document order with its state after validation
    pub states: Vec<(InstanceLabel, InstanceState)>,
}

/// Drives document sections through validation and task creation.
pub struct Driver<'a> {
    catalog: &'a Catalog,
    pins: &'a dyn PinTable,
    options: &'a CompileOptions,
}

impl<'a> Driver<'a> {
    pub fn new(catalog: &'a Catalog, pins: &'a dyn PinTable, options: &'a CompileOptions) -> Self {
        Self { catalog, pins, options }
    }

    /// Validate every instance of `kind` in `section` and start its task.
    ///
    /// Only generation rules that fail before suspending return `Err`; all
    /// validation problems end up in [`SectionRun::failures`].
    pub fn run(&self, kind: &str, section: &JsonValue, registry: &SymbolRegistry) -> Result<SectionRun> {
        let mut out = SectionRun::default();

        let Some(entry) = self.catalog.get(kind) else {
            match self.options.unknown_components {
                UnknownComponents::Reject => {
                    warn!(kind, "unknown component");
                    out.failures.push(Error::UnknownComponent(kind.to_string()));
                }
                UnknownComponents::Warn => warn!(kind, "skipping unknown component"),
            }
            return Ok(out);
        };

        let instances = match split_instances(kind, section, entry.schema.is_multi_conf()) {
            Ok(instances) => instances,
            Err(error) => {
                warn!(kind, %error, "section rejected");
                out.failures.push(error);
                return Ok(out);
            }
        };

        for (label, raw) in instances {
            match entry.schema.validate(raw, self.pins) {
                Ok(config) => {
                    debug!(instance = %label, "validated");
                    out.states.push((label.clone(), InstanceState::Validated));
                    let task = self.start(entry.descriptor, label, &config, registry)?;
                    out.tasks.push(task);
                    out.flags
                        .extend(entry.descriptor.build_flags.iter().map(|f| BuildFlag::from(*f)));
                }
                Err(errors) => {
                    warn!(instance = %label, errors = errors.len(), "invalid configuration");
                    out.states.push((label.clone(), InstanceState::Invalid));
                    out.failures.push(Error::Invalid { instance: label, errors });
                }
            }
        }
        Ok(out)
    }

    fn start(
        &self,
        descriptor: &'static ComponentDescriptor,
        label: InstanceLabel,
        config: &ConfigMap,
        registry: &SymbolRegistry,
    ) -> Result<ExpressionTask> {
        let primary = (descriptor.generate)(config).map_err(|e| Error::Generation {
            instance: label.to_string(),
            message: e.to_string(),
        })?;
        let build = attach_lifecycle(descriptor.lifecycle, config, primary).map_err(|e| Error::Generation {
            instance: label.to_string(),
            message: e.to_string(),
        })?;
        let promises = config.declared_ids().into_iter().map(|id| id.name).collect();

        let task = ExpressionTask::begin(label, promises, build, registry);
        debug!(
            instance = %task.label(),
            ready = task.is_ready(),
            "generation started"
        );
        Ok(task)
    }
}

/// Split a section into labelled raw instances.
fn split_instances<'v>(kind: &str, section: &'v JsonValue, multi_conf: bool) -> Result<Vec<(InstanceLabel, &'v JsonValue)>> {
    match section {
        JsonValue::Array(items) if multi_conf => Ok(items
            .iter()
            .enumerate()
            .map(|(i, raw)| (InstanceLabel::indexed(kind, i), raw))
            .collect()),
        JsonValue::Array(_) => Err(Error::Multiplicity {
            kind: kind.to_string(),
        }),
        single if multi_conf => Ok(vec![(InstanceLabel::indexed(kind, 0), single)]),
        single => Ok(vec![(InstanceLabel::single(kind), single)]),
    }
}

/// The cross-cutting step shared by every lifecycle component.
fn attach_lifecycle(lifecycle: Lifecycle, config: &ConfigMap, primary: Build<VarRef>) -> Result<Build<()>> {
    let priority = config.float(CONF_SETUP_PRIORITY)?;
    let interval = config.duration(CONF_UPDATE_INTERVAL)?;

    Ok(primary.then(move |var, scope| {
        scope.mark(InstanceState::Configured);
        if lifecycle != Lifecycle::Unattached {
            if !var.ty.is_a(&SemanticType::component()) {
                return Err(Error::TypeMismatch {
                    name: var.name.clone(),
                    expected: SemanticType::component(),
                    actual: var.ty.clone(),
                });
            }
            if let Some(priority) = priority {
                scope.add(var.arrow("set_setup_priority").call([Expression::Float(priority)]));
            }
            if lifecycle == Lifecycle::Polling
                && let Some(interval) = interval
            {
                scope.add(var.arrow("set_update_interval").call([Expression::millis(interval)]));
            }
            scope.add(Expression::app().dot("register_component").call([var.expr()]));
        }
        scope.mark(InstanceState::Done);
        Ok(Build::ready(()))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Advance;
    use crate::pins::AnyPins;
    use crate::schema::{CONF_ID, Validator};
    use serde_json::json;

    fn sensor_ty() -> SemanticType {
        SemanticType::new("TestSensor").extends(SemanticType::polling_component())
    }

    fn sensor_schema() -> Result<ConfigSchema> {
        ConfigSchema::builder()
            .required(CONF_ID, Validator::DeclareId(sensor_ty()))
            .optional("name", Validator::String)
            .multi_conf()
            .build()
    }

    fn sensor_to_code(config: &ConfigMap) -> Result<Build<VarRef>> {
        let id = config.declared_id(CONF_ID)?.clone();
        let name = config.string("name")?.map(Expression::string);
        Ok(Build::run(move |scope| {
            let var = scope.declare(&id, Expression::app().dot("make_test_sensor").call([]))?;
            if let Some(name) = name {
                scope.add(var.arrow("set_name").call([name]));
            }
            Ok(Build::ready(var))
        }))
    }

    #[distributed_slice(COMPONENTS)]
    static TEST_SENSOR: ComponentDescriptor = ComponentDescriptor {
        kind: "test_sensor",
        doc: "Polling sensor used by driver tests",
        schema: sensor_schema,
        generate: sensor_to_code,
        build_flags: &["-DUSE_TEST_SENSOR"],
        lifecycle: Lifecycle::Polling,
    };

    fn catalog() -> Catalog {
        Catalog::from_descriptors([&TEST_SENSOR]).unwrap()
    }

    #[test]
    fn test_linked_lookup() {
        assert!(get("test_sensor").is_some());
        assert!(all_kinds().any(|k| k == "test_sensor"));
        assert!(Catalog::linked().unwrap().get("test_sensor").is_some());
    }

    #[test]
    fn test_lifecycle_keys_composed() {
        let catalog = catalog();
        let schema = &catalog.get("test_sensor").unwrap().schema;
        assert!(schema.get(CONF_SETUP_PRIORITY).is_some());
        assert!(schema.get(CONF_UPDATE_INTERVAL).is_some());
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        assert!(matches!(
            Catalog::from_descriptors([&TEST_SENSOR, &TEST_SENSOR]),
            Err(Error::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_invalid_instance_isolated() {
        let catalog = catalog();
        let options = CompileOptions::default();
        let driver = Driver::new(&catalog, &AnyPins, &options);
        let registry = SymbolRegistry::new();

        let run = driver
            .run("test_sensor", &json!([{"id": "a"}, {"name": "missing id"}]), &registry)
            .unwrap();
        assert_eq!(run.tasks.len(), 1);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(
            run.states,
            vec![
                (InstanceLabel::indexed("test_sensor", 0), InstanceState::Validated),
                (InstanceLabel::indexed("test_sensor", 1), InstanceState::Invalid),
            ]
        );
        assert!(run.flags.contains(&BuildFlag::from("-DUSE_TEST_SENSOR")));
    }

    #[test]
    fn test_lifecycle_statements() {
        let catalog = catalog();
        let options = CompileOptions::default();
        let driver = Driver::new(&catalog, &AnyPins, &options);
        let registry = SymbolRegistry::new();

        let mut run = driver
            .run(
                "test_sensor",
                &json!({"id": "s1", "setup_priority": 800, "update_interval": "15s"}),
                &registry,
            )
            .unwrap();
        let task = run.tasks.remove(0);
        assert_eq!(task.label(), &InstanceLabel::indexed("test_sensor", 0));

        let Advance::Complete { fragment, state, .. } = task.run(&registry).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(state, InstanceState::Done);
        let lines: Vec<String> = fragment.statements.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "TestSensor *s1 = App.make_test_sensor();",
                "s1->set_setup_priority(800.0f);",
                "s1->set_update_interval(15000);",
                "App.register_component(s1);",
            ]
        );
    }

    #[test]
    fn test_unknown_component_policy() {
        let catalog = catalog();
        let registry = SymbolRegistry::new();

        let reject = CompileOptions::default();
        let run = Driver::new(&catalog, &AnyPins, &reject)
            .run("mystery", &json!({}), &registry)
            .unwrap();
        assert_eq!(run.failures, vec![Error::UnknownComponent("mystery".into())]);

        let warn = CompileOptions {
            unknown_components: UnknownComponents::Warn,
            ..Default::default()
        };
        let run = Driver::new(&catalog, &AnyPins, &warn)
            .run("mystery", &json!({}), &registry)
            .unwrap();
        assert!(run.failures.is_empty());
    }

    #[test]
    fn test_split_instances() {
        let list = json!([{}, {}]);
        assert_eq!(split_instances("k", &list, true).unwrap().len(), 2);
        assert_eq!(
            split_instances("k", &list, false).unwrap_err(),
            Error::Multiplicity { kind: "k".into() }
        );
        let single = json!(null);
        assert_eq!(split_instances("k", &single, false).unwrap()[0].0, InstanceLabel::single("k"));
    }
}
