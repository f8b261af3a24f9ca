//! Configuration schemas and validation
//!
//! A [`ConfigSchema`] maps key names to [`KeyConstraint`]s. Schemas are
//! assembled with [`SchemaBuilder`] and composed by extension; every merge is
//! checked eagerly, so a conflicting pair of schemas fails when the schema is
//! built, before any configuration document is looked at.
//!
//! # Validation
//!
//! ```text
//! raw mapping ──► required keys present? ──► coerce each key ──► unknown keys? ──► cross-field checks
//!                  MissingRequiredField       InvalidFieldType     UnknownField      InvalidFieldType
//! ```
//!
//! All errors of one unit are collected, not just the first one.
//!
//! # Examples
//!
//! ```
//! # use stanza_core::schema::{ConfigSchema, Validator};
//! # use stanza_core::pins::AnyPins;
//! # use serde_json::json;
//! let schema = ConfigSchema::builder()
//!     .required("name", Validator::String)
//!     .optional_default("retries", Validator::int_range(0, 10), json!(3))
//!     .build()
//!     .unwrap();
//!
//! let config = schema.validate(&json!({"name": "relay"}), &AnyPins).unwrap();
//! assert_eq!(config.int("retries").unwrap(), Some(3));
//! ```

pub mod duration;
pub mod validator;

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::trace;

use crate::error::{Error, Result};
use crate::pins::PinTable;
use crate::value::ConfigMap;

pub use duration::{DurationRule, Precision};
pub use validator::{CustomFn, CustomValidator, ValidationContext, Validator, check_identifier};

/// Key of the identifier every component declares
pub const CONF_ID: &str = "id";
/// Optional setup priority of a lifecycle component
pub const CONF_SETUP_PRIORITY: &str = "setup_priority";
/// Update interval of a polling component
pub const CONF_UPDATE_INTERVAL: &str = "update_interval";

/// Whether a key must be present
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Required,
    /// Absent keys take `default` when one is given; otherwise they stay absent.
    Optional { default: Option<JsonValue> },
}

/// Constraint on a single key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyConstraint {
    pub presence: Presence,
    pub validator: Validator,
}

impl KeyConstraint {
    pub fn is_required(&self) -> bool {
        matches!(self.presence, Presence::Required)
    }
}

/// Signature of a cross-field check
pub type CheckFn = fn(&ConfigMap) -> std::result::Result<(), String>;

/// Check run over the whole validated mapping once every key passed.
#[derive(Clone, Copy)]
pub struct CrossCheck {
    pub name: &'static str,
    pub check: CheckFn,
}

impl PartialEq for CrossCheck {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for CrossCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CrossCheck").field(&self.name).finish()
    }
}

/// Validated, immutable schema
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigSchema {
    keys: IndexMap<String, KeyConstraint>,
    checks: Vec<CrossCheck>,
    /// Unknown keys are ignored instead of rejected
    permissive: bool,
    /// A configuration section may hold zero or more instances
    multi_conf: bool,
}

impl ConfigSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, &KeyConstraint)> {
        self.keys.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn get(&self, key: &str) -> Option<&KeyConstraint> {
        self.keys.get(key)
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    pub fn is_multi_conf(&self) -> bool {
        self.multi_conf
    }

    /// Merge `parent`'s keys and checks into this schema.
    ///
    /// A key present in both with different constraints is a
    /// [`Error::SchemaConflict`]; identical keys are kept once. Flags
    /// (permissive, multi-conf) come from `self`.
    pub fn extend(&self, parent: &ConfigSchema) -> Result<ConfigSchema> {
        let mut merged = self.clone();
        for (key, constraint) in &parent.keys {
            merge_key(&mut merged.keys, key, constraint)?;
        }
        for check in &parent.checks {
            if !merged.checks.contains(check) {
                merged.checks.push(*check);
            }
        }
        check_declarations(&merged)?;
        Ok(merged)
    }

    /// Validate one raw configuration unit.
    pub fn validate(&self, raw: &JsonValue, pins: &dyn PinTable) -> std::result::Result<ConfigMap, Vec<Error>> {
        let mut cx = ValidationContext::new(pins);
        match self.validate_nested(raw, &mut cx) {
            Some(config) if cx.error_count() == 0 => Ok(config),
            _ => Err(cx.into_errors()),
        }
    }

    /// Validate a mapping at the context's current path.
    ///
    /// Used by [`Validator::Nested`] and by custom validators composing
    /// schemas. Returns `None` when any error was recorded.
    pub fn validate_nested(&self, raw: &JsonValue, cx: &mut ValidationContext<'_>) -> Option<ConfigMap> {
        let empty = JsonMap::new();
        let object = match raw {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            _ => {
                cx.error("expected a mapping");
                return None;
            }
        };

        let before = cx.error_count();
        let mut out = ConfigMap::new();

        for (key, constraint) in &self.keys {
            let raw_value = match (object.get(key), &constraint.presence) {
                (Some(value), _) => value,
                (None, Presence::Optional { default: Some(default) }) => default,
                (None, Presence::Optional { default: None }) => continue,
                (None, Presence::Required) => {
                    cx.push(Error::MissingRequiredField {
                        path: cx.path_with(Some(key)),
                    });
                    continue;
                }
            };
            if let Some(value) = cx.nested(key.as_str(), |cx| constraint.validator.validate(raw_value, cx)) {
                out.insert(key.clone(), value);
            }
        }

        for key in object.keys() {
            if self.keys.contains_key(key) {
                continue;
            }
            if self.permissive {
                trace!(key = %cx.path_with(Some(key)), "ignoring extra key");
            } else {
                cx.push(Error::UnknownField {
                    path: cx.path_with(Some(key)),
                });
            }
        }

        if cx.error_count() != before {
            return None;
        }

        for check in &self.checks {
            if let Err(message) = (check.check)(&out) {
                cx.error(message);
            }
        }

        (cx.error_count() == before).then_some(out)
    }
}

/// Builder for [`ConfigSchema`].
///
/// Key insertion never fails immediately; duplicates, conflicts with
/// extended schemas and identifier rules are all reported by [`build`].
///
/// [`build`]: SchemaBuilder::build
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    keys: Vec<(String, KeyConstraint)>,
    parents: Vec<ConfigSchema>,
    checks: Vec<CrossCheck>,
    permissive: bool,
    multi_conf: bool,
}

impl SchemaBuilder {
    pub fn required(self, key: impl Into<String>, validator: Validator) -> Self {
        self.key(key, Presence::Required, validator)
    }

    pub fn optional(self, key: impl Into<String>, validator: Validator) -> Self {
        self.key(key, Presence::Optional { default: None }, validator)
    }

    pub fn optional_default(self, key: impl Into<String>, validator: Validator, default: JsonValue) -> Self {
        self.key(
            key,
            Presence::Optional {
                default: Some(default),
            },
            validator,
        )
    }

    pub fn key(mut self, key: impl Into<String>, presence: Presence, validator: Validator) -> Self {
        self.keys.push((key.into(), KeyConstraint { presence, validator }));
        self
    }

    /// Merge another schema's keys at build time.
    pub fn extend(mut self, parent: ConfigSchema) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn check(mut self, name: &'static str, check: CheckFn) -> Self {
        self.checks.push(CrossCheck { name, check });
        self
    }

    /// Ignore keys the schema does not declare.
    pub fn permissive(mut self) -> Self {
        self.permissive = true;
        self
    }

    /// Allow zero or more instances per configuration section.
    pub fn multi_conf(mut self) -> Self {
        self.multi_conf = true;
        self
    }

    pub fn build(self) -> Result<ConfigSchema> {
        let mut keys = IndexMap::new();
        for (key, constraint) in &self.keys {
            merge_key(&mut keys, key, constraint)?;
        }

        let mut schema = ConfigSchema {
            keys,
            checks: Vec::new(),
            permissive: self.permissive,
            multi_conf: self.multi_conf,
        };
        for check in self.checks {
            if !schema.checks.contains(&check) {
                schema.checks.push(check);
            }
        }
        for parent in &self.parents {
            schema = schema.extend(parent)?;
        }

        check_declarations(&schema)?;
        Ok(schema)
    }
}

fn merge_key(keys: &mut IndexMap<String, KeyConstraint>, key: &str, constraint: &KeyConstraint) -> Result<()> {
    match keys.get(key) {
        Some(existing) if existing == constraint => Ok(()),
        Some(_) => Err(Error::SchemaConflict {
            key: key.to_string(),
        }),
        None => {
            keys.insert(key.to_string(), constraint.clone());
            Ok(())
        }
    }
}

/// Identifier declarations must be required: a declaration that may be
/// silently absent would leave sibling instances without a registrable name.
fn check_declarations(schema: &ConfigSchema) -> Result<()> {
    for (key, constraint) in &schema.keys {
        if matches!(constraint.validator, Validator::DeclareId(_)) && !constraint.is_required() {
            return Err(Error::InvalidSchema {
                key: key.clone(),
                message: "identifier declarations must be required".to_string(),
            });
        }
    }
    Ok(())
}

/// Keys shared by every component attached to the application lifecycle.
pub fn component_schema() -> Result<ConfigSchema> {
    ConfigSchema::builder()
        .optional(
            CONF_SETUP_PRIORITY,
            Validator::Float {
                min: None,
                max: None,
            },
        )
        .build()
}

/// [`component_schema`] plus the update interval of polling components.
pub fn polling_component_schema() -> Result<ConfigSchema> {
    ConfigSchema::builder()
        .optional_default(
            CONF_UPDATE_INTERVAL,
            Validator::Duration(DurationRule::milliseconds().positive()),
            JsonValue::String("60s".to_string()),
        )
        .extend(component_schema()?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::AnyPins;
    use crate::types::SemanticType;
    use crate::value::Value;
    use serde_json::json;
    use std::time::Duration;

    fn psu_type() -> SemanticType {
        SemanticType::new("PowerSupplyComponent").extends(SemanticType::component())
    }

    fn psu_schema() -> ConfigSchema {
        ConfigSchema::builder()
            .required(CONF_ID, Validator::DeclareId(psu_type()))
            .required("pin", Validator::GpioPin(crate::pins::PinCapability::Output))
            .optional("enable_time", Validator::Duration(DurationRule::milliseconds()))
            .extend(component_schema().unwrap())
            .multi_conf()
            .build()
            .unwrap()
    }

    #[test]
    fn test_required_optional_and_absent() {
        let config = psu_schema()
            .validate(&json!({"id": "psu1", "pin": 12}), &AnyPins)
            .unwrap();
        assert_eq!(config.declared_id(CONF_ID).unwrap().name.as_str(), "psu1");
        assert_eq!(config.int("pin").unwrap(), Some(12));
        // optional without default stays absent
        assert!(!config.contains("enable_time"));
        assert!(!config.contains(CONF_SETUP_PRIORITY));
    }

    #[test]
    fn test_collects_all_errors() {
        let errors = psu_schema()
            .validate(&json!({"enable_time": "fast", "colour": "red"}), &AnyPins)
            .unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&Error::MissingRequiredField { path: "id".into() }));
        assert!(errors.contains(&Error::MissingRequiredField { path: "pin".into() }));
        assert!(errors.contains(&Error::UnknownField { path: "colour".into() }));
        assert!(matches!(&errors[2], Error::InvalidFieldType { path, .. } if path == "enable_time"));
    }

    #[test]
    fn test_permissive_ignores_extra_keys() {
        let schema = ConfigSchema::builder()
            .optional("a", Validator::Boolean)
            .permissive()
            .build()
            .unwrap();
        let config = schema.validate(&json!({"a": true, "b": 1}), &AnyPins).unwrap();
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_extend_conflict() {
        let parent = ConfigSchema::builder()
            .required(CONF_ID, Validator::DeclareId(SemanticType::component()))
            .build()
            .unwrap();
        let result = ConfigSchema::builder()
            .required(CONF_ID, Validator::DeclareId(psu_type()))
            .extend(parent)
            .build();
        assert_eq!(result, Err(Error::SchemaConflict { key: "id".into() }));
    }

    #[test]
    fn test_extend_identical_keys_merge_once() {
        let schema = psu_schema().extend(&component_schema().unwrap()).unwrap();
        assert_eq!(schema.keys().filter(|(k, _)| *k == CONF_SETUP_PRIORITY).count(), 1);
        assert!(schema.is_multi_conf());
    }

    #[test]
    fn test_duplicate_key_in_builder() {
        let result = ConfigSchema::builder()
            .required("a", Validator::Boolean)
            .optional("a", Validator::Boolean)
            .build();
        assert_eq!(result, Err(Error::SchemaConflict { key: "a".into() }));
    }

    #[test]
    fn test_optional_declaration_rejected() {
        let result = ConfigSchema::builder()
            .optional(CONF_ID, Validator::DeclareId(psu_type()))
            .multi_conf()
            .build();
        assert!(matches!(result, Err(Error::InvalidSchema { key, .. }) if key == "id"));
    }

    #[test]
    fn test_extend_rejects_optional_declaration() {
        let mut keys = IndexMap::new();
        keys.insert(
            "parent_id".to_string(),
            KeyConstraint {
                presence: Presence::Optional { default: None },
                validator: Validator::DeclareId(psu_type()),
            },
        );
        let parent = ConfigSchema {
            keys,
            ..ConfigSchema::default()
        };
        let result = psu_schema().extend(&parent);
        assert!(matches!(result, Err(Error::InvalidSchema { key, .. }) if key == "parent_id"));
    }

    #[test]
    fn test_polling_default_interval() {
        let schema = polling_component_schema().unwrap();
        let config = schema.validate(&json!({}), &AnyPins).unwrap();
        assert_eq!(
            config.get(CONF_UPDATE_INTERVAL),
            Some(&Value::Duration(Duration::from_secs(60)))
        );
    }

    #[test]
    fn test_cross_field_check() {
        fn ordered(config: &ConfigMap) -> std::result::Result<(), String> {
            let bound = |key| config.int(key).map_err(|e| e.to_string());
            match (bound("low")?, bound("high")?) {
                (Some(lo), Some(hi)) if lo > hi => Err("low must not exceed high".into()),
                _ => Ok(()),
            }
        }
        let schema = ConfigSchema::builder()
            .optional("low", Validator::int_range(0, 100))
            .optional("high", Validator::int_range(0, 100))
            .check("ordered", ordered)
            .build()
            .unwrap();
        assert!(schema.validate(&json!({"low": 1, "high": 2}), &AnyPins).is_ok());
        assert!(schema.validate(&json!({"low": 5, "high": 2}), &AnyPins).is_err());
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let schema = psu_schema();
        let first = schema
            .validate(&json!({"id": "psu1", "pin": "GPIO4", "enable_time": "1.5s"}), &AnyPins)
            .unwrap();
        let second = schema.validate(&first.to_raw(), &AnyPins).unwrap();
        assert_eq!(first, second);
    }
}
