//! Validated configuration values
//!
//! A [`ConfigMap`] is what the schema validator produces from one raw
//! configuration unit. Every field carries an explicit semantic tag so that
//! generation rules never inspect raw document types.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{Error, Result};
use crate::types::{IdName, SemanticType};

/// Whether an identifier field introduces a new name or refers to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdRole {
    Declare,
    Use,
}

/// An identifier written in the configuration, tagged with the type the
/// schema requires of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdRef {
    pub name: IdName,
    pub ty: SemanticType,
    pub role: IdRole,
}

/// One validated field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Duration(Duration),
    Id(IdRef),
    Map(ConfigMap),
    List(Vec<Value>),
}

impl Value {
    /// Short tag name used in error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Duration(_) => "duration",
            Value::Id(_) => "identifier",
            Value::Map(_) => "mapping",
            Value::List(_) => "list",
        }
    }

    /// Serialize back into the raw document form the validator accepts.
    pub fn to_raw(&self) -> JsonValue {
        match self {
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::from(*f),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Duration(d) => JsonValue::String(format_duration(*d)),
            Value::Id(id) => JsonValue::String(id.name.0.clone()),
            Value::Map(map) => map.to_raw(),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_raw).collect()),
        }
    }

    /// Collect every identifier this value declares, in field order.
    pub fn declared_ids(&self, out: &mut Vec<IdRef>) {
        match self {
            Value::Id(id) if id.role == IdRole::Declare => out.push(id.clone()),
            Value::Map(map) => map.declared_ids_into(out),
            Value::List(items) => items.iter().for_each(|v| v.declared_ids(out)),
            _ => {}
        }
    }
}

/// Validated mapping from key to value. Key order follows the schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigMap {
    fields: IndexMap<String, Value>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        self.typed(key, |v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        })
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>> {
        self.typed(key, |v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
    }

    /// Float field; integers are widened.
    pub fn float(&self, key: &str) -> Result<Option<f64>> {
        self.typed(key, |v| match v {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        })
    }

    pub fn string(&self, key: &str) -> Result<Option<&str>> {
        self.typed(key, |v| match v {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn duration(&self, key: &str) -> Result<Option<Duration>> {
        self.typed(key, |v| match v {
            Value::Duration(d) => Some(*d),
            _ => None,
        })
    }

    pub fn id(&self, key: &str) -> Result<Option<&IdRef>> {
        self.typed(key, |v| match v {
            Value::Id(id) => Some(id),
            _ => None,
        })
    }

    pub fn map(&self, key: &str) -> Result<Option<&ConfigMap>> {
        self.typed(key, |v| match v {
            Value::Map(m) => Some(m),
            _ => None,
        })
    }

    /// Identifier declared by `key`; the key must be present.
    pub fn declared_id(&self, key: &str) -> Result<&IdRef> {
        match self.id(key)? {
            Some(id) if id.role == IdRole::Declare => Ok(id),
            Some(_) => Err(Error::invalid(key, "expected an identifier declaration")),
            None => Err(Error::MissingRequiredField {
                path: key.to_string(),
            }),
        }
    }

    /// Every identifier declared anywhere in this mapping.
    pub fn declared_ids(&self) -> Vec<IdRef> {
        let mut out = Vec::new();
        self.declared_ids_into(&mut out);
        out
    }

    fn declared_ids_into(&self, out: &mut Vec<IdRef>) {
        for value in self.fields.values() {
            value.declared_ids(out);
        }
    }

    /// Serialize back into a raw mapping.
    ///
    /// Validating the result against the same schema yields a value equal to
    /// `self`: defaults are already materialized and every tag has a raw form
    /// its validator accepts.
    pub fn to_raw(&self) -> JsonValue {
        let mut out = JsonMap::new();
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.to_raw());
        }
        JsonValue::Object(out)
    }

    fn typed<'a, T>(&'a self, key: &str, project: impl Fn(&'a Value) -> Option<T>) -> Result<Option<T>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(value) => project(value).map(Some).ok_or_else(|| {
                Error::invalid(key, format!("unexpected {} value", value.tag()))
            }),
        }
    }
}

/// Render a duration with the coarsest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let micros = d.as_micros();
    if micros == 0 {
        return "0ms".to_string();
    }
    if micros % 1000 != 0 {
        return format!("{micros}us");
    }
    let millis = micros / 1000;
    if millis % 1000 != 0 {
        return format!("{millis}ms");
    }
    let secs = millis / 1000;
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}min", secs / 60)
    } else {
        format!("{secs}s")
    }
}
