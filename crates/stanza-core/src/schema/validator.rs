//! Per-key validators
//!
//! [`Validator`] is a closed set of coercions. Because every variant is plain
//! data, two schemas can be compared key by key when they are merged, and a
//! conflict is detected when the schema is built rather than when a document
//! happens to exercise it.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::pins::{PinCapability, PinTable};
use crate::types::{IdName, SemanticType};
use crate::value::{IdRef, IdRole, Value};

use super::ConfigSchema;
use super::duration::DurationRule;

/// Words that can never be used as identifiers in generated code.
const RESERVED_IDS: &[&str] = &[
    "App", "auto", "bool", "break", "case", "char", "class", "const", "continue", "default",
    "delete", "do", "double", "else", "enum", "extern", "false", "float", "for", "goto", "if",
    "int", "long", "namespace", "new", "nullptr", "private", "protected", "public", "return",
    "short", "signed", "sizeof", "static", "struct", "switch", "template", "this", "true",
    "typedef", "union", "unsigned", "using", "virtual", "void", "volatile", "while",
];

/// Signature of a component-provided validator
pub type CustomFn = fn(&JsonValue, &mut ValidationContext<'_>) -> Option<Value>;

/// Validator implemented outside the core.
///
/// Compared by name: two custom validators with the same name are assumed to
/// be the same coercion.
#[derive(Clone, Copy)]
pub struct CustomValidator {
    pub name: &'static str,
    pub validate: CustomFn,
}

impl PartialEq for CustomValidator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomValidator").field(&self.name).finish()
    }
}

/// Coercion applied to one configuration key
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Boolean,
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    String,
    /// Case-insensitive choice, normalized to the listed spelling
    OneOf(Vec<String>),
    Duration(DurationRule),
    /// Introduces a new identifier of the given type
    DeclareId(SemanticType),
    /// Refers to an identifier declared elsewhere, of the given type or a subtype
    UseId(SemanticType),
    /// Physical pin number checked against the pin table
    GpioPin(PinCapability),
    Nested(Box<ConfigSchema>),
    /// One value or a list of values
    List(Box<Validator>),
    Custom(CustomValidator),
}

impl Validator {
    pub fn int_range(min: i64, max: i64) -> Self {
        Validator::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn one_of<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Validator::OneOf(options.into_iter().map(Into::into).collect())
    }

    /// Coerce `raw`. Errors are recorded in `cx` at its current path.
    pub fn validate(&self, raw: &JsonValue, cx: &mut ValidationContext<'_>) -> Option<Value> {
        let result = match self {
            Validator::Boolean => coerce_bool(raw).map(Value::Bool),
            Validator::Integer { min, max } => coerce_int(raw, *min, *max).map(Value::Int),
            Validator::Float { min, max } => coerce_float(raw, *min, *max).map(Value::Float),
            Validator::String => coerce_string(raw).map(Value::String),
            Validator::OneOf(options) => coerce_one_of(raw, options).map(Value::String),
            Validator::Duration(rule) => rule.coerce(raw).map(Value::Duration),
            Validator::DeclareId(ty) => coerce_id(raw, ty, IdRole::Declare).map(Value::Id),
            Validator::UseId(ty) => coerce_id(raw, ty, IdRole::Use).map(Value::Id),
            Validator::GpioPin(capability) => {
                coerce_pin(raw, *capability, cx.pins).map(|n| Value::Int(n as i64))
            }
            Validator::Nested(schema) => return schema.validate_nested(raw, cx).map(Value::Map),
            Validator::List(item) => return validate_list(item, raw, cx),
            Validator::Custom(custom) => return (custom.validate)(raw, cx),
        };
        match result {
            Ok(value) => Some(value),
            Err(message) => {
                cx.error(message);
                None
            }
        }
    }
}

/// Validation state threaded through nested schemas.
pub struct ValidationContext<'a> {
    pins: &'a dyn PinTable,
    path: Vec<String>,
    errors: Vec<Error>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(pins: &'a dyn PinTable) -> Self {
        Self {
            pins,
            path: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn pins(&self) -> &'a dyn PinTable {
        self.pins
    }

    /// Dotted path of the value currently being validated.
    pub fn path(&self) -> String {
        self.path_with(None)
    }

    pub(crate) fn path_with(&self, key: Option<&str>) -> String {
        let mut out = String::new();
        for segment in self.path.iter().map(String::as_str).chain(key) {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }

    /// Run `f` with `segment` pushed onto the path.
    pub fn nested<T>(&mut self, segment: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(segment.into());
        let result = f(self);
        self.path.pop();
        result
    }

    /// Record an invalid-value error at the current path.
    pub fn error(&mut self, message: impl Into<String>) {
        let path = self.path();
        self.errors.push(Error::invalid(path, message));
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub(crate) fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

fn validate_list(item: &Validator, raw: &JsonValue, cx: &mut ValidationContext<'_>) -> Option<Value> {
    let items: Vec<&JsonValue> = match raw {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Null => Vec::new(),
        single => vec![single],
    };
    let before = cx.error_count();
    let mut out = Vec::with_capacity(items.len());
    for (idx, raw_item) in items.into_iter().enumerate() {
        if let Some(value) = cx.nested(format!("[{idx}]"), |cx| item.validate(raw_item, cx)) {
            out.push(value);
        }
    }
    (cx.error_count() == before).then_some(Value::List(out))
}

fn coerce_bool(raw: &JsonValue) -> Result<bool, String> {
    match raw {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" => Ok(true),
            "false" | "no" | "off" | "disable" => Ok(false),
            _ => Err(format!("expected a boolean, got '{s}'")),
        },
        other => Err(format!("expected a boolean, got {}", json_kind(other))),
    }
}

fn coerce_int(raw: &JsonValue, min: Option<i64>, max: Option<i64>) -> Result<i64, String> {
    let value = match raw {
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
            _ => return Err(format!("expected an integer, got {n}")),
        },
        JsonValue::String(s) => parse_int_str(s.trim())
            .ok_or_else(|| format!("expected an integer, got '{s}'"))?,
        other => return Err(format!("expected an integer, got {}", json_kind(other))),
    };
    check_range(value, min, max)?;
    Ok(value)
}

fn parse_int_str(s: &str) -> Option<i64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn coerce_float(raw: &JsonValue, min: Option<f64>, max: Option<f64>) -> Result<f64, String> {
    let value = match raw {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| format!("expected a number, got {n}"))?,
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("expected a number, got '{s}'"))?,
        other => return Err(format!("expected a number, got {}", json_kind(other))),
    };
    if !value.is_finite() {
        return Err("expected a finite number".to_string());
    }
    check_range(value, min, max)?;
    Ok(value)
}

fn check_range<T: PartialOrd + fmt::Display>(value: T, min: Option<T>, max: Option<T>) -> Result<(), String> {
    if let Some(min) = min
        && value < min
    {
        return Err(format!("value must be at least {min}"));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(format!("value must be at most {max}"));
    }
    Ok(())
}

fn coerce_string(raw: &JsonValue) -> Result<String, String> {
    match raw {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected a string, got {}", json_kind(other))),
    }
}

fn coerce_one_of(raw: &JsonValue, options: &[String]) -> Result<String, String> {
    let text = coerce_string(raw)?;
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(text.trim()))
        .cloned()
        .ok_or_else(|| format!("unknown value '{}', valid options are {}", text, options.join(", ")))
}

fn coerce_id(raw: &JsonValue, ty: &SemanticType, role: IdRole) -> Result<IdRef, String> {
    let JsonValue::String(name) = raw else {
        return Err(format!("expected an identifier, got {}", json_kind(raw)));
    };
    check_identifier(name)?;
    Ok(IdRef {
        name: IdName(name.clone()),
        ty: ty.clone(),
        role,
    })
}

/// Check that `name` is usable as an identifier in generated code.
pub fn check_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "'{name}' is not a valid identifier: use letters, digits and underscores, not starting with a digit"
        ));
    }
    if RESERVED_IDS.contains(&name) {
        return Err(format!("'{name}' is a reserved word and cannot be used as an identifier"));
    }
    Ok(())
}

fn coerce_pin(raw: &JsonValue, capability: PinCapability, pins: &dyn PinTable) -> Result<u32, String> {
    let number = match raw {
        JsonValue::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| format!("invalid pin number {n}"))?,
        JsonValue::String(s) => pins.lookup(s)?,
        other => return Err(format!("expected a pin, got {}", json_kind(other))),
    };
    pins.check(number, capability)?;
    Ok(number)
}

fn json_kind(raw: &JsonValue) -> &'static str {
    match raw {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}
