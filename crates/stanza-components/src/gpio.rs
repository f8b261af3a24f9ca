//! GPIO output pins
//!
//! A pin is written as a number, a board name (`"D1"`, `"GPIO12"`), or a
//! mapping. A mapping with a `pcf8574` key addresses a pin on that expander
//! instead of a native pin:
//!
//! ```text
//! pin: 12
//! pin: {number: D1, inverted: true}
//! pin: {pcf8574: hub, number: 3}
//! ```
//!
//! Whatever the form, the validated value is a mapping with `number`, `mode`
//! and `inverted`, plus `pcf8574` for expander pins.

use serde_json::{Map as JsonMap, Value as JsonValue, json};
use stanza_core::schema::{ConfigSchema, CustomValidator, ValidationContext, Validator};
use stanza_core::{Build, ConfigMap, Error, Expression, PinCapability, Result, Value};

use crate::pcf8574::{CONF_PCF8574, PCF8574_OUTPUT, pcf8574_type};

pub const CONF_NUMBER: &str = "number";
pub const CONF_MODE: &str = "mode";
pub const CONF_INVERTED: &str = "inverted";

const NATIVE_OUTPUT_MODES: &[&str] = &["OUTPUT", "OUTPUT_OPEN_DRAIN"];

/// Validator for an output-capable pin
pub fn output_pin_schema() -> Validator {
    Validator::Custom(CustomValidator {
        name: "gpio_output_pin",
        validate: validate_output_pin,
    })
}

fn native_output_schema() -> Result<ConfigSchema> {
    ConfigSchema::builder()
        .required(CONF_NUMBER, Validator::GpioPin(PinCapability::Output))
        .optional_default(CONF_MODE, Validator::one_of(NATIVE_OUTPUT_MODES.iter().copied()), json!("OUTPUT"))
        .optional_default(CONF_INVERTED, Validator::Boolean, json!(false))
        .build()
}

fn expander_output_schema() -> Result<ConfigSchema> {
    ConfigSchema::builder()
        .required(CONF_PCF8574, Validator::UseId(pcf8574_type()))
        .required(CONF_NUMBER, Validator::int_range(0, 15))
        .optional_default(CONF_MODE, Validator::one_of(["OUTPUT"]), json!("OUTPUT"))
        .optional_default(CONF_INVERTED, Validator::Boolean, json!(false))
        .build()
}

fn validate_output_pin(raw: &JsonValue, cx: &mut ValidationContext<'_>) -> Option<Value> {
    let shorthand;
    let (schema, raw) = match raw {
        JsonValue::Object(map) if map.contains_key(CONF_PCF8574) => (expander_output_schema(), raw),
        JsonValue::Object(_) => (native_output_schema(), raw),
        JsonValue::Number(_) | JsonValue::String(_) => {
            let mut map = JsonMap::new();
            map.insert(CONF_NUMBER.to_string(), raw.clone());
            shorthand = JsonValue::Object(map);
            (native_output_schema(), &shorthand)
        }
        _ => {
            cx.error("expected a pin number, name or mapping");
            return None;
        }
    };

    match schema {
        Ok(schema) => schema.validate_nested(raw, cx).map(Value::Map),
        Err(error) => {
            cx.push(error);
            None
        }
    }
}

/// Expression for a validated output pin.
///
/// Native pins are ready at once; expander pins wait for the hub.
pub fn output_pin_expression(pin: &ConfigMap) -> Result<Build<Expression>> {
    let number = pin
        .int(CONF_NUMBER)?
        .ok_or_else(|| Error::MissingRequiredField {
            path: CONF_NUMBER.to_string(),
        })?;
    let inverted = pin.bool(CONF_INVERTED)?.unwrap_or(false);

    match pin.id(CONF_PCF8574)? {
        Some(hub) => Ok(Build::get_variable(hub.clone()).map(move |hub| {
            hub.arrow("make_output_pin")
                .call([Expression::Int(number), Expression::raw(PCF8574_OUTPUT), inverted.into()])
        })),
        None => {
            let mode = pin.string(CONF_MODE)?.unwrap_or("OUTPUT");
            Ok(Build::ready(Expression::raw("GPIOOutputPin").call([
                Expression::Int(number),
                Expression::raw(mode),
                inverted.into(),
            ])))
        }
    }
}
