//! Power supply switched by an output pin
//!
//! Any number of supplies may be configured. Each is turned on through its
//! pin before a consumer needs it and kept on for `keep_on_time` after the
//! last consumer is done.

use linkme::distributed_slice;
use stanza_core::schema::{CONF_ID, ConfigSchema, DurationRule, Validator};
use stanza_core::{
    Build, COMPONENTS, ComponentDescriptor, ConfigMap, Error, Expression, Lifecycle, Result, SemanticType,
    VarRef,
};

use crate::gpio;

pub const CONF_PIN: &str = "pin";
pub const CONF_ENABLE_TIME: &str = "enable_time";
pub const CONF_KEEP_ON_TIME: &str = "keep_on_time";

pub fn power_supply_type() -> SemanticType {
    SemanticType::new("PowerSupplyComponent").extends(SemanticType::component())
}

fn schema() -> Result<ConfigSchema> {
    ConfigSchema::builder()
        .required(CONF_ID, Validator::DeclareId(power_supply_type()))
        .required(CONF_PIN, gpio::output_pin_schema())
        .optional(CONF_ENABLE_TIME, Validator::Duration(DurationRule::milliseconds().positive()))
        .optional(CONF_KEEP_ON_TIME, Validator::Duration(DurationRule::milliseconds().positive()))
        .multi_conf()
        .build()
}

fn to_code(config: &ConfigMap) -> Result<Build<VarRef>> {
    let id = config.declared_id(CONF_ID)?.clone();
    let pin = config.map(CONF_PIN)?.ok_or_else(|| Error::MissingRequiredField {
        path: CONF_PIN.to_string(),
    })?;
    let enable_time = config.duration(CONF_ENABLE_TIME)?;
    let keep_on_time = config.duration(CONF_KEEP_ON_TIME)?;

    Ok(gpio::output_pin_expression(pin)?.then(move |pin, scope| {
        let psu = scope.declare(&id, Expression::app().dot("make_power_supply").call([pin]))?;
        if let Some(enable_time) = enable_time {
            scope.add(psu.arrow("set_enable_time").call([Expression::millis(enable_time)]));
        }
        if let Some(keep_on_time) = keep_on_time {
            scope.add(psu.arrow("set_keep_on_time").call([Expression::millis(keep_on_time)]));
        }
        Ok(Build::ready(psu))
    }))
}

#[distributed_slice(COMPONENTS)]
static POWER_SUPPLY: ComponentDescriptor = ComponentDescriptor {
    kind: "power_supply",
    doc: "Power supply switched by a GPIO output pin",
    schema,
    generate: to_code,
    build_flags: &["-DUSE_OUTPUT"],
    lifecycle: Lifecycle::Component,
};
