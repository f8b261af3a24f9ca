//! PCF8574 / PCF8575 I2C port expander
//!
//! The hub is declared once; every pin on it is an expression built from the
//! hub variable (`hub->make_output_pin(..)`), so components using expander
//! pins wait for the hub declaration.

use linkme::distributed_slice;
use serde_json::json;
use stanza_core::schema::{CONF_ID, ConfigSchema, Validator};
use stanza_core::{
    Build, COMPONENTS, ComponentDescriptor, ConfigMap, Expression, Lifecycle, Result, SemanticType, VarRef,
};

pub const CONF_PCF8574: &str = "pcf8574";
pub const CONF_ADDRESS: &str = "address";
pub const CONF_PCF8575: &str = "pcf8575";

const DEFAULT_ADDRESS: i64 = 0x21;

/// Pin mode constant the expander understands
pub const PCF8574_OUTPUT: &str = "PCF8574_OUTPUT";

pub fn pcf8574_type() -> SemanticType {
    SemanticType::new("PCF8574Component").extends(SemanticType::component())
}

fn schema() -> Result<ConfigSchema> {
    ConfigSchema::builder()
        .required(CONF_ID, Validator::DeclareId(pcf8574_type()))
        .optional_default(CONF_ADDRESS, Validator::int_range(0, 0x7f), json!(DEFAULT_ADDRESS))
        .optional_default(CONF_PCF8575, Validator::Boolean, json!(false))
        .multi_conf()
        .build()
}

fn to_code(config: &ConfigMap) -> Result<Build<VarRef>> {
    let id = config.declared_id(CONF_ID)?.clone();
    let address = config.int(CONF_ADDRESS)?.unwrap_or(DEFAULT_ADDRESS);
    let pcf8575 = config.bool(CONF_PCF8575)?.unwrap_or(false);

    Ok(Build::run(move |scope| {
        let rhs = Expression::app()
            .dot("make_pcf8574_component")
            .call([Expression::Hex(address as u64), pcf8575.into()]);
        let hub = scope.declare(&id, rhs)?;
        Ok(Build::ready(hub))
    }))
}

#[distributed_slice(COMPONENTS)]
static PCF8574: ComponentDescriptor = ComponentDescriptor {
    kind: "pcf8574",
    doc: "PCF8574/PCF8575 I2C port expander",
    schema,
    generate: to_code,
    build_flags: &["-DUSE_PCF8574"],
    lifecycle: Lifecycle::Component,
};

#[cfg(test)]
mod tests {
    use super::*;
    use stanza_core::Catalog;
    use stanza_core::pins::AnyPins;

    #[test]
    fn test_defaults() {
        let catalog = Catalog::linked().unwrap();
        let entry = catalog.get("pcf8574").unwrap();
        let config = entry.schema.validate(&json!({"id": "hub"}), &AnyPins).unwrap();
        assert_eq!(config.int(CONF_ADDRESS).unwrap(), Some(0x21));
        assert_eq!(config.bool(CONF_PCF8575).unwrap(), Some(false));
    }

    #[test]
    fn test_address_range() {
        let schema = schema().unwrap();
        assert!(schema.validate(&json!({"id": "hub", "address": "0x20"}), &AnyPins).is_ok());
        assert!(schema.validate(&json!({"id": "hub", "address": 0x80}), &AnyPins).is_err());
    }
}
