//! End-to-end tests compiling documents against the linked components.

use serde_json::json;
use stanza_components::pins::{Esp32Pins, Esp8266Pins};
use stanza_core::{BuildFlag, Compiler, Error, ErrorKind, InstanceLabel, InstanceState, PinTable};

fn compiler(pins: impl PinTable + 'static) -> Compiler {
    Compiler::new(stanza_components::catalog().unwrap()).with_pins(pins)
}

#[test]
fn test_power_supply_on_native_pin() {
    let program = compiler(Esp8266Pins)
        .compile(&json!({
            "power_supply": {"id": "psu1", "pin": "D1", "setup_priority": 600},
        }))
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(
        program.render(),
        "// power_supply[0]\n\
         PowerSupplyComponent *psu1 = App.make_power_supply(GPIOOutputPin(5, OUTPUT, false));\n\
         psu1->set_setup_priority(600.0f);\n\
         App.register_component(psu1);\n"
    );
    assert_eq!(
        program.flags.into_iter().collect::<Vec<_>>(),
        vec![BuildFlag::from("-DUSE_OUTPUT")]
    );
}

/// The expander is declared before the supply that uses one of its pins,
/// even though it comes later in the document.
#[test]
fn test_power_supply_on_expander_pin() {
    let program = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": [{
                "id": "psu1",
                "pin": {"pcf8574": "hub", "number": 3},
                "enable_time": "20ms",
                "keep_on_time": "10s",
            }],
            "pcf8574": [{"id": "hub"}],
        }))
        .unwrap()
        .into_result()
        .unwrap();

    assert!(program.check_order().is_ok());
    assert_eq!(
        program.render(),
        "// pcf8574[0]\n\
         PCF8574Component *hub = App.make_pcf8574_component(0x21, false);\n\
         App.register_component(hub);\n\
         // power_supply[0]\n\
         PowerSupplyComponent *psu1 = App.make_power_supply(hub->make_output_pin(3, PCF8574_OUTPUT, false));\n\
         psu1->set_enable_time(20);\n\
         psu1->set_keep_on_time(10000);\n\
         App.register_component(psu1);\n"
    );
    let flags: Vec<_> = program.flags.iter().map(|f| f.0.as_str()).collect();
    assert_eq!(flags, vec!["-DUSE_OUTPUT", "-DUSE_PCF8574"]);
}

/// Several supplies share one expander; it is declared exactly once.
#[test]
fn test_shared_expander() {
    let program = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": [
                {"id": "psu1", "pin": {"pcf8574": "hub", "number": 0}},
                {"id": "psu2", "pin": {"pcf8574": "hub", "number": 1, "inverted": true}},
            ],
            "pcf8574": {"id": "hub", "address": 0x20, "pcf8575": true},
        }))
        .unwrap()
        .into_result()
        .unwrap();

    let text = program.render();
    assert_eq!(text.matches("App.make_pcf8574_component(0x20, true)").count(), 1);
    assert!(text.contains("hub->make_output_pin(1, PCF8574_OUTPUT, true)"));
    assert_eq!(program.symbols.len(), 3);
}

#[test]
fn test_expander_reference_must_be_an_expander() {
    let diagnostics = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": [
                {"id": "psu1", "pin": 23},
                {"id": "psu2", "pin": {"pcf8574": "psu1", "number": 0}},
            ],
        }))
        .unwrap_err();
    assert_eq!(diagnostics.of_kind(ErrorKind::TypeMismatch).count(), 1);
}

#[test]
fn test_missing_expander_is_unresolved() {
    let diagnostics = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": {"id": "psu1", "pin": {"pcf8574": "hub", "number": 0}},
        }))
        .unwrap_err();
    assert_eq!(
        diagnostics.errors,
        vec![Error::UnresolvedReference {
            names: vec!["hub".into()]
        }]
    );
}

#[test]
fn test_duplicate_supply_id() {
    let diagnostics = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": [{"id": "psu1", "pin": 22}, {"id": "psu1", "pin": 23}],
        }))
        .unwrap_err();
    assert_eq!(diagnostics.errors, vec![Error::DuplicateIdentifier("psu1".into())]);
}

/// An input-only pin invalidates that supply; its sibling still compiles.
#[test]
fn test_input_only_pin_isolated() {
    let compilation = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": [{"id": "psu1", "pin": 36}, {"id": "psu2", "pin": 23}],
        }))
        .unwrap();

    assert_eq!(compilation.program.fragments.len(), 1);
    assert_eq!(
        compilation.states[&InstanceLabel::indexed("power_supply", 0)],
        InstanceState::Invalid
    );
    assert_eq!(
        compilation.states[&InstanceLabel::indexed("power_supply", 1)],
        InstanceState::Done
    );

    let diagnostics = compilation.into_result().unwrap_err();
    assert_eq!(
        diagnostics.invalid_instances(),
        vec![&InstanceLabel::indexed("power_supply", 0)]
    );
}

#[test]
fn test_unknown_component_reported() {
    let compilation = compiler(Esp32Pins)
        .compile(&json!({
            "power_supply": {"id": "psu1", "pin": 23},
            "sensor": {"id": "t1"},
        }))
        .unwrap();
    assert_eq!(compilation.invalid, vec![Error::UnknownComponent("sensor".into())]);
    assert_eq!(compilation.program.fragments.len(), 1);
}
