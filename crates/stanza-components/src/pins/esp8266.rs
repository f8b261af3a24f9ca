use stanza_core::{PinCapability, PinTable};

use super::is_flash_pin;

/// NodeMCU silkscreen names
const NODEMCU_ALIASES: &[(&str, u32)] = &[
    ("D0", 16),
    ("D1", 5),
    ("D2", 4),
    ("D3", 0),
    ("D4", 2),
    ("D5", 14),
    ("D6", 12),
    ("D7", 13),
    ("D8", 15),
    ("RX", 3),
    ("TX", 1),
    ("A0", 17),
];

/// Analog input, exposed as pin 17
const ANALOG_PIN: u32 = 17;

/// ESP8266 on a NodeMCU board
#[derive(Debug, Clone, Copy, Default)]
pub struct Esp8266Pins;

impl PinTable for Esp8266Pins {
    fn platform(&self) -> &str {
        "ESP8266"
    }

    fn alias(&self, name: &str) -> Option<u32> {
        NODEMCU_ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, number)| *number)
    }

    fn check(&self, number: u32, capability: PinCapability) -> Result<(), String> {
        if number > ANALOG_PIN {
            return Err(format!("ESP8266: GPIO{number} does not exist"));
        }
        if is_flash_pin(number) {
            return Err(format!(
                "ESP8266: GPIO{number} is connected to the internal flash and cannot be used"
            ));
        }
        if number == ANALOG_PIN && capability == PinCapability::Output {
            return Err("ESP8266: A0 can only be used as an analog input".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodemcu_aliases() {
        assert_eq!(Esp8266Pins.lookup("D1"), Ok(5));
        assert_eq!(Esp8266Pins.lookup("d8"), Ok(15));
        assert_eq!(Esp8266Pins.lookup("A0"), Ok(17));
        assert!(Esp8266Pins.lookup("D9").is_err());
    }

    #[test]
    fn test_analog_pin_is_input_only() {
        assert!(Esp8266Pins.check(17, PinCapability::Input).is_ok());
        assert!(Esp8266Pins.check(17, PinCapability::Output).is_err());
        assert!(Esp8266Pins.check(18, PinCapability::Input).is_err());
        assert!(Esp8266Pins.check(9, PinCapability::Output).is_err());
    }
}
