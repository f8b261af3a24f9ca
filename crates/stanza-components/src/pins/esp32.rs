use stanza_core::{PinCapability, PinTable};

use super::is_flash_pin;

/// GPIO numbers the ESP32 does not have
const MISSING: &[u32] = &[20, 24, 28, 29, 30, 31];

/// ESP32 (generic dev board)
#[derive(Debug, Clone, Copy, Default)]
pub struct Esp32Pins;

impl PinTable for Esp32Pins {
    fn platform(&self) -> &str {
        "ESP32"
    }

    fn alias(&self, name: &str) -> Option<u32> {
        match name {
            "TX" => Some(1),
            "RX" => Some(3),
            _ => None,
        }
    }

    fn check(&self, number: u32, capability: PinCapability) -> Result<(), String> {
        if number > 39 || MISSING.contains(&number) {
            return Err(format!("ESP32: GPIO{number} does not exist"));
        }
        if is_flash_pin(number) {
            return Err(format!(
                "ESP32: GPIO{number} is connected to the internal flash and cannot be used"
            ));
        }
        if capability == PinCapability::Output && (34..=39).contains(&number) {
            return Err(format!(
                "ESP32: GPIO{number} (34-39) can only be used as an input pin"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_capability() {
        assert!(Esp32Pins.check(23, PinCapability::Output).is_ok());
        assert!(Esp32Pins.check(36, PinCapability::Input).is_ok());
        assert!(Esp32Pins.check(36, PinCapability::Output).is_err());
    }

    #[test]
    fn test_reserved_and_missing() {
        assert!(Esp32Pins.check(7, PinCapability::Input).unwrap_err().contains("flash"));
        assert!(Esp32Pins.check(24, PinCapability::Input).is_err());
        assert!(Esp32Pins.check(40, PinCapability::Input).is_err());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Esp32Pins.lookup("GPIO23"), Ok(23));
        assert_eq!(Esp32Pins.lookup("tx"), Ok(1));
    }
}
