//! Physical pin lookup collaborator.
//!
//! The validator does not know any board. It asks a [`PinTable`] to turn pin
//! names into numbers and to confirm that a number supports the requested
//! capability. Concrete tables live with the component crates.

/// What a pin is going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinCapability {
    Input,
    Output,
}

/// Board-specific pin knowledge
pub trait PinTable {
    /// Platform name used in error messages (e.g. `"ESP32"`)
    fn platform(&self) -> &str;

    /// Resolve a board alias (e.g. `"D1"`) to a GPIO number.
    fn alias(&self, name: &str) -> Option<u32>;

    /// Check that `number` exists and supports `capability`.
    fn check(&self, number: u32, capability: PinCapability) -> Result<(), String>;

    /// Resolve a pin name: aliases first, then `GPIOn`, then a bare number.
    fn lookup(&self, name: &str) -> Result<u32, String> {
        let name = name.trim();
        if let Some(number) = self.alias(&name.to_ascii_uppercase()) {
            return Ok(number);
        }
        let digits = name
            .strip_prefix("GPIO")
            .or_else(|| name.strip_prefix("gpio"))
            .unwrap_or(name);
        digits.parse::<u32>().map_err(|_| {
            format!(
                "invalid pin '{}' for platform {}: expected a number, GPIOn or a board alias",
                name,
                self.platform()
            )
        })
    }
}

/// Table that accepts every pin number below 256 and knows no aliases.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPins;

impl PinTable for AnyPins {
    fn platform(&self) -> &str {
        "generic"
    }

    fn alias(&self, _name: &str) -> Option<u32> {
        None
    }

    fn check(&self, number: u32, _capability: PinCapability) -> Result<(), String> {
        if number < 256 {
            Ok(())
        } else {
            Err(format!("pin {number} out of range"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_lookup() {
        assert_eq!(AnyPins.lookup("GPIO12"), Ok(12));
        assert_eq!(AnyPins.lookup(" 7 "), Ok(7));
        assert!(AnyPins.lookup("D1").is_err());
        assert!(AnyPins.check(300, PinCapability::Output).is_err());
    }
}
