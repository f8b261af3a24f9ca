//! Physical pin tables
//!
//! Each table implements [`PinTable`](stanza_core::PinTable) for one
//! platform: board aliases, existing GPIO numbers, and which of them may
//! drive an output.

mod esp32;
mod esp8266;

pub use esp32::Esp32Pins;
pub use esp8266::Esp8266Pins;

/// GPIO6 to GPIO11 drive the SPI flash on both ESP chips.
fn is_flash_pin(number: u32) -> bool {
    (6..=11).contains(&number)
}
