//! # Stanza Components
//!
//! Component units for the stanza configuration compiler. Each module
//! registers one [`ComponentDescriptor`](stanza_core::ComponentDescriptor)
//! into the [`COMPONENTS`](stanza_core::COMPONENTS) slice at link time.
//!
//! | Kind | Instances | Build flag |
//! |------|-----------|------------|
//! | `power_supply` | any | `-DUSE_OUTPUT` |
//! | `pcf8574` | any | `-DUSE_PCF8574` |
//!
//! [`gpio`] holds the pin schema and pin expressions shared by components
//! that drive outputs; [`pins`] holds the per-platform pin tables.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stanza_components::pins::Esp8266Pins;
//! use stanza_core::Compiler;
//!
//! let compiler = Compiler::new(stanza_components::catalog()?).with_pins(Esp8266Pins);
//! ```

pub mod gpio;
pub mod pcf8574;
pub mod pins;
pub mod power_supply;

use stanza_core::{Catalog, Result};
use tracing::debug;

/// Catalog of every component in this crate (and any other linked one).
///
/// Calling it also keeps this crate's registrations linked.
pub fn catalog() -> Result<Catalog> {
    let catalog = Catalog::linked()?;
    debug!(kinds = ?catalog.kinds().collect::<Vec<_>>(), "component catalog linked");
    Ok(catalog)
}
