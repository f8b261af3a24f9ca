//! # Stanza Configuration Compiler
//!
//! Translates a declarative configuration document (one section per
//! component kind) into ordered setup statements for a native firmware
//! build, plus the set of build flags the enabled components need.
//!
//! ## Architecture
//!
//! ```text
//! schema      - key constraints, coercion, composition by extension
//!     ↓
//! registry    - declared identifiers and their types (one per run)
//!     ↓
//! expr        - expressions, suspendable builds, expression tasks
//!     ↓
//! driver      - component catalog, per-instance lifecycle
//!     ↓
//! sequencer   - fixed-point emission order, stall diagnosis
//!     ↓
//! pipeline    - Compiler facade: document in, Program or Diagnostics out
//! ```
//!
//! Components are not part of this crate. They register themselves into the
//! [`driver::COMPONENTS`] distributed slice; see `stanza-components`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stanza_core::Compiler;
//! use serde_json::json;
//!
//! let compiler = Compiler::linked()?;
//! let program = compiler
//!     .compile(&json!({"power_supply": [{"id": "psu1", "pin": 12}]}))?
//!     .into_result()?;
//! println!("{}", program.render());
//! ```

pub use linkme;

pub mod driver;
pub mod error;
pub mod expr;
pub mod options;
pub mod pins;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod sequencer;
pub mod types;
pub mod value;

pub use driver::{COMPONENTS, Catalog, ComponentDescriptor, Driver, Lifecycle};
pub use error::{Diagnostics, Error, ErrorKind, Result};
pub use expr::{Build, Expression, Scope, Statement, StatementFragment, VarRef};
pub use options::{CompileOptions, UnknownComponents};
pub use pins::{AnyPins, PinCapability, PinTable};
pub use pipeline::{Compilation, Compiler, Program};
pub use registry::SymbolRegistry;
pub use schema::{ConfigSchema, Validator};
pub use types::{BuildFlag, IdName, Identifier, InstanceLabel, InstanceState, SemanticType};
pub use value::{ConfigMap, IdRef, IdRole, Value};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
