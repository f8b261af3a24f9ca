//! Expression builder
//!
//! - [`ast`] - expressions, statements and fragments, with rendering
//! - [`build`] - [`Build`], the suspendable value generation rules return
//! - [`task`] - [`ExpressionTask`], the explicit suspend/resume record

pub mod ast;
pub mod build;
pub mod task;

pub use ast::{APP, Expression, Statement, StatementFragment, VarRef};
pub use build::{Build, FragmentBuilder, Resume, Scope};
pub use task::{Advance, ExpressionTask};
