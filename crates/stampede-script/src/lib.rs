//! Stampede Script - RON definitions for macro engines
//!
//! Loads the macro side of command definitions from RON files:
//! - Input delimiter and column headers
//! - Session-log template
//! - Per-command fields, checksum inputs and encoding inputs
//!
//! and builds a [`stampede_core::MacroEngine`] from them.

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::Loader;
pub use schema::{CommandDef, EngineDef};
