//! Stampede Core - Macro expansion for templated fields
//!
//! This crate expands macro tokens embedded in request fields, body
//! fragments, log lines and input templates:
//! - `{%KEY}`, `{%VAL}`, `{%CSV[n]}` and `{%<header>}` read the input row
//! - `{%UNIXTIME...}` and `{%TIME...}` compute times relative to a reference
//! - `{%MD5SUM}` and `{%BASE64ENC}` digest or encode a per-command template
//! - `{$NAME}` reads the process environment
//! - any other `{%name}` reads the session variables
//! - a trailing `[a:b]` slices the resolved value
//!
//! ## Two Phases
//!
//! Registrations go into a [`MacroEngineBuilder`]. Building it compiles time
//! macros and classifies every token; the resulting [`MacroEngine`] is
//! immutable and can be shared between threads without locking.
//!
//! ```
//! use chrono::DateTime;
//! use stampede_core::{CommandKey, MacroEngine, RenderContext, SessionVars};
//!
//! let mut builder = MacroEngine::builder();
//! builder.register_field("lookup", "/items/{%KEY}?q={%VAL}");
//! let engine = builder.build().unwrap();
//!
//! let vars = SessionVars::new();
//! let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+00:00").unwrap();
//! let ctx = RenderContext::new("42,shoes", &vars, now);
//! let url = engine
//!     .render(&CommandKey::named("lookup"), &ctx, "/items/{%KEY}?q={%VAL}")
//!     .unwrap();
//! assert_eq!(url, "/items/42?q=shoes");
//! ```

pub mod columns;
mod engine;
mod error;
pub mod registry;
mod render;
pub mod time;
pub mod token;

pub use columns::ColumnIndex;
pub use engine::{MacroEngine, MacroEngineBuilder, RenderContext, SessionVars, DEFAULT_DELIMITER};
pub use error::{Error, Result};
pub use registry::{scan, CommandKey, CommandMacros, InputTemplate, MacroRegistry, TemplateKind};
pub use time::{
    parse_time_modifier, CalendarMacro, EpochFormat, EpochMacro, ReferenceTime, TimeMacros,
};
pub use token::{classify, MacroKind};
