//! Error types for stampede-core

use thiserror::Error;

/// Core error type
///
/// Everything except `SliceOutOfBounds` is raised while the engine is being
/// built. Resolution itself degrades unknown tokens to empty strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("time modifier {0} is not supported")]
    UnsupportedTimeModifier(String),

    #[error("time macro {declaration}: time modifier {modifier} is not supported")]
    MalformedTimeMacro {
        declaration: String,
        modifier: String,
    },

    #[error("Recursive template in command {command}: {token} expands itself")]
    RecursiveTemplate { command: String, token: String },

    #[error("Input delimiter must not be empty")]
    EmptyDelimiter,

    #[error("Slice [{start}:{end}] out of bounds for {token} (resolved length {len})")]
    SliceOutOfBounds {
        token: String,
        start: usize,
        end: usize,
        len: usize,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
