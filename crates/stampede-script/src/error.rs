//! Error types for stampede-script

use thiserror::Error;

/// Definition loading error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid definition: {0}")]
    InvalidSchema(String),

    #[error("Duplicate command: {0}")]
    DuplicateDefinition(String),

    #[error("Engine error: {0}")]
    Engine(#[from] stampede_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
