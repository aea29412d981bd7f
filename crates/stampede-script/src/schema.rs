//! Definition schema for RON files

use serde::{Deserialize, Serialize};

/// Engine-wide settings and the commands they apply to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineDef {
    /// Input row delimiter (defaults to `,`)
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Header line of the input stream
    #[serde(default)]
    pub column_headers: Option<String>,
    /// Template for session log lines
    #[serde(default)]
    pub session_log: Option<String>,
    /// Command definitions
    #[serde(default)]
    pub commands: Vec<CommandDef>,
}

/// Macro-bearing parts of one command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    /// Unique command name
    pub name: String,
    /// Fields scanned for macros, in order
    #[serde(default)]
    pub fields: Vec<String>,
    /// Input of `{%MD5SUM}`
    #[serde(default)]
    pub md5_input: Option<String>,
    /// Input of `{%BASE64ENC}`
    #[serde(default)]
    pub base64_input: Option<String>,
}

impl CommandDef {
    /// Create a command definition with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            md5_input: None,
            base64_input: None,
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }
}
