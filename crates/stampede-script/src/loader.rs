//! RON definition loader

use crate::error::{Error, Result};
use crate::schema::{CommandDef, EngineDef};
use stampede_core::MacroEngine;
use std::fs;
use std::path::Path;

/// Loader for RON engine definitions
///
/// Several sources may be loaded. Commands accumulate; delimiter, column
/// headers and session-log template from later sources replace earlier ones.
pub struct Loader {
    defs: EngineDef,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            defs: EngineDef::default(),
        }
    }

    /// Load a single RON file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading engine definitions");
        self.load_str(&content)
    }

    /// Load definitions from a RON string
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let file: EngineDef = ron::from_str(content)?;
        self.merge(file)
    }

    /// Load all RON files from a directory, in file name order
    pub fn load_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not a directory: {:?}", path),
            )));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().map(|e| e == "ron").unwrap_or(false) {
                files.push(file_path);
            }
        }
        files.sort();

        for file_path in files {
            self.load_file(&file_path)?;
        }
        Ok(())
    }

    /// Add a command definition directly
    pub fn add_command(&mut self, command: CommandDef) -> Result<()> {
        if command.name.is_empty() {
            return Err(Error::InvalidSchema("command name must not be empty".to_string()));
        }
        if self.defs.commands.iter().any(|c| c.name == command.name) {
            return Err(Error::DuplicateDefinition(command.name));
        }
        self.defs.commands.push(command);
        Ok(())
    }

    fn merge(&mut self, file: EngineDef) -> Result<()> {
        if file.delimiter.is_some() {
            self.defs.delimiter = file.delimiter;
        }
        if file.column_headers.is_some() {
            self.defs.column_headers = file.column_headers;
        }
        if file.session_log.is_some() {
            self.defs.session_log = file.session_log;
        }
        for command in file.commands {
            self.add_command(command)?;
        }
        Ok(())
    }

    /// Get the current definitions (for inspection during loading)
    pub fn defs(&self) -> &EngineDef {
        &self.defs
    }

    /// Finish loading and return the definitions
    pub fn finish(self) -> EngineDef {
        self.defs
    }

    /// Finish loading and build the macro engine
    ///
    /// Column headers are indexed with the final delimiter, so a delimiter
    /// from a later file also applies to headers from an earlier one.
    pub fn build(self) -> Result<MacroEngine> {
        let defs = self.defs;
        let mut builder = MacroEngine::builder();

        let delimiter = defs
            .delimiter
            .as_deref()
            .unwrap_or(stampede_core::DEFAULT_DELIMITER);
        builder.delimiter(delimiter);
        if let Some(headers) = &defs.column_headers {
            builder.set_column_headers(headers, delimiter);
        }
        if let Some(template) = &defs.session_log {
            builder.register_session_log(template);
        }
        for command in &defs.commands {
            for field in &command.fields {
                builder.register_field(command.name.as_str(), field);
            }
            if let Some(input) = &command.md5_input {
                builder.register_checksum_input(command.name.as_str(), input);
            }
            if let Some(input) = &command.base64_input {
                builder.register_encoding_input(command.name.as_str(), input);
            }
        }

        let engine = builder.build()?;
        tracing::debug!(commands = defs.commands.len(), "built engine from definitions");
        Ok(engine)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
