//! Macro engine: two-phase construction and token resolution
//!
//! [`MacroEngineBuilder`] collects registrations during initialization.
//! [`MacroEngineBuilder::build`] compiles time macros, classifies every
//! registered token and rejects self-referencing templates, producing an
//! immutable [`MacroEngine`] that can be shared across threads.

use crate::columns::ColumnIndex;
use crate::registry::{CommandKey, MacroRegistry, TemplateKind};
use crate::render::Substitution;
use crate::time::{ReferenceTime, TimeMacros};
use crate::token::{classify, MacroKind};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::{IndexMap, IndexSet};
use md5::{Digest, Md5};
use std::borrow::Cow;
use std::collections::HashMap;

/// Default separator of input rows and header lines
pub const DEFAULT_DELIMITER: &str = ",";

/// Session variables visible to `{%name}` macros
pub type SessionVars = IndexMap<String, String>;

/// Per-request inputs to resolution
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// One delimited input row
    pub input_row: &'a str,
    /// Variables captured for the current session
    pub session_vars: &'a SessionVars,
    /// Instant time macros are computed against
    pub reference_time: ReferenceTime,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context
    pub fn new(
        input_row: &'a str,
        session_vars: &'a SessionVars,
        reference_time: ReferenceTime,
    ) -> Self {
        Self {
            input_row,
            session_vars,
            reference_time,
        }
    }
}

/// Collects macro registrations before the engine is built
#[derive(Debug, Clone)]
pub struct MacroEngineBuilder {
    registry: MacroRegistry,
    header_line: Option<String>,
    delimiter: String,
}

impl Default for MacroEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroEngineBuilder {
    /// Create a builder with the default `,` delimiter
    pub fn new() -> Self {
        Self {
            registry: MacroRegistry::new(),
            header_line: None,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Set the input row delimiter
    pub fn delimiter(&mut self, delimiter: impl Into<String>) -> &mut Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Register the tokens of one of a command's fields
    pub fn register_field(&mut self, command: impl Into<CommandKey>, field: &str) -> &mut Self {
        let command = command.into();
        let added = self.registry.register_field(command.clone(), field);
        tracing::debug!(%command, added, "registered field macros");
        self
    }

    /// Register the tokens of the session-log template
    pub fn register_session_log(&mut self, template: &str) -> &mut Self {
        self.register_field(CommandKey::SessionLog, template)
    }

    /// Set the input of a command's `{%MD5SUM}` macro
    pub fn register_checksum_input(
        &mut self,
        command: impl Into<CommandKey>,
        template: &str,
    ) -> &mut Self {
        self.register_template(command.into(), TemplateKind::Checksum, template)
    }

    /// Set the input of a command's `{%BASE64ENC}` macro
    pub fn register_encoding_input(
        &mut self,
        command: impl Into<CommandKey>,
        template: &str,
    ) -> &mut Self {
        self.register_template(command.into(), TemplateKind::Encoding, template)
    }

    fn register_template(
        &mut self,
        command: CommandKey,
        kind: TemplateKind,
        template: &str,
    ) -> &mut Self {
        if self.registry.register_template(command.clone(), kind, template) {
            tracing::debug!(%command, ?kind, "registered input template");
        }
        self
    }

    /// Set the header line of the input stream
    ///
    /// The delimiter also becomes the row delimiter. Headers are split at
    /// build time, with whichever delimiter is set last.
    pub fn set_column_headers(
        &mut self,
        header_line: &str,
        delimiter: impl Into<String>,
    ) -> &mut Self {
        self.delimiter = delimiter.into();
        self.header_line = Some(header_line.to_string());
        self
    }

    /// Finish initialization
    ///
    /// Fails on an empty delimiter, a malformed time macro, or a checksum or
    /// encoding template that would expand itself.
    pub fn build(self) -> Result<MacroEngine> {
        if self.delimiter.is_empty() {
            return Err(Error::EmptyDelimiter);
        }

        let columns = match &self.header_line {
            Some(header_line) => {
                let columns = ColumnIndex::index(header_line, &self.delimiter);
                tracing::debug!(columns = columns.len(), "indexed input column headers");
                columns
            }
            None => ColumnIndex::new(),
        };

        let time_macros = TimeMacros::compile(self.registry.all_tokens())?;
        let kinds: HashMap<String, MacroKind> = self
            .registry
            .all_tokens()
            .map(|token| {
                (
                    token.to_string(),
                    classify(token, &time_macros, &columns),
                )
            })
            .collect();

        let engine = MacroEngine {
            registry: self.registry,
            columns,
            delimiter: self.delimiter,
            time_macros,
            kinds,
        };
        engine.check_templates()?;

        tracing::debug!(
            commands = engine.registry.len(),
            tokens = engine.kinds.len(),
            time_macros = engine.time_macros.len(),
            "built macro engine"
        );
        Ok(engine)
    }
}

/// Immutable macro engine
///
/// Built once by [`MacroEngineBuilder`]; resolution and rendering only read.
#[derive(Debug, Clone)]
pub struct MacroEngine {
    registry: MacroRegistry,
    columns: ColumnIndex,
    delimiter: String,
    time_macros: TimeMacros,
    kinds: HashMap<String, MacroKind>,
}

impl MacroEngine {
    /// Start building an engine
    pub fn builder() -> MacroEngineBuilder {
        MacroEngineBuilder::new()
    }

    /// The input row delimiter
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Whether a header line was indexed
    pub fn has_column_headers(&self) -> bool {
        self.columns.has_headers()
    }

    /// The registries the engine was built from
    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    /// Compiled time macros
    pub fn time_macros(&self) -> &TimeMacros {
        &self.time_macros
    }

    /// A command's field tokens in first-seen order
    pub fn tokens(&self, command: &CommandKey) -> Option<&IndexSet<String>> {
        self.registry.command(command).map(|c| c.tokens())
    }

    /// Classification of a token; unregistered tokens are classified on demand
    pub fn kind_of(&self, token: &str) -> Cow<'_, MacroKind> {
        match self.kinds.get(token) {
            Some(kind) => Cow::Borrowed(kind),
            None => Cow::Owned(classify(token, &self.time_macros, &self.columns)),
        }
    }

    /// Resolve one token for a command
    ///
    /// Unknown and malformed tokens resolve to an empty string. The only
    /// error is a slice that falls outside the resolved value.
    pub fn resolve(
        &self,
        command: &CommandKey,
        token: &str,
        ctx: &RenderContext<'_>,
    ) -> Result<String> {
        let kind = self.kind_of(token);
        self.resolve_kind(command, token, &kind, ctx)
    }

    fn resolve_kind(
        &self,
        command: &CommandKey,
        token: &str,
        kind: &MacroKind,
        ctx: &RenderContext<'_>,
    ) -> Result<String> {
        let value = match kind {
            MacroKind::Malformed => String::new(),
            MacroKind::Sliced {
                base,
                start,
                end,
                inner,
            } => {
                let resolved = self.resolve_kind(command, base, inner, ctx)?;
                return resolved
                    .get(*start..*end)
                    .map(str::to_string)
                    .ok_or_else(|| Error::SliceOutOfBounds {
                        token: token.to_string(),
                        start: *start,
                        end: *end,
                        len: resolved.len(),
                    });
            }
            MacroKind::EpochTime(epoch) => epoch
                .render(&ctx.reference_time)
                .unwrap_or_else(|| time_overflow(token)),
            MacroKind::CalendarTime(calendar) => calendar
                .render(&ctx.reference_time)
                .unwrap_or_else(|| time_overflow(token)),
            MacroKind::Key => self.column(ctx.input_row, 0),
            MacroKind::Value => self.column(ctx.input_row, 1),
            MacroKind::Checksum => {
                let input = self.expand_template(command, TemplateKind::Checksum, ctx)?;
                hex::encode_upper(Md5::digest(input.as_bytes()))
            }
            MacroKind::Encoding => {
                let input = self.expand_template(command, TemplateKind::Encoding, ctx)?;
                STANDARD.encode(input)
            }
            MacroKind::Environment(name) => std::env::var(name).unwrap_or_default(),
            MacroKind::CsvIndex(index) | MacroKind::Column(index) => {
                self.column(ctx.input_row, *index)
            }
            MacroKind::SessionVar(name) => {
                ctx.session_vars.get(name).cloned().unwrap_or_default()
            }
        };

        tracing::trace!(%command, token, value = %value, "resolved macro");
        Ok(value)
    }

    /// Element `index` of the input row, empty when the row is shorter
    fn column(&self, input_row: &str, index: usize) -> String {
        match input_row.split(self.delimiter.as_str()).nth(index) {
            Some(value) => value.to_string(),
            None => {
                tracing::debug!(index, "input row has no such column");
                String::new()
            }
        }
    }

    /// Substitute a command's checksum or encoding template
    fn expand_template(
        &self,
        command: &CommandKey,
        kind: TemplateKind,
        ctx: &RenderContext<'_>,
    ) -> Result<String> {
        match self.registry.template(command, kind) {
            Some(template) => self.substitute(
                command,
                template.tokens(),
                ctx,
                template.text(),
                Substitution::Literal,
            ),
            None => Ok(String::new()),
        }
    }

    /// Reject templates whose expansion re-enters a composite macro in progress
    fn check_templates(&self) -> Result<()> {
        for (command, macros) in self.registry.commands() {
            for kind in [TemplateKind::Checksum, TemplateKind::Encoding] {
                if macros.template(kind).is_some() {
                    self.check_template(command, kind, &mut Vec::new())?;
                }
            }
        }
        Ok(())
    }

    fn check_template(
        &self,
        command: &CommandKey,
        kind: TemplateKind,
        active: &mut Vec<TemplateKind>,
    ) -> Result<()> {
        if active.contains(&kind) {
            return Err(Error::RecursiveTemplate {
                command: command.to_string(),
                token: kind.trigger().to_string(),
            });
        }

        let Some(template) = self.registry.template(command, kind) else {
            return Ok(());
        };
        active.push(kind);
        for token in template.tokens() {
            if let Some(nested) = self.kind_of(token).composite() {
                self.check_template(command, nested, active)?;
            }
        }
        active.pop();
        Ok(())
    }
}

fn time_overflow(token: &str) -> String {
    tracing::warn!(token, "time macro offset overflows the reference time");
    String::new()
}
