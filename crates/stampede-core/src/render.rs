//! Field rendering
//!
//! A field is rendered by walking its command's token list once, in
//! registration order, and replacing every literal occurrence of each token
//! with the token's value. Replaced text is never scanned again for the same
//! token, so a value that itself looks like a macro cannot expand forever.

use crate::engine::{MacroEngine, RenderContext};
use crate::registry::CommandKey;
use crate::Result;
use indexmap::IndexSet;

/// How resolved values are inserted into a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Substitution {
    /// Insert values verbatim
    Literal,
    /// Escape regex metacharacters in values
    Pattern,
}

impl MacroEngine {
    /// Render a field with a command's macros
    ///
    /// A command with no registrations leaves the field unchanged.
    pub fn render(
        &self,
        command: &CommandKey,
        ctx: &RenderContext<'_>,
        field: &str,
    ) -> Result<String> {
        self.render_with(command, ctx, field, Substitution::Literal)
    }

    /// Render a field that is itself a regular expression
    ///
    /// Values are regex-escaped so they match literally.
    pub fn render_pattern(
        &self,
        command: &CommandKey,
        ctx: &RenderContext<'_>,
        field: &str,
    ) -> Result<String> {
        self.render_with(command, ctx, field, Substitution::Pattern)
    }

    /// Render a line with the session-log template's macros
    pub fn render_session_log(&self, ctx: &RenderContext<'_>, template: &str) -> Result<String> {
        self.render(&CommandKey::SessionLog, ctx, template)
    }

    fn render_with(
        &self,
        command: &CommandKey,
        ctx: &RenderContext<'_>,
        field: &str,
        substitution: Substitution,
    ) -> Result<String> {
        match self.tokens(command) {
            Some(tokens) => self.substitute(command, tokens, ctx, field, substitution),
            None => Ok(field.to_string()),
        }
    }

    /// Replace each token of `tokens` in `text`, one pass per token
    pub(crate) fn substitute(
        &self,
        command: &CommandKey,
        tokens: &IndexSet<String>,
        ctx: &RenderContext<'_>,
        text: &str,
        substitution: Substitution,
    ) -> Result<String> {
        let mut rendered = text.to_string();
        for token in tokens {
            // Skip tokens of the command's other fields
            if !rendered.contains(token.as_str()) {
                continue;
            }
            let value = self.resolve(command, token, ctx)?;
            let value = match substitution {
                Substitution::Literal => value,
                Substitution::Pattern => regex::escape(&value),
            };
            rendered = rendered.replace(token.as_str(), &value);
        }
        Ok(rendered)
    }
}
