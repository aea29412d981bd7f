//! Per-command macro registries
//!
//! A registry records, for each command, the distinct tokens found in its
//! fields in first-seen order. Checksum and encoding input templates keep
//! their own token lists so they can be expanded independently of the
//! command's other fields.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static PERCENT_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{%.*?\}").expect("percent token pattern is valid"));
static DOLLAR_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\$.*?\}").expect("dollar token pattern is valid"));

/// Find macro tokens in a field, ordered by position
///
/// Both `{%...}` and `{$...}` end at the first closing brace. Each grammar
/// is matched on its own, so a `{$...}` nested inside a `{%...}` match is
/// still found.
pub fn scan(field: &str) -> impl Iterator<Item = &str> {
    let mut found: Vec<_> = PERCENT_TOKEN_RE
        .find_iter(field)
        .chain(DOLLAR_TOKEN_RE.find_iter(field))
        .collect();
    found.sort_by_key(|m| m.start());
    found.into_iter().map(|m| m.as_str())
}

/// Identifies the command a token list belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKey {
    /// A user-defined command
    Named(String),
    /// The reserved command for session-log templates
    SessionLog,
}

impl CommandKey {
    /// Key for a user-defined command
    pub fn named(name: impl Into<String>) -> Self {
        CommandKey::Named(name.into())
    }
}

impl From<&str> for CommandKey {
    fn from(name: &str) -> Self {
        CommandKey::Named(name.to_string())
    }
}

impl From<String> for CommandKey {
    fn from(name: String) -> Self {
        CommandKey::Named(name)
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKey::Named(name) => write!(f, "{}", name),
            CommandKey::SessionLog => write!(f, "<session log>"),
        }
    }
}

/// Which composite input template a token list is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// Input of `{%MD5SUM}`
    Checksum,
    /// Input of `{%BASE64ENC}`
    Encoding,
}

impl TemplateKind {
    /// The token that expands this template
    pub fn trigger(&self) -> &'static str {
        match self {
            TemplateKind::Checksum => crate::token::CHECKSUM_TOKEN,
            TemplateKind::Encoding => crate::token::ENCODING_TOKEN,
        }
    }
}

/// A checksum or encoding input and the tokens it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTemplate {
    text: String,
    tokens: IndexSet<String>,
}

impl InputTemplate {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tokens: scan(text).map(str::to_string).collect(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &IndexSet<String> {
        &self.tokens
    }
}

/// Tokens and templates registered for one command
#[derive(Debug, Clone, Default)]
pub struct CommandMacros {
    tokens: IndexSet<String>,
    checksum: Option<InputTemplate>,
    encoding: Option<InputTemplate>,
}

impl CommandMacros {
    /// Distinct tokens from the command's fields, in first-seen order
    pub fn tokens(&self) -> &IndexSet<String> {
        &self.tokens
    }

    /// The command's checksum or encoding template
    pub fn template(&self, kind: TemplateKind) -> Option<&InputTemplate> {
        match kind {
            TemplateKind::Checksum => self.checksum.as_ref(),
            TemplateKind::Encoding => self.encoding.as_ref(),
        }
    }

    fn all_tokens(&self) -> impl Iterator<Item = &str> {
        let checksum = self.checksum.iter().flat_map(|t| t.tokens.iter());
        let encoding = self.encoding.iter().flat_map(|t| t.tokens.iter());
        self.tokens
            .iter()
            .chain(checksum)
            .chain(encoding)
            .map(String::as_str)
    }
}

/// Macro registries for every command
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    commands: IndexMap<CommandKey, CommandMacros>,
}

impl MacroRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field's tokens to a command's list
    ///
    /// Returns how many tokens were new. The command exists afterwards even
    /// when the field has no tokens.
    pub fn register_field(&mut self, command: CommandKey, field: &str) -> usize {
        let entry = self.commands.entry(command).or_default();
        let before = entry.tokens.len();
        entry.tokens.extend(scan(field).map(str::to_string));
        entry.tokens.len() - before
    }

    /// Set a command's checksum or encoding template
    ///
    /// Empty templates are ignored. A non-empty template replaces any
    /// previous one along with its token list. Returns whether it was stored.
    pub fn register_template(
        &mut self,
        command: CommandKey,
        kind: TemplateKind,
        template: &str,
    ) -> bool {
        if template.is_empty() {
            return false;
        }

        let entry = self.commands.entry(command).or_default();
        let slot = match kind {
            TemplateKind::Checksum => &mut entry.checksum,
            TemplateKind::Encoding => &mut entry.encoding,
        };
        *slot = Some(InputTemplate::new(template));
        true
    }

    /// Look up a command
    pub fn command(&self, command: &CommandKey) -> Option<&CommandMacros> {
        self.commands.get(command)
    }

    /// Look up a command's checksum or encoding template
    pub fn template(&self, command: &CommandKey, kind: TemplateKind) -> Option<&InputTemplate> {
        self.commands.get(command)?.template(kind)
    }

    /// All commands in registration order
    pub fn commands(&self) -> impl Iterator<Item = (&CommandKey, &CommandMacros)> {
        self.commands.iter()
    }

    /// Every token of every command and template, duplicates included
    pub fn all_tokens(&self) -> impl Iterator<Item = &str> {
        self.commands.values().flat_map(CommandMacros::all_tokens)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of<'a>(registry: &'a MacroRegistry, command: &str) -> Vec<&'a str> {
        registry
            .command(&CommandKey::from(command))
            .unwrap()
            .tokens()
            .iter()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn test_scan_finds_both_grammars_in_order() {
        let found: Vec<_> = scan("a{%KEY}b{$HOME}c{%VAL}{%KEY}").collect();
        assert_eq!(found, vec!["{%KEY}", "{$HOME}", "{%VAL}", "{%KEY}"]);
    }

    #[test]
    fn test_scan_is_non_greedy() {
        let found: Vec<_> = scan("{%A}}{%B[0:2]}").collect();
        assert_eq!(found, vec!["{%A}", "{%B[0:2]}"]);
        assert_eq!(scan("{% no close").count(), 0);
        assert_eq!(scan("{%A\nB}").count(), 0);
    }

    #[test]
    fn test_scan_finds_env_token_inside_percent_match() {
        let found: Vec<_> = scan("{%A{$B}").collect();
        assert_eq!(found, vec!["{%A{$B}", "{$B}"]);

        let found: Vec<_> = scan("x{$E}{%P{$Q}y{%R}").collect();
        assert_eq!(found, vec!["{$E}", "{%P{$Q}", "{$Q}", "{%R}"]);

        let mut registry = MacroRegistry::new();
        assert_eq!(registry.register_field("req".into(), "{%A{$B}"), 2);
    }

    #[test]
    fn test_register_field_dedups_in_first_seen_order() {
        let mut registry = MacroRegistry::new();
        let added = registry.register_field("req".into(), "/x?a={%VAL}&b={%KEY}&c={%VAL}");
        assert_eq!(added, 2);
        let added = registry.register_field("req".into(), "{$TOKEN} {%KEY} {%UNIXTIME}");
        assert_eq!(added, 2);

        assert_eq!(
            tokens_of(&registry, "req"),
            vec!["{%VAL}", "{%KEY}", "{$TOKEN}", "{%UNIXTIME}"]
        );
    }

    #[test]
    fn test_register_field_without_tokens_creates_command() {
        let mut registry = MacroRegistry::new();
        assert_eq!(registry.register_field("plain".into(), "no macros here"), 0);
        assert!(registry.command(&"plain".into()).is_some());
        assert!(tokens_of(&registry, "plain").is_empty());
    }

    #[test]
    fn test_session_log_is_separate_from_named_commands() {
        let mut registry = MacroRegistry::new();
        registry.register_field(CommandKey::SessionLog, "{%TIME} {%KEY}");
        registry.register_field("SessionLog".into(), "{%VAL}");

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.command(&CommandKey::SessionLog).unwrap().tokens().len(),
            2
        );
        assert_eq!(tokens_of(&registry, "SessionLog"), vec!["{%VAL}"]);
    }

    #[test]
    fn test_templates_have_their_own_tokens() {
        let mut registry = MacroRegistry::new();
        registry.register_field("login".into(), "{%MD5SUM}");
        assert!(registry.register_template("login".into(), TemplateKind::Checksum, "{%KEY}-secret"));
        assert!(!registry.register_template("login".into(), TemplateKind::Encoding, ""));

        let template = registry
            .template(&"login".into(), TemplateKind::Checksum)
            .unwrap();
        assert_eq!(template.text(), "{%KEY}-secret");
        assert_eq!(template.tokens().len(), 1);
        assert!(registry.template(&"login".into(), TemplateKind::Encoding).is_none());
        assert_eq!(tokens_of(&registry, "login"), vec!["{%MD5SUM}"]);

        // A new template replaces the old one and its tokens
        registry.register_template("login".into(), TemplateKind::Checksum, "{%VAL}");
        let template = registry
            .template(&"login".into(), TemplateKind::Checksum)
            .unwrap();
        assert_eq!(template.tokens().iter().collect::<Vec<_>>(), vec!["{%VAL}"]);
    }

    #[test]
    fn test_all_tokens_covers_templates() {
        let mut registry = MacroRegistry::new();
        registry.register_field("a".into(), "{%KEY}");
        registry.register_template("a".into(), TemplateKind::Encoding, "{%UNIXTIME}:{%KEY}");
        registry.register_field(CommandKey::SessionLog, "{%TIME}");

        let all: Vec<_> = registry.all_tokens().collect();
        assert_eq!(all, vec!["{%KEY}", "{%UNIXTIME}", "{%KEY}", "{%TIME}"]);
    }

    #[test]
    fn test_command_key_display() {
        assert_eq!(CommandKey::named("login").to_string(), "login");
        assert_eq!(CommandKey::SessionLog.to_string(), "<session log>");
    }
}
