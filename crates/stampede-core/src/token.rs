//! Macro token classification
//!
//! Every token is sorted into one [`MacroKind`] before it is resolved, so
//! resolution is a single match instead of repeated prefix probing.

use crate::columns::ColumnIndex;
use crate::registry::TemplateKind;
use crate::time::{CalendarMacro, EpochMacro, TimeMacros};
use once_cell::sync::Lazy;
use regex::Regex;

pub const KEY_TOKEN: &str = "{%KEY}";
pub const VALUE_TOKEN: &str = "{%VAL}";
pub const CHECKSUM_TOKEN: &str = "{%MD5SUM}";
pub const ENCODING_TOKEN: &str = "{%BASE64ENC}";

static SLICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+):(\d+)\]\}$").expect("slice pattern is valid"));
static CSV_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{%CSV\[(\d+)\]\}$").expect("csv pattern is valid"));

/// A token with a trailing `[start:end]` annotation removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// The token with the annotation replaced by a plain `}`
    pub base: String,
    pub start: usize,
    pub end: usize,
}

/// Split a `{%NAME[a:b]}` token into its base form and bounds
pub fn split_slice(token: &str) -> Option<Slice> {
    let caps = SLICE_RE.captures(token)?;
    let whole = caps.get(0)?;
    let start = caps[1].parse().ok()?;
    let end = caps[2].parse().ok()?;

    Some(Slice {
        base: format!("{}}}", &token[..whole.start()]),
        start,
        end,
    })
}

/// What a macro token resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum MacroKind {
    /// Not a `{%...}` / `{$...}` token; always resolves to nothing
    Malformed,
    /// Byte range `[start, end)` of the base token's value
    Sliced {
        base: String,
        start: usize,
        end: usize,
        inner: Box<MacroKind>,
    },
    /// `{%UNIXTIME...}`
    EpochTime(EpochMacro),
    /// `{%TIME...}`
    CalendarTime(CalendarMacro),
    /// `{%KEY}`: first element of the input row
    Key,
    /// `{%VAL}`: second element of the input row
    Value,
    /// `{%MD5SUM}` over the command's checksum template
    Checksum,
    /// `{%BASE64ENC}` over the command's encoding template
    Encoding,
    /// `{$NAME}`: process environment variable
    Environment(String),
    /// `{%CSV[n]}`: explicit column of the input row
    CsvIndex(usize),
    /// `{%header}` found in the column index
    Column(usize),
    /// `{%name}` looked up in the session variables
    SessionVar(String),
}

impl MacroKind {
    /// The template a composite macro expands, looking through slices
    pub fn composite(&self) -> Option<TemplateKind> {
        match self {
            MacroKind::Checksum => Some(TemplateKind::Checksum),
            MacroKind::Encoding => Some(TemplateKind::Encoding),
            MacroKind::Sliced { inner, .. } => inner.composite(),
            _ => None,
        }
    }
}

/// Classify a token against compiled time macros and the column index
pub fn classify(token: &str, time_macros: &TimeMacros, columns: &ColumnIndex) -> MacroKind {
    if !(token.starts_with("{%") || token.starts_with("{$")) || !token.ends_with('}') {
        return MacroKind::Malformed;
    }

    if let Some(slice) = split_slice(token) {
        let inner = classify(&slice.base, time_macros, columns);
        return MacroKind::Sliced {
            base: slice.base,
            start: slice.start,
            end: slice.end,
            inner: Box::new(inner),
        };
    }

    if let Some(epoch) = time_macros.epoch(token) {
        return MacroKind::EpochTime(*epoch);
    }
    if let Some(calendar) = time_macros.calendar(token) {
        return MacroKind::CalendarTime(*calendar);
    }

    match token {
        KEY_TOKEN => return MacroKind::Key,
        VALUE_TOKEN => return MacroKind::Value,
        CHECKSUM_TOKEN => return MacroKind::Checksum,
        ENCODING_TOKEN => return MacroKind::Encoding,
        _ => {}
    }

    // "{$" and "}" are both one byte per char, so this slice is on boundaries
    let name = &token[2..token.len() - 1];
    if token.starts_with("{$") {
        return MacroKind::Environment(name.to_string());
    }

    if let Some(index) = CSV_RE
        .captures(token)
        .and_then(|caps| caps[1].parse::<usize>().ok())
    {
        return MacroKind::CsvIndex(index);
    }
    if let Some(index) = columns.lookup(token) {
        return MacroKind::Column(index);
    }

    MacroKind::SessionVar(name.to_string())
}
