//! Time macros
//!
//! Two kinds of time macro are recognized by their declaration prefix:
//! - `{%UNIXTIME<modifier>}` - epoch milliseconds, optionally hex-formatted
//!   with an embedded `%x` / `%<N>x` marker
//! - `{%TIME<modifier>}` - calendar time as `YYYY-MM-DD hh:mm:ss`
//!
//! Both are compiled once, when the engine is built, into an offset that is
//! applied to the reference time handed to each resolution.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// The instant every time macro is computed against
///
/// Its offset is the zone calendar macros are rendered in.
pub type ReferenceTime = DateTime<FixedOffset>;

/// Output pattern of calendar macros
pub const CALENDAR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const EPOCH_PREFIX: &str = "UNIXTIME";
const CALENDAR_PREFIX: &str = "TIME";

/// Digits of the zero-padded hex form that short widths are cut from
const FULL_HEX_DIGITS: usize = 12;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

static MODIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]\d+)(.*)$").expect("modifier pattern is valid"));
static HEX_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%(\d+)?x").expect("hex marker pattern is valid"));

/// Parse a signed time modifier such as `+4HOURS` or `-30DAYS`
///
/// An empty modifier is a zero offset. A month is exactly 30 days.
pub fn parse_time_modifier(modifier: &str) -> Result<TimeDelta> {
    if modifier.is_empty() {
        return Ok(TimeDelta::zero());
    }

    let unsupported = || Error::UnsupportedTimeModifier(modifier.to_string());
    let caps = MODIFIER_RE.captures(modifier).ok_or_else(unsupported)?;
    let amount: i64 = caps[1].parse().map_err(|_| unsupported())?;
    let unit_seconds = match &caps[2] {
        "MONTH" | "MONTHS" => 30 * SECONDS_PER_DAY,
        "DAY" | "DAYS" => SECONDS_PER_DAY,
        "HOUR" | "HOURS" => 60 * 60,
        "MINUTE" | "MINUTES" => 60,
        "SECOND" | "SECONDS" => 1,
        _ => return Err(unsupported()),
    };

    amount
        .checked_mul(unit_seconds)
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(unsupported)
}

/// How an epoch macro renders its millisecond value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochFormat {
    /// Plain decimal digits
    Decimal,
    /// Lowercase hex, optionally with a width from a `%<N>x` marker
    ///
    /// `zero_pad` is set when the width is written with a leading `0`.
    Hex { width: Option<usize>, zero_pad: bool },
}

impl EpochFormat {
    /// Render epoch milliseconds in this format
    ///
    /// Widths of 12 or more right-align the hex digits, padded with zeros
    /// for `%0<N>x` and with spaces otherwise. Shorter widths keep the
    /// *leading* `N` digits of the 12-digit zero-padded form.
    pub fn render(&self, millis: i64) -> String {
        match *self {
            EpochFormat::Decimal => millis.to_string(),
            EpochFormat::Hex { width: None, .. } => signed_hex(millis),
            EpochFormat::Hex {
                width: Some(width),
                zero_pad,
            } if width >= FULL_HEX_DIGITS => {
                if zero_pad {
                    zero_padded_hex(millis, width)
                } else {
                    format!("{:>width$}", signed_hex(millis))
                }
            }
            EpochFormat::Hex {
                width: Some(width), ..
            } => {
                let mut padded = zero_padded_hex(millis, FULL_HEX_DIGITS);
                padded.truncate(width);
                padded
            }
        }
    }
}

fn signed_hex(value: i64) -> String {
    if value < 0 {
        format!("-{:x}", value.unsigned_abs())
    } else {
        format!("{:x}", value)
    }
}

fn zero_padded_hex(value: i64, width: usize) -> String {
    if value < 0 {
        format!("-{:0w$x}", value.unsigned_abs(), w = width - 1)
    } else {
        format!("{:0w$x}", value, w = width)
    }
}

/// A compiled `{%UNIXTIME...}` macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochMacro {
    pub offset: TimeDelta,
    pub format: EpochFormat,
}

impl EpochMacro {
    /// Render against a reference time, `None` if the offset overflows
    pub fn render(&self, reference: &ReferenceTime) -> Option<String> {
        let instant = reference.checked_add_signed(self.offset)?;
        Some(self.format.render(instant.timestamp_millis()))
    }
}

/// A compiled `{%TIME...}` macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarMacro {
    pub offset: TimeDelta,
}

impl CalendarMacro {
    /// Render against a reference time, `None` if the offset overflows
    pub fn render(&self, reference: &ReferenceTime) -> Option<String> {
        let instant = reference.checked_add_signed(self.offset)?;
        Some(instant.format(CALENDAR_FORMAT).to_string())
    }
}

enum TimeMacro {
    Epoch(EpochMacro),
    Calendar(CalendarMacro),
}

/// Compiled time macros, keyed by full token text
///
/// The two mappings are disjoint: a `UNIXTIME` declaration never also starts
/// with `TIME`.
#[derive(Debug, Clone, Default)]
pub struct TimeMacros {
    epoch: HashMap<String, EpochMacro>,
    calendar: HashMap<String, CalendarMacro>,
}

impl TimeMacros {
    /// Compile every time macro among `tokens`
    ///
    /// Each token is compiled exactly as written, so a trailing `[a:b]` is
    /// part of the modifier and fails compilation. Non-time tokens are
    /// skipped.
    pub fn compile<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut compiled = Self::default();

        for token in tokens {
            if compiled.epoch.contains_key(token) || compiled.calendar.contains_key(token) {
                continue;
            }
            let Some(declaration) = token
                .strip_prefix("{%")
                .and_then(|rest| rest.strip_suffix('}'))
            else {
                continue;
            };

            match compile_declaration(declaration)? {
                Some(TimeMacro::Epoch(epoch)) => {
                    tracing::debug!(token, offset = %epoch.offset, format = ?epoch.format, "compiled epoch macro");
                    compiled.epoch.insert(token.to_string(), epoch);
                }
                Some(TimeMacro::Calendar(calendar)) => {
                    tracing::debug!(token, offset = %calendar.offset, "compiled calendar macro");
                    compiled.calendar.insert(token.to_string(), calendar);
                }
                None => {}
            }
        }

        Ok(compiled)
    }

    /// Look up a compiled epoch macro
    pub fn epoch(&self, token: &str) -> Option<&EpochMacro> {
        self.epoch.get(token)
    }

    /// Look up a compiled calendar macro
    pub fn calendar(&self, token: &str) -> Option<&CalendarMacro> {
        self.calendar.get(token)
    }

    /// Number of compiled macros of both kinds
    pub fn len(&self) -> usize {
        self.epoch.len() + self.calendar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compile_declaration(declaration: &str) -> Result<Option<TimeMacro>> {
    let malformed = |modifier: &str| Error::MalformedTimeMacro {
        declaration: declaration.to_string(),
        modifier: modifier.to_string(),
    };

    if let Some(suffix) = declaration.strip_prefix(EPOCH_PREFIX) {
        let (modifier, format) = match HEX_MARKER_RE.captures(suffix) {
            Some(caps) => {
                let (width, zero_pad) = match caps.get(1) {
                    Some(digits) => (
                        Some(
                            digits
                                .as_str()
                                .parse::<usize>()
                                .map_err(|_| malformed(suffix))?,
                        ),
                        digits.as_str().starts_with('0'),
                    ),
                    None => (None, false),
                };
                (
                    suffix.replace(&caps[0], ""),
                    EpochFormat::Hex { width, zero_pad },
                )
            }
            None => (suffix.to_string(), EpochFormat::Decimal),
        };
        let offset = parse_time_modifier(&modifier).map_err(|_| malformed(&modifier))?;
        return Ok(Some(TimeMacro::Epoch(EpochMacro { offset, format })));
    }

    if let Some(modifier) = declaration.strip_prefix(CALENDAR_PREFIX) {
        let offset = parse_time_modifier(modifier).map_err(|_| malformed(modifier))?;
        return Ok(Some(TimeMacro::Calendar(CalendarMacro { offset })));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceTime {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00+00:00").unwrap()
    }

    fn hex(width: Option<usize>, zero_pad: bool) -> EpochFormat {
        EpochFormat::Hex { width, zero_pad }
    }

    #[test]
    fn test_parse_time_modifier() {
        assert_eq!(parse_time_modifier("").unwrap(), TimeDelta::zero());
        assert_eq!(parse_time_modifier("+4HOURS").unwrap(), TimeDelta::hours(4));
        assert_eq!(parse_time_modifier("+1HOUR").unwrap(), TimeDelta::hours(1));
        assert_eq!(parse_time_modifier("-2DAYS").unwrap(), TimeDelta::hours(-48));
        assert_eq!(parse_time_modifier("+1MONTH").unwrap(), TimeDelta::hours(720));
        assert_eq!(parse_time_modifier("-3MONTHS").unwrap(), TimeDelta::days(-90));
        assert_eq!(parse_time_modifier("+15MINUTES").unwrap(), TimeDelta::minutes(15));
        assert_eq!(parse_time_modifier("-1SECOND").unwrap(), TimeDelta::seconds(-1));
    }

    #[test]
    fn test_parse_time_modifier_rejects_bad_shapes() {
        for bad in ["+4BANANAS", "4HOURS", "+HOURS", "+4hours", "x+4HOURS", "+4 HOURS"] {
            assert_eq!(
                parse_time_modifier(bad),
                Err(Error::UnsupportedTimeModifier(bad.to_string())),
                "{bad} should be rejected"
            );
        }
        assert!(parse_time_modifier("+99999999999999999999DAYS").is_err());
    }

    #[test]
    fn test_epoch_format_render() {
        let millis = 1_709_294_400_000;
        assert_eq!(EpochFormat::Decimal.render(millis), "1709294400000");
        assert_eq!(hex(None, false).render(millis), "18df9e2b200");
        // Short widths keep the most significant digits
        assert_eq!(hex(Some(8), false).render(millis), "018df9e2");
        assert_eq!(hex(Some(8), true).render(millis), "018df9e2");
        assert_eq!(hex(Some(12), false).render(millis), " 18df9e2b200");
        assert_eq!(hex(Some(14), false).render(millis), "   18df9e2b200");
    }

    #[test]
    fn test_epoch_format_zero_padded_width() {
        let millis = 1_709_294_400_000;
        assert_eq!(hex(Some(16), true).render(millis), "0000018df9e2b200");
        assert_eq!(hex(Some(12), true).render(millis), "018df9e2b200");
        assert_eq!(hex(Some(16), true).render(-255), "-0000000000000ff");

        let macros = TimeMacros::compile(["{%UNIXTIME%016x}", "{%UNIXTIME%16x}"]).unwrap();
        assert_eq!(macros.epoch("{%UNIXTIME%016x}").unwrap().format, hex(Some(16), true));
        assert_eq!(macros.epoch("{%UNIXTIME%16x}").unwrap().format, hex(Some(16), false));
        assert_eq!(
            macros.epoch("{%UNIXTIME%016x}").unwrap().render(&reference()).unwrap(),
            "0000018df9e2b200"
        );
        assert_eq!(
            macros.epoch("{%UNIXTIME%16x}").unwrap().render(&reference()).unwrap(),
            "     18df9e2b200"
        );
    }

    #[test]
    fn test_compile_time_macros() {
        let tokens = [
            "{%UNIXTIME}",
            "{%UNIXTIME+4HOURS}",
            "{%UNIXTIME%8x}",
            "{%UNIXTIME-1DAY%14x}",
            "{%TIME-30MINUTES}",
            "{%KEY}",
            "{$HOME}",
        ];
        let macros = TimeMacros::compile(tokens).unwrap();
        assert_eq!(macros.len(), 5);

        let epoch = macros.epoch("{%UNIXTIME+4HOURS}").unwrap();
        assert_eq!(epoch.offset, TimeDelta::hours(4));
        assert_eq!(epoch.format, EpochFormat::Decimal);

        let hex_macro = macros.epoch("{%UNIXTIME%8x}").unwrap();
        assert_eq!(hex_macro.offset, TimeDelta::zero());
        assert_eq!(hex_macro.format, hex(Some(8), false));

        let wide = macros.epoch("{%UNIXTIME-1DAY%14x}").unwrap();
        assert_eq!(wide.offset, TimeDelta::days(-1));
        assert_eq!(wide.format, hex(Some(14), false));

        let calendar = macros.calendar("{%TIME-30MINUTES}").unwrap();
        assert_eq!(calendar.offset, TimeDelta::minutes(-30));
        assert!(macros.epoch("{%TIME-30MINUTES}").is_none());
        assert!(macros.calendar("{%KEY}").is_none());
    }

    #[test]
    fn test_compile_rejects_sliced_time_macro() {
        let err = TimeMacros::compile(["{%UNIXTIME[0:6]}"]).unwrap_err();
        assert_eq!(
            err,
            Error::MalformedTimeMacro {
                declaration: "UNIXTIME[0:6]".to_string(),
                modifier: "[0:6]".to_string(),
            }
        );

        let err = TimeMacros::compile(["{%TIME}", "{%TIME[0:10]}"]).unwrap_err();
        assert!(matches!(err, Error::MalformedTimeMacro { modifier, .. } if modifier == "[0:10]"));
    }

    #[test]
    fn test_compile_rejects_malformed_modifier() {
        let err = TimeMacros::compile(["{%UNIXTIME+4BANANAS}"]).unwrap_err();
        assert_eq!(
            err,
            Error::MalformedTimeMacro {
                declaration: "UNIXTIME+4BANANAS".to_string(),
                modifier: "+4BANANAS".to_string(),
            }
        );

        let err = TimeMacros::compile(["{%TIMEOUT}"]).unwrap_err();
        assert!(matches!(err, Error::MalformedTimeMacro { modifier, .. } if modifier == "OUT"));
    }

    #[test]
    fn test_render_against_reference() {
        let epoch = EpochMacro {
            offset: TimeDelta::hours(4),
            format: EpochFormat::Decimal,
        };
        assert_eq!(epoch.render(&reference()).unwrap(), "1709308800000");

        let calendar = CalendarMacro {
            offset: TimeDelta::days(-1),
        };
        assert_eq!(calendar.render(&reference()).unwrap(), "2024-02-29 12:00:00");
    }

    #[test]
    fn test_calendar_uses_reference_offset() {
        let reference = DateTime::parse_from_rfc3339("2024-03-01T23:30:00+02:00").unwrap();
        let calendar = CalendarMacro {
            offset: TimeDelta::hours(1),
        };
        assert_eq!(calendar.render(&reference).unwrap(), "2024-03-02 00:30:00");
    }
}
