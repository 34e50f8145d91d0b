//! Format specifier suffixes (`{count,d}`, `{buf,[len]s8b}`)
//!
//! Specifiers are parsed and kept on the expression but evaluation ignores
//! them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatSpecifier {
    DecimalInt,
    OctalInt,
    HexInt,
    HexIntUpper,
    Character,
    String,
    StringNoQuotes,
    WideString,
    WideStringNoQuotes,
    Utf32String,
    Utf32StringNoQuotes,
    Enum,
    HeapVariable,
    NoAddress,
    NoDerived,
}

/// Every spelling of every specifier
const SPELLINGS: &[(&str, FormatSpecifier)] = &[
    ("d", FormatSpecifier::DecimalInt),
    ("o", FormatSpecifier::OctalInt),
    ("x", FormatSpecifier::HexInt),
    ("h", FormatSpecifier::HexInt),
    ("hr", FormatSpecifier::HexInt),
    ("wc", FormatSpecifier::HexInt),
    ("wm", FormatSpecifier::HexInt),
    ("X", FormatSpecifier::HexIntUpper),
    ("H", FormatSpecifier::HexIntUpper),
    ("c", FormatSpecifier::Character),
    ("s", FormatSpecifier::String),
    ("sa", FormatSpecifier::String),
    ("sb", FormatSpecifier::StringNoQuotes),
    ("s8b", FormatSpecifier::StringNoQuotes),
    ("su", FormatSpecifier::WideString),
    ("bstr", FormatSpecifier::WideString),
    ("sub", FormatSpecifier::WideStringNoQuotes),
    ("s32", FormatSpecifier::Utf32String),
    ("s32b", FormatSpecifier::Utf32StringNoQuotes),
    ("en", FormatSpecifier::Enum),
    ("hv", FormatSpecifier::HeapVariable),
    ("na", FormatSpecifier::NoAddress),
    ("nd", FormatSpecifier::NoDerived),
];

/// Text after the top-level comma of an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSpec {
    /// Raw `[...]` array-length expression
    pub array_length: Option<String>,
    pub specifiers: Vec<FormatSpecifier>,
}

impl FormatSpec {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (array_length, rest) = match text.strip_prefix('[') {
            Some(inner) => match inner.find(']') {
                Some(end) => (Some(inner[..end].trim().to_string()), &inner[end + 1..]),
                None => (Some(inner.trim().to_string()), ""),
            },
            None => (None, text),
        };

        Self {
            array_length,
            specifiers: parse_specifiers(rest.trim()),
        }
    }
}

/// Longest-match scan; unknown characters are skipped
fn parse_specifiers(text: &str) -> Vec<FormatSpecifier> {
    let mut specifiers = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let best = SPELLINGS
            .iter()
            .filter(|(spelling, _)| rest.starts_with(spelling))
            .max_by_key(|(spelling, _)| spelling.len());
        match best {
            Some((spelling, spec)) => {
                specifiers.push(*spec);
                rest = &rest[spelling.len()..];
            }
            None => {
                let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                rest = &rest[skip..];
            }
        }
    }
    specifiers
}
