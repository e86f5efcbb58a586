//! Raw page text to typed field values.
//!
//! Every function here is pure. A value that cannot be converted comes back
//! as `None`, which the extractor treats exactly like a missing node.

pub const NBSP: char = '\u{a0}';
pub const HRYVNIA: char = '₴';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind<'a> {
    Text,
    Currency,
    /// Integer carrying a unit or label such as `ГБ` or `Код:`.
    UnitInteger(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
}

impl Value {
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    pub fn into_integer(self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(n),
            Value::Text(_) => None,
        }
    }
}

pub fn normalize(raw: &str, kind: ValueKind<'_>) -> Option<Value> {
    match kind {
        ValueKind::Text => text(raw).map(Value::Text),
        ValueKind::Currency => currency(raw).map(Value::Integer),
        ValueKind::UnitInteger(unit) => unit_integer(raw, unit).map(Value::Integer),
    }
}

/// Drops non-breaking spaces and trims. Never fails.
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != NBSP)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Like `clean`, but also folds internal runs of whitespace into one space.
/// Rendered and static text differ mostly in line breaks.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == NBSP)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `clean`, with an empty result treated as absent.
pub fn text(raw: &str) -> Option<String> {
    let cleaned = clean(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

pub fn currency(raw: &str) -> Option<i64> {
    let digits: String = raw
        .chars()
        .filter(|c| *c != HRYVNIA && *c != NBSP && *c != ' ')
        .collect();
    digits.trim().parse().ok()
}

pub fn unit_integer(raw: &str, unit: &str) -> Option<i64> {
    let stripped = if unit.is_empty() {
        raw.to_string()
    } else {
        raw.replace(unit, "")
    };
    clean(&stripped).parse().ok()
}

/// Removes a label marker (e.g. `Продавець:`) and normalizes what is left.
pub fn strip_marker(raw: &str, marker: &str) -> Option<String> {
    if marker.is_empty() {
        return text(raw);
    }
    text(&raw.replace(marker, ""))
}
