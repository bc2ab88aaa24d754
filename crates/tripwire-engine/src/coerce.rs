//! Conversions from evaluated host expressions to engine values.
//!
//! Hosts hand over every expression result as a string. These helpers follow
//! the host's loose conventions: blank or non-numeric conditions count as
//! true, numbers are read from the leading integer, and value lists are
//! semicolon delimited.

use std::fmt;

/// A single configured or observed value.
///
/// Tokens that are fully numeric become numbers so that `"1"` and `"1.0"`
/// compare equal, everything else is kept as text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn parse(token: &str) -> Self {
        let trimmed = token.trim();
        if !trimmed.is_empty() {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return Value::Number(n);
                }
            }
        }
        Value::Text(token.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Parse the leading integer of `raw`, ignoring leading whitespace and
/// anything after the digits. Returns `None` when no digits lead.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Out of range still counts as a (very large) number
    let n = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -n } else { n })
}

/// Boolean reading of an expression result.
///
/// Missing, empty and non-numeric input is true; otherwise true iff the
/// leading integer is non-zero.
pub fn as_boolean(raw: Option<&str>) -> bool {
    match raw {
        None => true,
        Some(s) if s.is_empty() => true,
        Some(s) => parse_leading_int(s).map_or(true, |n| n != 0),
    }
}

/// Numeric reading of an expression result: the leading integer, else 0.
pub fn as_number(raw: Option<&str>) -> i64 {
    raw.and_then(parse_leading_int).unwrap_or(0)
}

/// Split a semicolon delimited list into values.
pub fn values_from_delimited(raw: Option<&str>) -> Vec<Value> {
    match raw {
        None => Vec::new(),
        Some(s) if s.is_empty() => Vec::new(),
        Some(s) => s.split(';').map(Value::parse).collect(),
    }
}
