//! Typed attribute values and cross-type coercion

use std::fmt;

/// Attribute kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Integer,
    Double,
    String,
}

impl ValueType {
    /// Tag byte used by the binary encoding
    pub fn tag(&self) -> u8 {
        match self {
            ValueType::Boolean => 1,
            ValueType::Integer => 2,
            ValueType::Double => 3,
            ValueType::String => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ValueType::Boolean),
            2 => Some(ValueType::Integer),
            3 => Some(ValueType::Double),
            4 => Some(ValueType::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::String => "string",
        }
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl AttributeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Boolean(_) => ValueType::Boolean,
            AttributeValue::Integer(_) => ValueType::Integer,
            AttributeValue::Double(_) => ValueType::Double,
            AttributeValue::String(_) => ValueType::String,
        }
    }

    /// Read as boolean.
    ///
    /// Strings are true for "true" (any case), "1", or any leading
    /// integer other than zero.
    pub fn as_bool(&self) -> bool {
        match self {
            AttributeValue::Boolean(b) => *b,
            AttributeValue::Integer(i) => *i != 0,
            AttributeValue::Double(d) => *d != 0.0,
            AttributeValue::String(s) => {
                s.eq_ignore_ascii_case("true") || s == "1" || parse_leading_int(s) != 0
            }
        }
    }

    /// Read as integer; doubles truncate toward zero, strings parse their
    /// leading integer or yield 0
    pub fn as_int(&self) -> i64 {
        match self {
            AttributeValue::Boolean(b) => i64::from(*b),
            AttributeValue::Integer(i) => *i,
            AttributeValue::Double(d) => *d as i64,
            AttributeValue::String(s) => parse_leading_int(s),
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            AttributeValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            AttributeValue::Integer(i) => *i as f64,
            AttributeValue::Double(d) => *d,
            AttributeValue::String(s) => parse_leading_double(s),
        }
    }

    /// Read as text. Doubles render with six decimals.
    pub fn as_string(&self) -> String {
        match self {
            AttributeValue::Boolean(b) => b.to_string(),
            AttributeValue::Integer(i) => i.to_string(),
            AttributeValue::Double(d) => format!("{:.6}", d),
            AttributeValue::String(s) => s.clone(),
        }
    }

    /// Bytes the value contributes to the encoded form
    pub fn encoded_len(&self) -> usize {
        match self {
            AttributeValue::Boolean(_) => 1,
            AttributeValue::Integer(_) | AttributeValue::Double(_) => 8,
            AttributeValue::String(s) => 4 + s.len(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

/// Leading-integer parse: optional whitespace, optional sign, digits.
/// Saturates instead of overflowing; no digits yields 0.
pub fn parse_leading_int(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for byte in digits.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        let digit = i64::from(byte - b'0');
        value = value.saturating_mul(10).saturating_add(digit);
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Leading-float parse over the longest numeric prefix; 0.0 if none
pub fn parse_leading_double(s: &str) -> f64 {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    while end < bytes.len() {
        let b = bytes[end];
        let sign_allowed = end == 0 || matches!(bytes[end - 1], b'e' | b'E');
        if b.is_ascii_digit() {
            seen_digit = true;
        } else if b == b'.' && !seen_dot && !seen_exp {
            seen_dot = true;
        } else if (b == b'e' || b == b'E') && seen_digit && !seen_exp {
            seen_exp = true;
        } else if !(matches!(b, b'-' | b'+') && sign_allowed) {
            break;
        }
        end += 1;
    }

    // Back off an exponent marker or sign with nothing after it
    while end > 0 {
        if trimmed[..end].parse::<f64>().is_ok() {
            break;
        }
        end -= 1;
    }
    trimmed[..end].parse::<f64>().unwrap_or(0.0)
}
