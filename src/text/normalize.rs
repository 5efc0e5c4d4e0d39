//! String normalization, type sniffing and tokenizing

/// Content-sniffed data type of a string value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Integer,
    BigInteger,
    Double,
    String,
    Binary,
}

impl DataType {
    /// True for types whose full-string form is normalized before indexing
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::String | DataType::Binary)
    }
}

/// Longest digit run still treated as a plain integer
const MAX_INTEGER_DIGITS: usize = 10;

/// Lowercase, keep ASCII letters and digits, collapse everything else into
/// single spaces, and trim.
///
/// `normalize(normalize(s)) == normalize(s)` for every input.
pub fn normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
        } else if ch.is_ascii_uppercase() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Index and domain key form: printable non-whitespace ASCII, lowercased
pub fn build_index_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_ascii_graphic())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Sniff the data type of a string value.
///
/// Checked in order: boolean literal, binary (any non-printable byte),
/// integer, big integer, double, string.
pub fn determine_data_type(value: &str) -> DataType {
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return DataType::Boolean;
    }
    if value.bytes().any(|b| !(b == b' ' || b.is_ascii_graphic())) {
        return DataType::Binary;
    }

    let mut digits = 0;
    let mut dots = 0;
    for b in value.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return DataType::String,
        }
    }
    match (digits, dots) {
        (0, _) => DataType::String,
        (_, 0) if value.len() <= MAX_INTEGER_DIGITS => DataType::Integer,
        (_, 0) => DataType::BigInteger,
        (_, 1) => DataType::Double,
        _ => DataType::String,
    }
}

/// Right-pad with '0' up to `min_length` characters
pub fn pad(value: &str, min_length: usize) -> String {
    let mut out = value.to_string();
    let len = out.chars().count();
    if len < min_length {
        out.extend(std::iter::repeat('0').take(min_length - len));
    }
    out
}

/// Cut to at most `max_length` characters
pub fn truncate(value: &str, max_length: usize) -> &str {
    match value.char_indices().nth(max_length) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// True if the text has an ASCII letter and a vowel
pub fn has_vowel_and_alpha(value: &str) -> bool {
    let mut alpha = false;
    let mut vowel = false;
    for ch in value.chars() {
        if ch.is_ascii_alphabetic() {
            alpha = true;
            if matches!(ch.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y') {
                vowel = true;
            }
        }
        if alpha && vowel {
            return true;
        }
    }
    false
}

/// Split on any delimiter character, dropping pieces shorter than
/// `min_length` characters
pub fn split_tokens<'a>(value: &'a str, delimiters: &str, min_length: usize) -> Vec<&'a str> {
    value
        .split(|ch: char| delimiters.contains(ch))
        .filter(|piece| !piece.is_empty() && piece.chars().count() >= min_length)
        .collect()
}
