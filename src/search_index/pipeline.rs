//! Value → index key preparation
//!
//! Indexing and querying both go through these functions so a stored key
//! and the key a query looks up are always built the same way.

use crate::container::AttributeValue;
use crate::registry::{EffectiveText, IndexType};
use crate::text::{
    determine_data_type, has_vowel_and_alpha, normalize, pad, split_tokens, truncate, DataType,
    Stemmer,
};

/// Attribute keys holding decimal-degree coordinates
pub const GEO_ATTRIBUTE_KEYS: [&str; 2] = ["latitude", "longitude"];

/// Scale applied to decimal degrees before range indexing
pub const GEO_SCALE: f64 = 10_000_000.0;

/// Whole-value key for a string-map definition.
///
/// Textual values are normalized, booleans lowercased, numbers kept as
/// written. Values shorter than the minimum are padded with '0', except
/// for wildcard definitions which skip them. The result is cut to the
/// maximum length. Returns `None` when nothing should be stored.
pub fn full_string_key(value: &str, index_type: IndexType, text: &EffectiveText<'_>) -> Option<String> {
    let prepared = match determine_data_type(value) {
        DataType::String | DataType::Binary => normalize(value),
        DataType::Boolean => value.to_ascii_lowercase(),
        _ => value.to_string(),
    };
    if prepared.is_empty() {
        return None;
    }

    let prepared = if prepared.chars().count() < text.min_length {
        if index_type == IndexType::Wildcard {
            return None;
        }
        pad(&prepared, text.min_length)
    } else {
        prepared
    };
    Some(truncate(&prepared, text.max_length).to_string())
}

/// Prefixes and suffixes of a wildcard whole-value key, at least
/// `min_length` long, excluding the key itself
pub fn affixes(key: &str, min_length: usize) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let len = chars.len();
    let min = min_length.max(1);
    let mut out = Vec::new();
    if len <= min {
        return out;
    }
    for n in min..len {
        out.push(chars[..n].iter().collect());
        out.push(chars[len - n..].iter().collect());
    }
    out
}

/// Delimited tokens for a string-map definition.
///
/// Text with no letter or no vowel yields nothing. Each delimited piece
/// is normalized and must still meet the minimum length. Exact tokens are
/// cut to the maximum length; wildcard tokens are checked against the
/// exclusion list before and after stemming and dropped when the stem is
/// longer than the maximum. User-key definitions never tokenize.
pub fn tokens(
    value: &str,
    index_type: IndexType,
    text: &EffectiveText<'_>,
    stemmer: &dyn Stemmer,
) -> Vec<String> {
    if index_type == IndexType::UserKey || index_type == IndexType::Range {
        return Vec::new();
    }
    if !has_vowel_and_alpha(value) {
        return Vec::new();
    }

    let mut out = Vec::new();
    for piece in split_tokens(value, text.delimiters, text.min_length) {
        let token = normalize(piece);
        if token.is_empty() || token.chars().count() < text.min_length {
            continue;
        }
        match index_type {
            IndexType::Wildcard => {
                if text.is_excluded(&token) {
                    continue;
                }
                let stem = stemmer.stem(&token);
                if stem.is_empty() || text.is_excluded(&stem) {
                    continue;
                }
                if stem.chars().count() > text.max_length {
                    continue;
                }
                out.push(stem);
            }
            _ => out.push(truncate(&token, text.max_length).to_string()),
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Every key a string value is stored under for one definition
pub fn string_keys(
    value: &str,
    index_type: IndexType,
    text: &EffectiveText<'_>,
    stemmer: &dyn Stemmer,
) -> Vec<String> {
    let mut keys = Vec::new();
    if text.full_string {
        if let Some(whole) = full_string_key(value, index_type, text) {
            if index_type == IndexType::Wildcard {
                keys.extend(affixes(&whole, text.min_length));
            }
            keys.push(whole);
        }
    }
    if text.tokenized {
        keys.extend(tokens(value, index_type, text, stemmer));
    }
    keys.sort();
    keys.dedup();
    keys
}

/// Integer stored in a range index for an attribute.
///
/// Latitude and longitude given as decimal degrees are scaled by 1e7 and
/// truncated; everything else uses the integer reading of the value. A
/// string that does not sniff as a number has no range value.
pub fn range_value(attribute_key: &str, value: &AttributeValue) -> Option<i64> {
    let is_geo = GEO_ATTRIBUTE_KEYS.contains(&attribute_key);
    match value {
        AttributeValue::Double(d) if is_geo => Some((d * GEO_SCALE) as i64),
        AttributeValue::String(s) => {
            let trimmed = s.trim();
            let unsigned = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('+'))
                .unwrap_or(trimmed);
            match determine_data_type(unsigned) {
                DataType::Double if is_geo => {
                    trimmed.parse::<f64>().ok().map(|d| (d * GEO_SCALE) as i64)
                }
                DataType::Integer | DataType::BigInteger | DataType::Double => {
                    Some(value.as_int())
                }
                _ => None,
            }
        }
        _ => Some(value.as_int()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{EnglishStemmer, IdentityStemmer};

    fn text<'a>(min: usize, max: usize, delimiters: &'a str) -> EffectiveText<'a> {
        EffectiveText {
            min_length: min,
            max_length: max,
            delimiters,
            excluded: None,
            full_string: true,
            tokenized: true,
        }
    }

    #[test]
    fn test_full_string_key_normalizes_pads_truncates() {
        let t = text(3, 18, " ");
        assert_eq!(
            full_string_key("Pain Management Specialist", IndexType::Exact, &t).as_deref(),
            Some("pain management sp")
        );
        assert_eq!(full_string_key("Al", IndexType::Exact, &t).as_deref(), Some("al0"));
        assert_eq!(full_string_key("Al", IndexType::Wildcard, &t), None);
        assert_eq!(full_string_key("!!!", IndexType::Exact, &t), None);
        assert_eq!(full_string_key("34.5", IndexType::Exact, &t).as_deref(), Some("34.5"));
        assert_eq!(full_string_key("TRUE", IndexType::Exact, &t).as_deref(), Some("true"));
    }

    #[test]
    fn test_affixes() {
        let mut got = affixes("abcd", 2);
        got.sort();
        assert_eq!(got, vec!["ab", "abc", "bcd", "cd"]);
        assert!(affixes("ab", 3).is_empty());
    }

    #[test]
    fn test_exact_tokens_respect_delimiters() {
        let t = text(3, 32, "|");
        let got = tokens(
            "Pain Management Specialist Doctor|Internal Medicine Doctor",
            IndexType::Exact,
            &t,
            &IdentityStemmer,
        );
        assert_eq!(
            got,
            vec!["internal medicine doctor", "pain management specialist docto"]
        );
    }

    #[test]
    fn test_wildcard_tokens_stem_and_exclude() {
        let mut t = text(3, 18, " ");
        let excluded = crate::registry::ExcludedWords::new(
            "x",
            ["the".to_string()].into_iter().collect(),
        );
        t.excluded = Some(&excluded);
        let got = tokens("The running doctors", IndexType::Wildcard, &t, &EnglishStemmer::new());
        assert_eq!(got, vec!["doctor", "run"]);
    }

    #[test]
    fn test_no_tokens_without_vowel_or_for_user_keys() {
        let t = text(3, 18, " ");
        assert!(tokens("12345 678", IndexType::Exact, &t, &IdentityStemmer).is_empty());
        assert!(tokens("plain words", IndexType::UserKey, &t, &IdentityStemmer).is_empty());
    }

    #[test]
    fn test_string_keys_respects_flags() {
        let mut t = text(3, 18, " ");
        t.tokenized = false;
        assert_eq!(
            string_keys("Hello World", IndexType::Exact, &t, &IdentityStemmer),
            vec!["hello world"]
        );
        t.tokenized = true;
        t.full_string = false;
        assert_eq!(
            string_keys("Hello World", IndexType::Exact, &t, &IdentityStemmer),
            vec!["hello", "world"]
        );
    }

    #[test]
    fn test_range_value_scales_coordinates() {
        let lat = range_value("latitude", &AttributeValue::Double(34.186193)).unwrap();
        assert!((lat - 341_861_930).abs() <= 1);
        let lon = range_value("longitude", &AttributeValue::from("-118.876516")).unwrap();
        assert!((lon + 1_188_765_160).abs() <= 1);
        assert_eq!(range_value("zip", &AttributeValue::Double(91301.9)), Some(91301));
        assert_eq!(range_value("latitude", &AttributeValue::Integer(5)), Some(5));
    }

    #[test]
    fn test_range_value_skips_non_numeric_strings() {
        assert_eq!(range_value("zip", &AttributeValue::from("91301")), Some(91301));
        assert_eq!(range_value("zip", &AttributeValue::from(" -42 ")), Some(-42));
        assert_eq!(range_value("price", &AttributeValue::from("12.75")), Some(12));
        assert_eq!(range_value("zip", &AttributeValue::from("n/a")), None);
        assert_eq!(range_value("zip", &AttributeValue::from("12 apples")), None);
        assert_eq!(range_value("zip", &AttributeValue::from("")), None);
        assert_eq!(range_value("latitude", &AttributeValue::from("north")), None);
    }
}
