//! JSON decoding with error positions
//!
//! The document text is decoded into a `serde_json::Value`. Decode errors keep
//! their position so they can be reported at the right place, and a second
//! pass over the raw text finds duplicate object keys, which `serde_json`
//! silently collapses.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use thiserror::Error;

/// A document text that does not decode as JSON
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DecodeError {
    /// Error message without the position suffix
    pub message: String,
    /// Line of the error (0-indexed)
    pub line: u32,
    /// Column of the error (0-indexed)
    pub column: u32,
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        // serde_json uses 1-indexed positions, LSP uses 0-indexed
        let line = u32::try_from(err.line()).unwrap_or(u32::MAX).saturating_sub(1);
        let column = u32::try_from(err.column())
            .unwrap_or(u32::MAX)
            .saturating_sub(1);

        Self {
            message: clean_error_message(&err.to_string()),
            line,
            column,
        }
    }
}

/// Decode document text.
///
/// An empty text is an empty document rather than an error.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    if text.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_str(text)?)
}

/// Serialize a document the way the editor writes it back
pub fn encode(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Find JSON pointers of object members whose key repeats an earlier
/// sibling.
///
/// Returns an empty list when the text does not decode.
pub fn duplicate_keys(text: &str) -> Vec<String> {
    let mut duplicates = Vec::new();
    let mut deserializer = serde_json::Deserializer::from_str(text);

    let scan = KeyScan {
        pointer: String::new(),
        duplicates: &mut duplicates,
    };
    if scan.deserialize(&mut deserializer).is_err() || deserializer.end().is_err() {
        return Vec::new();
    }

    duplicates
}

/// Escape a key for use as a JSON pointer segment
pub fn escape_pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Walks a document and records repeated keys without building a value
struct KeyScan<'a> {
    pointer: String,
    duplicates: &'a mut Vec<String>,
}

impl<'de, 'a> DeserializeSeed<'de> for KeyScan<'a> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'a> Visitor<'de> for KeyScan<'a> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E>(self, _: bool) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_i64<E>(self, _: i64) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_u64<E>(self, _: u64) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_f64<E>(self, _: f64) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_str<E>(self, _: &str) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_unit<E>(self) -> Result<(), E>
    where
        E: de::Error,
    {
        Ok(())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let KeyScan {
            pointer,
            duplicates,
        } = self;

        let mut index = 0usize;
        while seq
            .next_element_seed(KeyScan {
                pointer: format!("{pointer}/{index}"),
                duplicates: &mut *duplicates,
            })?
            .is_some()
        {
            index += 1;
        }
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let KeyScan {
            pointer,
            duplicates,
        } = self;

        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            let member = format!("{pointer}/{}", escape_pointer_segment(&key));
            if !seen.insert(key) {
                duplicates.push(member.clone());
            }
            map.next_value_seed(KeyScan {
                pointer: member,
                duplicates: &mut *duplicates,
            })?;
        }
        Ok(())
    }
}

/// Clean up the error message by removing position information
///
/// Since we provide position via the diagnostic range, we can simplify
/// the message by removing the "at line X column Y" suffix.
fn clean_error_message(message: &str) -> String {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        static ref POSITION_SUFFIX_RE: Regex = Regex::new(r"\s+at line \d+ column \d+$").unwrap();
    }

    POSITION_SUFFIX_RE.replace(message, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_json() {
        let value = decode(r#"{"title": "Lamp", "properties": {}}"#).unwrap();
        assert_eq!(value, json!({"title": "Lamp", "properties": {}}));
    }

    #[test]
    fn test_decode_empty_text() {
        assert_eq!(decode("").unwrap(), json!({}));
    }

    #[test]
    fn test_decode_keeps_key_order() {
        let value = decode(r#"{"b": 1, "a": 2}"#).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_decode_error_position() {
        let err = decode("{\n  \"title\": \"Lamp\",\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(!err.message.contains("at line"));
    }

    #[test]
    fn test_decode_unclosed_string() {
        let err = decode(r#"{"title": "Lamp"#).unwrap_err();
        assert_eq!(err.line, 0);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_encode_is_pretty() {
        let text = encode(&json!({"title": "Lamp", "forms": []})).unwrap();
        assert_eq!(text, "{\n  \"title\": \"Lamp\",\n  \"forms\": []\n}");
    }

    #[test]
    fn test_duplicate_keys() {
        let text = r#"{"title": "a", "properties": {"on": {}, "on": {}}, "title": "b"}"#;
        assert_eq!(duplicate_keys(text), ["/properties/on", "/title"]);
    }

    #[test]
    fn test_duplicate_keys_in_arrays() {
        let text = r#"{"links": [{"href": "a"}, {"href": "b", "href": "c"}]}"#;
        assert_eq!(duplicate_keys(text), ["/links/1/href"]);
    }

    #[test]
    fn test_duplicate_keys_none() {
        assert!(duplicate_keys(r#"{"a": {"a": 1}, "b": [1, null, true, 2.5, "x"]}"#).is_empty());
        assert!(duplicate_keys("{ not json").is_empty());
    }

    #[test]
    fn test_escape_pointer_segment() {
        assert_eq!(escape_pointer_segment("a/b~c"), "a~1b~0c");
    }

    #[test]
    fn test_clean_error_message() {
        assert_eq!(
            clean_error_message("trailing comma at line 3 column 1"),
            "trailing comma"
        );
        assert_eq!(
            clean_error_message("some error without position"),
            "some error without position"
        );
    }
}
