use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_more::From;
use serde::{Deserialize, Serialize};

/// A self-describing value used both for evaluation context attributes and for flag results.
///
/// The JSON representation is untagged: the variant is picked from the wire shape alone. Numbers
/// that fit into `i64` decode as [`Value::Integer`], any other number decodes as
/// [`Value::Double`].
///
/// [`Value::Instant`] encodes as an RFC 3339 string. Strings are never decoded back into
/// instants, as a date-looking string may just as well be a plain string.
///
/// ```
/// # use ofrep::Value;
/// let value: Value = serde_json::from_str("[1, 2.5, \"three\", null]").unwrap();
/// assert_eq!(
///     value,
///     Value::List(vec![1.into(), 2.5.into(), "three".into(), Value::Null])
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum Value {
    /// A null value or absence of value.
    #[default]
    Null,
    /// A boolean value.
    Boolean(bool),
    /// An integer value.
    Integer(i64),
    /// A floating point value.
    Double(f64),
    /// A string value.
    String(String),
    /// A point in time. Only produced locally, see the type-level documentation.
    Instant(DateTime<Utc>),
    /// A list of values.
    List(Vec<Value>),
    /// A nested structure.
    Structure(HashMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Instant(_) => "instant",
            Value::List(_) => "list",
            Value::Structure(_) => "structure",
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Return the value as a boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the value as a string slice. Instants are not formatted.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as an integer. Doubles without a fractional part are accepted.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Double(d)
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d < i64::MAX as f64 =>
            {
                Some(*d as i64)
            }
            _ => None,
        }
    }

    /// Return the value as a double. Integers are converted.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Return the value as an instant. RFC 3339 strings are accepted.
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Instant(instant) => Some(*instant),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|it| it.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Return the items of a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Return the fields of a structure.
    pub fn as_structure(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Structure(structure) => Some(structure),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::Value;

    #[test]
    fn decodes_variant_from_wire_shape() {
        let value: Value = serde_json::from_str(
            r#"{"enabled": true, "count": 3, "ratio": 0.5, "name": "x", "none": null, "tags": ["a"]}"#,
        )
        .unwrap();

        let expected = Value::Structure(HashMap::from([
            ("enabled".to_owned(), Value::Boolean(true)),
            ("count".to_owned(), Value::Integer(3)),
            ("ratio".to_owned(), Value::Double(0.5)),
            ("name".to_owned(), Value::String("x".to_owned())),
            ("none".to_owned(), Value::Null),
            ("tags".to_owned(), Value::List(vec!["a".into()])),
        ]));
        assert_eq!(value, expected);
    }

    #[test]
    fn whole_doubles_stay_doubles() {
        let value: Value = serde_json::from_str("5.0").unwrap();
        assert_eq!(value, Value::Double(5.0));
        assert_eq!(value.as_integer(), Some(5));
    }

    #[test]
    fn date_looking_strings_stay_strings() {
        let value: Value = serde_json::from_str("\"2024-05-01T10:00:00Z\"").unwrap();
        assert_eq!(value, Value::String("2024-05-01T10:00:00Z".to_owned()));
        assert_eq!(
            value.as_instant(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn instants_encode_as_rfc3339() {
        let value = Value::Instant(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            "\"2024-05-01T10:00:00Z\""
        );
    }

    #[test]
    fn fractional_doubles_are_not_integers() {
        assert_eq!(Value::Double(1.5).as_integer(), None);
        assert_eq!(Value::Integer(2).as_double(), Some(2.0));
        assert_eq!(Value::String("1".to_owned()).as_double(), None);
    }
}
