//! Wire models of the OFREP bulk evaluation endpoint.
use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ErrorCode, Value};

/// Request body of the bulk evaluation endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct BulkEvaluationRequest {
    pub context: HashMap<String, Value>,
}

/// Response body of the bulk evaluation endpoint.
///
/// A successful response carries `flags`. An application-level error (usually with a `400`
/// status) carries `errorCode` and `errorDetails` at the top level instead.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkEvaluationResponse {
    #[serde(default)]
    pub flags: Option<Vec<EvaluatedFlag>>,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub error_details: Option<String>,
}

/// Result of the remote evaluation of a single flag for the active context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedFlag {
    /// Flag key.
    pub key: String,
    /// Evaluated value. `Null` when the server did not send one.
    #[serde(default)]
    pub value: Value,
    /// Why the value was served, e.g. `TARGETING_MATCH` or `DEFAULT`.
    #[serde(default)]
    pub reason: Option<String>,
    /// Name of the variant served.
    #[serde(default)]
    pub variant: Option<String>,
    /// When set, the server failed to evaluate this flag and `value` must not be used.
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    /// Human-readable details of `error_code`.
    #[serde(default)]
    pub error_details: Option<String>,
    /// Arbitrary metadata attached to the flag.
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
}

impl EvaluatedFlag {
    /// Return `true` if the server failed to evaluate this flag.
    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Flag metadata attached by the server. Only primitive values are kept.
pub type Metadata = HashMap<String, MetadataValue>;

/// A primitive flag metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
#[allow(missing_docs)]
pub enum MetadataValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// Nested metadata values are not supported. They are dropped instead of failing the whole
/// response.
fn deserialize_metadata<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Metadata, D::Error> {
    let raw = Option::<HashMap<String, TryParse<MetadataValue>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| {
            let value: Option<MetadataValue> = value.into();
            if value.is_none() {
                log::debug!(target: "ofrep", key = key.as_str(); "dropping unsupported flag metadata value");
            }
            value.map(|value| (key, value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{BulkEvaluationResponse, MetadataValue};
    use crate::{ErrorCode, Value};

    #[test]
    fn parses_successful_response() {
        let response: BulkEvaluationResponse = serde_json::from_str(
            r#"
              {
                "flags": [
                  {
                    "key": "bool-flag",
                    "value": true,
                    "reason": "TARGETING_MATCH",
                    "variant": "variantA",
                    "metadata": {"team": "growth", "version": 3, "nested": {"a": 1}}
                  },
                  {
                    "key": "my-other-flag",
                    "errorCode": "PARSE_ERROR",
                    "errorDetails": "bad rule"
                  }
                ]
              }
            "#,
        )
        .unwrap();

        let flags = response.flags.unwrap();
        assert_eq!(flags.len(), 2);

        let bool_flag = &flags[0];
        assert_eq!(bool_flag.value, Value::Boolean(true));
        assert_eq!(bool_flag.variant.as_deref(), Some("variantA"));
        assert_eq!(
            bool_flag.metadata.get("team"),
            Some(&MetadataValue::from("growth"))
        );
        assert_eq!(
            bool_flag.metadata.get("version"),
            Some(&MetadataValue::Integer(3))
        );
        assert!(!bool_flag.metadata.contains_key("nested"));

        let error_flag = &flags[1];
        assert!(error_flag.is_error());
        assert_eq!(error_flag.value, Value::Null);
        assert_eq!(error_flag.error_code, Some(ErrorCode::ParseError));
        assert_eq!(error_flag.error_details.as_deref(), Some("bad rule"));
    }

    #[test]
    fn parses_application_error_envelope() {
        let response: BulkEvaluationResponse = serde_json::from_str(
            r#"{"errorCode": "INVALID_CONTEXT", "errorDetails": "explanation of the error"}"#,
        )
        .unwrap();

        assert!(response.flags.is_none());
        assert_eq!(response.error_code, Some(ErrorCode::InvalidContext));
        assert_eq!(
            response.error_details.as_deref(),
            Some("explanation of the error")
        );
    }
}
