//! Typed flag reads over a cache snapshot.
//!
//! Evaluation is a pure function of the [`FlagSet`] snapshot: it never performs network I/O and
//! never mutates shared state.
use std::fmt;

use crate::{flag_cache::FlagSet, Error, ErrorCode, Metadata, Value};

/// Reason reported when the default value is returned because of an error.
pub const ERROR_REASON: &str = "ERROR";

/// Result of a typed flag read.
///
/// A read always produces a value: on error, `value` is the caller's default and `error` tells
/// what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagEvaluation<T> {
    /// Key of the flag read.
    pub flag_key: String,
    /// Flag value, or the caller's default on error.
    pub value: T,
    /// Variant served. `None` on error.
    pub variant: Option<String>,
    /// Reason reported by the server, or [`ERROR_REASON`] on error.
    pub reason: Option<String>,
    /// Flag metadata. Empty on error.
    pub metadata: Metadata,
    /// Why the default was returned.
    pub error: Option<Error>,
}

impl<T> FlagEvaluation<T> {
    /// Return `true` if the caller's default was returned.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// OpenFeature error code of [`FlagEvaluation::error`].
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(Error::code)
    }

    /// Human-readable message of [`FlagEvaluation::error`].
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    fn from_error(flag_key: &str, default: T, error: Error) -> FlagEvaluation<T> {
        FlagEvaluation {
            flag_key: flag_key.to_owned(),
            value: default,
            variant: None,
            reason: Some(ERROR_REASON.to_owned()),
            metadata: Metadata::new(),
            error: Some(error),
        }
    }
}

/// Closed set of types a flag can be requested as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Boolean,
    String,
    Integer,
    Double,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Double => "double",
            ValueKind::Object => "object",
        })
    }
}

/// A Rust type a flag value can be coerced into.
pub(crate) trait FlagValueType: Sized {
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

impl FlagValueType for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn from_value(value: &Value) -> Option<bool> {
        value.as_boolean()
    }

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl FlagValueType for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: &Value) -> Option<String> {
        value.as_str().map(str::to_owned)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FlagValueType for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_value(value: &Value) -> Option<i64> {
        value.as_integer()
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl FlagValueType for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn from_value(value: &Value) -> Option<f64> {
        value.as_double()
    }

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl FlagValueType for Value {
    const KIND: ValueKind = ValueKind::Object;

    fn from_value(value: &Value) -> Option<Value> {
        match value {
            Value::List(_) | Value::Structure(_) => Some(value.clone()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

/// Read `flag_key` from `flags` as `T`, falling back to `default` on any error.
///
/// `flags` is `None` when no bulk evaluation has succeeded yet.
pub(crate) fn evaluate<T: FlagValueType>(
    flags: Option<&FlagSet>,
    flag_key: &str,
    default: T,
) -> FlagEvaluation<T> {
    let Some(flags) = flags else {
        return FlagEvaluation::from_error(flag_key, default, Error::ProviderNotReady);
    };

    let Some(flag) = flags.get(flag_key) else {
        return FlagEvaluation::from_error(
            flag_key,
            default,
            Error::FlagNotFound(flag_key.to_owned()),
        );
    };

    if let Some(code) = flag.error_code {
        let error = Error::from_code(code, flag_key, flag.error_details.as_deref());
        return FlagEvaluation::from_error(flag_key, default, error);
    }

    let Some(value) = T::from_value(&flag.value) else {
        let error = Error::TypeMismatch(format!(
            "flag `{}` requested as {} but its value is {}",
            flag_key,
            T::KIND,
            flag.value.type_name()
        ));
        return FlagEvaluation::from_error(flag_key, default, error);
    };

    FlagEvaluation {
        flag_key: flag_key.to_owned(),
        value,
        variant: flag.variant.clone(),
        reason: flag.reason.clone(),
        metadata: flag.metadata.clone(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{evaluate, FlagEvaluation, ERROR_REASON};
    use crate::{
        flag_cache::FlagSet, test_utils::flag, ErrorCode, EvaluatedFlag, MetadataValue, Value,
    };

    fn flags(list: Vec<EvaluatedFlag>) -> FlagSet {
        list.into_iter().map(|f| (f.key.clone(), f)).collect()
    }

    #[test]
    fn returns_cached_value_with_details() {
        let mut bool_flag = flag("bool-flag", true);
        bool_flag.metadata = HashMap::from([("team".to_owned(), MetadataValue::from("growth"))]);
        let flags = flags(vec![bool_flag]);

        let result = evaluate(Some(&flags), "bool-flag", false);

        assert_eq!(
            result,
            FlagEvaluation {
                flag_key: "bool-flag".to_owned(),
                value: true,
                variant: Some("variantA".to_owned()),
                reason: Some("TARGETING_MATCH".to_owned()),
                metadata: HashMap::from([("team".to_owned(), MetadataValue::from("growth"))]),
                error: None,
            }
        );
    }

    #[test]
    fn missing_snapshot_is_provider_not_ready() {
        let result = evaluate(None, "bool-flag", false);

        assert!(!result.value);
        assert_eq!(result.error_code(), Some(ErrorCode::ProviderNotReady));
    }

    #[test]
    fn missing_flag_returns_default() {
        let flags = flags(vec![flag("bool-flag", true)]);

        let result = evaluate(Some(&flags), "does_not_exist", false);

        assert!(!result.value);
        assert_eq!(result.error_code(), Some(ErrorCode::FlagNotFound));
        assert_eq!(result.reason.as_deref(), Some(ERROR_REASON));
    }

    #[test]
    fn flag_error_code_returns_default_with_details() {
        let mut error_flag = flag("my-other-flag", Value::Null);
        error_flag.error_code = Some(ErrorCode::ParseError);
        error_flag.error_details = Some("bad rule".to_owned());
        let flags = flags(vec![error_flag]);

        let result = evaluate(Some(&flags), "my-other-flag", "default".to_owned());

        assert_eq!(result.value, "default");
        assert_eq!(result.error_code(), Some(ErrorCode::ParseError));
        assert_eq!(result.error_message().as_deref(), Some("parse error: bad rule"));
        assert_eq!(result.variant, None);
    }

    #[test]
    fn structure_requested_as_boolean_is_type_mismatch() {
        let flags = flags(vec![flag(
            "object-flag",
            Value::Structure(HashMap::from([("a".to_owned(), Value::Integer(1))])),
        )]);

        let result = evaluate(Some(&flags), "object-flag", true);

        assert!(result.value);
        assert_eq!(result.error_code(), Some(ErrorCode::TypeMismatch));
        let message = result.error_message().unwrap();
        assert!(message.contains("object-flag"), "{message}");
        assert!(message.contains("boolean"), "{message}");
        assert!(message.contains("structure"), "{message}");
    }

    #[test]
    fn integer_requested_as_double_is_converted() {
        let flags = flags(vec![flag("number-flag", Value::Integer(42))]);

        let result = evaluate(Some(&flags), "number-flag", 0.0);

        assert_eq!(result.value, 42.0);
        assert!(!result.is_error());
    }

    #[test]
    fn whole_double_requested_as_integer_is_converted() {
        let flags = flags(vec![
            flag("whole", Value::Double(3.0)),
            flag("fractional", Value::Double(3.5)),
        ]);

        assert_eq!(evaluate(Some(&flags), "whole", 0_i64).value, 3);

        let result = evaluate(Some(&flags), "fractional", 7_i64);
        assert_eq!(result.value, 7);
        assert_eq!(result.error_code(), Some(ErrorCode::TypeMismatch));
    }

    #[test]
    fn object_accepts_lists_and_structures_only() {
        let list = Value::List(vec!["a".into(), "b".into()]);
        let flags = flags(vec![flag("list", list.clone()), flag("string", "text")]);

        assert_eq!(evaluate(Some(&flags), "list", Value::Null).value, list);

        let result = evaluate(Some(&flags), "string", Value::Null);
        assert_eq!(result.value, Value::Null);
        assert_eq!(result.error_code(), Some(ErrorCode::TypeMismatch));
    }

    #[test]
    fn string_is_not_coerced_from_other_types() {
        let flags = flags(vec![flag("number-flag", Value::Integer(1))]);

        let result = evaluate(Some(&flags), "number-flag", "default".to_owned());

        assert_eq!(result.value, "default");
        assert_eq!(result.error_code(), Some(ErrorCode::TypeMismatch));
    }
}
