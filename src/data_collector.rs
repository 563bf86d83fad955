use serde::Serialize;

use crate::Value;

/// Usage event produced for every flag read served from the cache.
///
/// Events are meant for a usage-analytics exporter, which batches them and sends them to the
/// server on its own schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEvent {
    /// Always `"feature"`.
    pub kind: &'static str,
    /// `"anonymousUser"` for anonymous contexts, `"user"` otherwise.
    pub context_kind: &'static str,
    /// Targeting key of the active context.
    pub user_key: String,
    /// Unix timestamp (seconds) of the read.
    pub creation_date: i64,
    /// Flag key.
    pub key: String,
    /// Variant served, or `"SdkDefault"` when the caller's default was returned.
    pub variation: String,
    /// Value returned to the caller.
    pub value: Value,
    /// `true` if the caller's default was returned.
    pub default: bool,
    /// Always `"PROVIDER_CACHE"`.
    pub source: &'static str,
}

/// Receives [`FeatureEvent`]s from the evaluation path.
///
/// `collect` is called on the thread reading the flag, so implementations must only enqueue the
/// event and return.
pub trait DataCollector {
    /// Record a flag read.
    fn collect(&self, event: FeatureEvent);
}

pub(crate) struct NoopDataCollector;
impl DataCollector for NoopDataCollector {
    fn collect(&self, _event: FeatureEvent) {}
}

impl<T: Fn(FeatureEvent)> DataCollector for T {
    fn collect(&self, event: FeatureEvent) {
        self(event);
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureEvent;
    use crate::Value;

    #[test]
    fn serializes_in_collector_format() {
        let event = FeatureEvent {
            kind: "feature",
            context_kind: "user",
            user_key: "user-1".to_owned(),
            creation_date: 1_700_000_000,
            key: "bool-flag".to_owned(),
            variation: "variantA".to_owned(),
            value: Value::Boolean(true),
            default: false,
            source: "PROVIDER_CACHE",
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "kind": "feature",
                "contextKind": "user",
                "userKey": "user-1",
                "creationDate": 1_700_000_000,
                "key": "bool-flag",
                "variation": "variantA",
                "value": true,
                "default": false,
                "source": "PROVIDER_CACHE"
            })
        );
    }
}
