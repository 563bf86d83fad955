use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::Value;

/// Reserved attribute key under which the targeting key is sent to the server.
pub(crate) const TARGETING_KEY: &str = "targetingKey";

/// Identifies the subject (user, device, session) flags are evaluated for.
///
/// A context is never mutated in place by the provider. To change it, build a new one and pass it
/// to [`OfrepProvider::set_context`](crate::OfrepProvider::set_context).
///
/// # Examples
/// ```
/// # use ofrep::EvaluationContext;
/// let context = EvaluationContext::new("user-123")
///     .with_attribute("email", "john.doe@example.com")
///     .with_attribute("age", 42);
/// assert_eq!(context.targeting_key(), "user-123");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationContext {
    targeting_key: String,
    attributes: HashMap<String, Value>,
}

impl EvaluationContext {
    /// Create a new context for the subject identified by `targeting_key`.
    pub fn new(targeting_key: impl Into<String>) -> EvaluationContext {
        EvaluationContext {
            targeting_key: targeting_key.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add an attribute, replacing any previous value under the same key.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replace all attributes.
    pub fn with_attributes(mut self, attributes: HashMap<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Identifier of the subject.
    pub fn targeting_key(&self) -> &str {
        &self.targeting_key
    }

    /// All attributes, without the targeting key.
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Get a single attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// A context is anonymous when its `anonymous` attribute is `true`.
    pub fn is_anonymous(&self) -> bool {
        self.attribute("anonymous").and_then(Value::as_boolean) == Some(true)
    }

    /// Flatten the context into the attribute bag sent to the server, with the targeting key
    /// merged in under [`TARGETING_KEY`].
    pub(crate) fn to_wire(&self) -> HashMap<String, Value> {
        let mut wire = self.attributes.clone();
        wire.insert(
            TARGETING_KEY.to_owned(),
            Value::String(self.targeting_key.clone()),
        );
        wire
    }
}

/// The active evaluation context, shared between the provider and the refresh path.
///
/// Every replacement bumps a generation number, so the refresh path can tell whether the context
/// changed while a request was in flight.
#[derive(Debug, Default)]
pub(crate) struct ContextSlot {
    inner: RwLock<(Option<EvaluationContext>, u64)>,
}

impl ContextSlot {
    pub fn new(context: Option<EvaluationContext>) -> ContextSlot {
        ContextSlot {
            inner: RwLock::new((context, 0)),
        }
    }

    pub fn get(&self) -> Option<EvaluationContext> {
        self.read().0.clone()
    }

    /// The active context together with its generation.
    pub fn snapshot(&self) -> (Option<EvaluationContext>, u64) {
        self.read().clone()
    }

    pub fn replace(&self, context: EvaluationContext) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.0 = Some(context);
        inner.1 += 1;
    }

    /// Run `f` with the context, unless it has been replaced since `generation`.
    ///
    /// The context cannot be replaced while `f` runs.
    pub fn if_current<R>(&self, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let inner = self.read();
        (inner.1 == generation).then(f)
    }

    /// Run `f` with a borrow of the active context.
    pub fn with<R>(&self, f: impl FnOnce(Option<&EvaluationContext>) -> R) -> R {
        f(self.read().0.as_ref())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, (Option<EvaluationContext>, u64)> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
