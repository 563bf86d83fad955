//! An OpenFeature provider for the OpenFeature Remote Evaluation Protocol (OFREP).
//!
//! # Overview
//!
//! The provider revolves around an [`OfrepProvider`] that evaluates all feature flags for an
//! [`EvaluationContext`] in a single request to an OFREP-compatible flag management server and
//! caches the results. Typed accessors (`get_boolean_evaluation()` and friends) only read the
//! cached snapshot, so they are cheap and never perform network I/O.
//!
//! A background thread refreshes the cache periodically and whenever the evaluation context
//! changes. Conditional requests (`ETag`/`If-None-Match`) keep refreshes cheap when nothing has
//! changed, and `429 Too Many Requests` responses are honored through their `Retry-After` header.
//!
//! Provider state changes ([`ProviderState`]) are published as [`ProviderEvent`]s to
//! subscribers, see [`OfrepProvider::subscribe`].
//!
//! A [`DataCollector`] can be provided to receive a [`FeatureEvent`] for every flag read.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Flag reads never fail: they return a [`FlagEvaluation`] carrying either the flag value or the
//! caller's default together with the error. Errors of background refreshes are published as
//! [`ProviderEvent::Error`] events.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages under
//! the `ofrep` target. Consider integrating a `log`-compatible logger implementation for better
//! visibility into provider operations.
//!
//! # Examples
//!
//! ```no_run
//! # use ofrep::{EvaluationContext, ProviderConfig};
//! let provider = ProviderConfig::from_endpoint("http://localhost:1031")
//!     .api_key("secret")
//!     .to_provider()?;
//! provider.initialize(Some(EvaluationContext::new("user-1")))?;
//! provider.wait_for_initialization()?;
//!
//! let title = provider.get_string_evaluation("checkout-title", "Checkout").value;
//! # Ok::<(), ofrep::Error>(())
//! ```
//!
//! A complete example can be found in the `demos/` directory of the repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod api;
mod config;
mod context;
mod data_collector;
mod error;
mod evaluation;
mod events;
mod flag;
mod flag_cache;
mod poller;
mod provider;
mod rate_limit;
mod refresh;
mod transport;
mod value;

#[cfg(test)]
mod test_utils;

pub use api::{BulkEvaluation, OfrepApi};
pub use config::ProviderConfig;
pub use context::EvaluationContext;
pub use data_collector::{DataCollector, FeatureEvent};
pub use error::{Error, ErrorCode, Result};
pub use evaluation::{FlagEvaluation, ERROR_REASON};
pub use events::{ProviderEvent, ProviderState};
pub use flag::{EvaluatedFlag, Metadata, MetadataValue};
pub use flag_cache::{FlagCache, FlagSet};
pub use provider::OfrepProvider;
pub use rate_limit::RetryGate;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use value::Value;
