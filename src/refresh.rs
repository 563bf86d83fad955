//! The refresh path: performs a bulk evaluation, updates the cache and publishes the resulting
//! provider event.
//!
//! [`Refresher`] is the only writer of the flag cache, the `ETag` and the retry gate. It is owned
//! by the poller thread, so refreshes never race with each other.
use std::sync::Arc;

use chrono::Utc;

use crate::{
    api::{BulkEvaluation, OfrepApi},
    context::ContextSlot,
    events::{ProviderEvent, ProviderStatus},
    flag_cache::FlagCache,
    rate_limit::RetryGate,
    EvaluatedFlag, Error, EvaluationContext, Result,
};

/// Why a refresh is performed. It decides which event the outcome produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshTrigger {
    /// First refresh after initialization.
    Initial,
    /// Periodic refresh.
    Poll,
    /// Out-of-band refresh after the evaluation context changed.
    ContextChange,
}

/// What happened to the result of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// The result has been applied to the cache and the provider state.
    Applied,
    /// The context changed while the request was in flight. The result was discarded, the
    /// refresh scheduled by the context change takes over.
    Superseded,
}

/// Outcome of a bulk evaluation that did not fail.
#[derive(Debug, Clone, PartialEq)]
enum BulkEvaluationStatus {
    Updated(Vec<EvaluatedFlag>),
    NotModified,
    /// The request was not sent, or was rejected, because of rate limiting.
    RateLimited,
}

pub(crate) struct Refresher {
    api: OfrepApi,
    gate: RetryGate,
    cache: Arc<FlagCache>,
    context: Arc<ContextSlot>,
    status: Arc<ProviderStatus>,
}

impl Refresher {
    pub fn new(
        api: OfrepApi,
        cache: Arc<FlagCache>,
        context: Arc<ContextSlot>,
        status: Arc<ProviderStatus>,
    ) -> Refresher {
        Refresher {
            api,
            gate: RetryGate::new(),
            cache,
            context,
            status,
        }
    }

    /// Evaluate flags for the active context and publish the resulting event.
    ///
    /// Returns the error, if any, so the caller can report the outcome of the initial refresh.
    pub fn refresh(&mut self, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
        let (context, generation) = self.context.snapshot();
        let etag = self.api.etag().map(str::to_owned);

        let result = self.evaluate_flags(context.as_ref());

        // The context stays locked while the result is applied.
        let applied = self
            .context
            .if_current(generation, || self.apply(result, trigger));
        match applied {
            Some(applied) => applied.map(|()| RefreshOutcome::Applied),
            None => {
                log::debug!(target: "ofrep", "context changed during bulk evaluation, discarding result");
                // The validator belongs to the discarded response.
                self.api.set_etag(etag);
                Ok(RefreshOutcome::Superseded)
            }
        }
    }

    fn apply(&self, result: Result<BulkEvaluationStatus>, trigger: RefreshTrigger) -> Result<()> {
        match (result, trigger) {
            (Ok(BulkEvaluationStatus::Updated(flags)), _) => {
                self.cache.replace(flags);
                self.status.emit(ProviderEvent::Ready);
            }
            (Ok(BulkEvaluationStatus::NotModified), RefreshTrigger::Initial)
            | (Ok(BulkEvaluationStatus::NotModified), RefreshTrigger::ContextChange) => {
                self.status.emit(ProviderEvent::Ready);
            }
            (Ok(BulkEvaluationStatus::NotModified), RefreshTrigger::Poll) => {
                // Nothing changed, the provider is already in the right state.
            }
            (Ok(BulkEvaluationStatus::RateLimited), RefreshTrigger::Initial) => {
                // There is no usable cache yet, so this is an error rather than staleness.
                let retry_after = self.gate.retry_after().map(|at| at.to_rfc2822());
                let error = Error::TooManyRequests { retry_after };
                self.status.emit(ProviderEvent::Error(error.clone()));
                return Err(error);
            }
            (Ok(BulkEvaluationStatus::RateLimited), RefreshTrigger::Poll)
            | (Ok(BulkEvaluationStatus::RateLimited), RefreshTrigger::ContextChange) => {
                // Silent when the context change already made the provider stale.
                self.status.emit_if_changed(ProviderEvent::Stale);
            }
            (Err(err), _) => {
                log::warn!(target: "ofrep", "failed to refresh flags: {}", err);
                self.status.emit(ProviderEvent::Error(err.clone()));
                return Err(err);
            }
        }
        Ok(())
    }

    fn evaluate_flags(&mut self, context: Option<&EvaluationContext>) -> Result<BulkEvaluationStatus> {
        let now = Utc::now();
        if self.gate.should_skip(now) {
            log::debug!(target: "ofrep", "skipping bulk evaluation, rate limited until {:?}", self.gate.retry_after());
            return Ok(BulkEvaluationStatus::RateLimited);
        }

        match self.api.post_bulk_evaluate_flags(context) {
            Ok(BulkEvaluation::Updated(flags)) => Ok(BulkEvaluationStatus::Updated(flags)),
            Ok(BulkEvaluation::NotModified) => Ok(BulkEvaluationStatus::NotModified),
            Err(Error::TooManyRequests { retry_after }) => {
                log::info!(target: "ofrep", "bulk evaluation rate limited (retry-after: {:?})", retry_after);
                self.gate.record_retry_after(retry_after.as_deref(), now);
                Ok(BulkEvaluationStatus::RateLimited)
            }
            Err(err) => Err(err),
        }
    }
}
