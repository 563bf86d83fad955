use std::{
    sync::{mpsc::Receiver, Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::Utc;

use crate::{
    api::OfrepApi,
    context::ContextSlot,
    data_collector::FeatureEvent,
    evaluation::{self, FlagValueType},
    events::{ProviderEvent, ProviderState, ProviderStatus},
    flag_cache::FlagCache,
    poller::PollerThread,
    refresh::Refresher,
    transport::ReqwestTransport,
    DataCollector, Error, EvaluationContext, FlagEvaluation, ProviderConfig, Result, Value,
};

/// Variation reported to the data collector when the caller's default is returned.
const SDK_DEFAULT_VARIATION: &str = "SdkDefault";

/// An OpenFeature provider evaluating flags remotely with the OFREP bulk evaluation API.
///
/// Flags are evaluated for the whole evaluation context in one request and cached. Typed
/// accessors read the cached snapshot only and never perform network I/O. A background thread
/// refreshes the cache periodically and whenever the context changes.
///
/// # Examples
/// ```no_run
/// # use ofrep::{EvaluationContext, OfrepProvider, ProviderConfig};
/// let provider = OfrepProvider::new(ProviderConfig::from_endpoint("http://localhost:1031"))?;
/// provider.initialize(Some(EvaluationContext::new("user-1")))?;
/// provider.wait_for_initialization()?;
///
/// let enabled = provider.get_boolean_evaluation("new-checkout", false).value;
/// # Ok::<(), ofrep::Error>(())
/// ```
pub struct OfrepProvider {
    cache: Arc<FlagCache>,
    context: Arc<ContextSlot>,
    status: Arc<ProviderStatus>,
    lifecycle: Mutex<Lifecycle>,
    polling_interval: Duration,
    polling_jitter: Duration,
    data_collector: Box<dyn DataCollector + Send + Sync>,
}

enum Lifecycle {
    /// `initialize` has not been called yet. The API client is handed to the poller thread
    /// once it starts.
    Created(OfrepApi),
    Running(PollerThread),
    ShutDown,
}

impl OfrepProvider {
    /// Provider name reported to OpenFeature.
    pub const NAME: &'static str = "OFREP Provider";

    /// Create a new provider using the specified configuration.
    ///
    /// The provider is not usable until [`OfrepProvider::initialize`] is called.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`] if the endpoint is not a valid base URL.
    /// - [`Error::Network`] if the default HTTP client cannot be created.
    pub fn new(config: ProviderConfig) -> Result<OfrepProvider> {
        let headers = config.request_headers();
        let transport = match config.transport {
            Some(transport) => transport,
            None => Box::new(ReqwestTransport::new(config.timeout)?),
        };
        let api = OfrepApi::new(&config.endpoint, headers, transport)?;

        Ok(OfrepProvider {
            cache: Arc::new(FlagCache::new()),
            context: Arc::new(ContextSlot::new(None)),
            status: Arc::new(ProviderStatus::new()),
            lifecycle: Mutex::new(Lifecycle::Created(api)),
            polling_interval: config.polling_interval,
            polling_jitter: config.polling_jitter,
            data_collector: config.data_collector,
        })
    }

    /// Start the background poller. The first bulk evaluation is performed right away using
    /// `context`, or the context previously passed to [`OfrepProvider::set_context`].
    ///
    /// This function does not wait for the first evaluation. Use
    /// [`OfrepProvider::wait_for_initialization`] or [`OfrepProvider::subscribe`] for that.
    /// Calling it again on a running provider does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::ProviderShutdown`] if the provider has been shut down.
    /// - [`Error::Io`] if the poller thread failed to start.
    pub fn initialize(&self, context: Option<EvaluationContext>) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle();
        let api = match std::mem::replace(&mut *lifecycle, Lifecycle::ShutDown) {
            Lifecycle::Created(api) => api,
            running @ Lifecycle::Running(_) => {
                *lifecycle = running;
                log::debug!(target: "ofrep", "provider is already initialized");
                return Ok(());
            }
            Lifecycle::ShutDown => return Err(Error::ProviderShutdown),
        };

        if let Some(context) = context {
            self.context.replace(context);
        }

        let refresher = Refresher::new(
            api,
            self.cache.clone(),
            self.context.clone(),
            self.status.clone(),
        );
        let poller = PollerThread::start(refresher, self.polling_interval, self.polling_jitter)?;
        *lifecycle = Lifecycle::Running(poller);

        log::debug!(target: "ofrep", "provider initialized");
        Ok(())
    }

    /// Block until the first bulk evaluation completes and return its result.
    ///
    /// # Errors
    ///
    /// - [`Error::ProviderNotReady`] if [`OfrepProvider::initialize`] has not been called.
    /// - [`Error::ProviderShutdown`] if the provider was shut down before the first evaluation.
    /// - Any error of the first bulk evaluation.
    pub fn wait_for_initialization(&self) -> Result<()> {
        let first_refresh = match &*self.lock_lifecycle() {
            Lifecycle::Running(poller) => poller.first_refresh(),
            Lifecycle::Created(_) => return Err(Error::ProviderNotReady),
            Lifecycle::ShutDown => return Err(Error::ProviderShutdown),
        };
        first_refresh.wait()
    }

    /// Replace the evaluation context.
    ///
    /// On a running provider, this emits [`ProviderEvent::Stale`] unless the provider is already
    /// stale, and schedules a bulk evaluation for the new context, which resolves to
    /// [`ProviderEvent::Ready`] or [`ProviderEvent::Error`]. It does not wait for the evaluation.
    /// Before initialization the context is only stored.
    ///
    /// # Errors
    ///
    /// [`Error::ProviderShutdown`] if the provider has been shut down.
    pub fn set_context(&self, context: EvaluationContext) -> Result<()> {
        let lifecycle = self.lock_lifecycle();
        match &*lifecycle {
            Lifecycle::Created(_) => {
                self.context.replace(context);
            }
            Lifecycle::Running(poller) => {
                // Replaced first, so an in-flight evaluation for the old context is discarded
                // instead of making the provider ready again.
                self.context.replace(context);
                self.status.emit_if_changed(ProviderEvent::Stale);
                poller.request_refresh();
            }
            Lifecycle::ShutDown => return Err(Error::ProviderShutdown),
        }
        Ok(())
    }

    /// The active evaluation context.
    pub fn context(&self) -> Option<EvaluationContext> {
        self.context.get()
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// Subscribers are disconnected and no more events are emitted. Flags fetched so far remain
    /// readable. Calling this function more than once is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::PollerThreadPanicked`] if the poller thread has panicked.
    pub fn shutdown(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.lock_lifecycle(), Lifecycle::ShutDown);
        self.status.close();

        match previous {
            Lifecycle::Running(poller) => {
                log::debug!(target: "ofrep", "shutting down poller thread");
                poller.shutdown()
            }
            Lifecycle::Created(_) | Lifecycle::ShutDown => Ok(()),
        }
    }

    /// Current state of the provider.
    pub fn state(&self) -> ProviderState {
        self.status.state()
    }

    /// Subscribe to provider events.
    ///
    /// Only events emitted after subscribing are delivered. The receiver disconnects when the
    /// provider shuts down.
    pub fn subscribe(&self) -> Receiver<ProviderEvent> {
        self.status.subscribe()
    }

    /// Read a boolean flag.
    pub fn get_boolean_evaluation(&self, flag_key: &str, default: bool) -> FlagEvaluation<bool> {
        self.evaluate(flag_key, default)
    }

    /// Read a string flag.
    pub fn get_string_evaluation(
        &self,
        flag_key: &str,
        default: impl Into<String>,
    ) -> FlagEvaluation<String> {
        self.evaluate(flag_key, default.into())
    }

    /// Read an integer flag. Doubles without a fractional part are accepted.
    pub fn get_integer_evaluation(&self, flag_key: &str, default: i64) -> FlagEvaluation<i64> {
        self.evaluate(flag_key, default)
    }

    /// Read a double flag. Integers are converted.
    pub fn get_double_evaluation(&self, flag_key: &str, default: f64) -> FlagEvaluation<f64> {
        self.evaluate(flag_key, default)
    }

    /// Read an object flag. Only lists and structures are accepted.
    pub fn get_object_evaluation(&self, flag_key: &str, default: Value) -> FlagEvaluation<Value> {
        self.evaluate(flag_key, default)
    }

    fn evaluate<T: FlagValueType>(&self, flag_key: &str, default: T) -> FlagEvaluation<T> {
        let flags = self.cache.snapshot();
        let evaluation = evaluation::evaluate(flags.as_deref(), flag_key, default);

        if let Some(err) = &evaluation.error {
            log::debug!(target: "ofrep", flag_key; "returning default value: {}", err);
        } else {
            log::trace!(target: "ofrep", flag_key; "evaluated a flag");
        }

        self.collect(&evaluation);
        evaluation
    }

    fn collect<T: FlagValueType>(&self, evaluation: &FlagEvaluation<T>) {
        let (user_key, context_kind) = self.context.with(|context| match context {
            Some(context) if context.is_anonymous() => {
                (context.targeting_key().to_owned(), "anonymousUser")
            }
            Some(context) => (context.targeting_key().to_owned(), "user"),
            None => (String::new(), "user"),
        });

        self.data_collector.collect(FeatureEvent {
            kind: "feature",
            context_kind,
            user_key,
            creation_date: Utc::now().timestamp(),
            key: evaluation.flag_key.clone(),
            variation: evaluation
                .variant
                .clone()
                .unwrap_or_else(|| SDK_DEFAULT_VARIATION.to_owned()),
            value: evaluation.value.to_value(),
            default: evaluation.is_error(),
            source: "PROVIDER_CACHE",
        });
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
