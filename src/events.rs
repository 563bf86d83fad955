//! Provider lifecycle: current state and the event stream published to subscribers.
use std::sync::{
    mpsc::{channel, Receiver, Sender},
    Mutex, PoisonError,
};

use crate::Error;

/// State of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
    /// No bulk evaluation has completed yet.
    NotReady,
    /// Cached flags are up to date.
    Ready,
    /// Cached flags are served, but freshness is not guaranteed (rate limited or context change
    /// in progress).
    Stale,
    /// The last refresh failed. A previous snapshot may still be served.
    Error,
}

/// Event emitted on provider state transitions.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Flags have been evaluated for the active context.
    Ready,
    /// Cached flags may be outdated.
    Stale,
    /// A refresh failed.
    Error(Error),
}

impl ProviderEvent {
    /// State the provider is in after this event.
    pub fn state(&self) -> ProviderState {
        match self {
            ProviderEvent::Ready => ProviderState::Ready,
            ProviderEvent::Stale => ProviderState::Stale,
            ProviderEvent::Error(_) => ProviderState::Error,
        }
    }

    /// The error carried by an [`ProviderEvent::Error`] event.
    pub fn error(&self) -> Option<&Error> {
        match self {
            ProviderEvent::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Holds the current [`ProviderState`] and fans events out to subscribers.
///
/// Late subscribers do not receive past events; they should read [`ProviderStatus::state`]
/// instead.
pub(crate) struct ProviderStatus {
    inner: Mutex<StatusInner>,
}

struct StatusInner {
    state: ProviderState,
    subscribers: Vec<Sender<ProviderEvent>>,
    closed: bool,
}

impl ProviderStatus {
    pub fn new() -> ProviderStatus {
        ProviderStatus {
            inner: Mutex::new(StatusInner {
                state: ProviderState::NotReady,
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn state(&self) -> ProviderState {
        self.lock().state
    }

    /// Register a new subscriber. The receiver is disconnected once the provider shuts down.
    pub fn subscribe(&self) -> Receiver<ProviderEvent> {
        let (sender, receiver) = channel();
        let mut inner = self.lock();
        if !inner.closed {
            inner.subscribers.push(sender);
        }
        receiver
    }

    /// Update the state and publish `event` to all subscribers. Does nothing once closed.
    pub fn emit(&self, event: ProviderEvent) {
        Self::publish(&mut self.lock(), event);
    }

    /// Emit `event` unless the provider is already in the state it leads to.
    pub fn emit_if_changed(&self, event: ProviderEvent) {
        let mut inner = self.lock();
        if inner.state != event.state() {
            Self::publish(&mut inner, event);
        }
    }

    /// Stop publishing events and disconnect all subscribers.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    fn publish(inner: &mut StatusInner, event: ProviderEvent) {
        if inner.closed {
            return;
        }

        log::debug!(target: "ofrep", "provider state: {:?} -> {:?}", inner.state, event.state());
        inner.state = event.state();
        // Sending fails only if the receiver was dropped. Forget such subscribers.
        inner
            .subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
