//! A background poller thread that periodically evaluates flags and stores them in the flag
//! cache.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{sync_channel, RecvTimeoutError, SyncSender, TrySendError},
        Arc, Condvar, Mutex, PoisonError,
    },
    time::Duration,
};

use rand::{thread_rng, Rng};

use crate::{
    refresh::{RefreshOutcome, RefreshTrigger, Refresher},
    Error, Result,
};

enum Command {
    /// Refresh now, the evaluation context has changed.
    Refresh,
    Stop,
}

/// The flag poller thread.
///
/// The thread owns the [`Refresher`], so it is the only place where the flag cache, the `ETag`
/// and the retry gate are written.
pub(crate) struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send commands to the poller thread.
    // Buffer size of 1 is enough: a pending `Refresh` will read the latest context anyway, and
    // `stopped` is checked before serving a command.
    command_sender: SyncSender<Command>,

    stopped: Arc<AtomicBool>,

    result: FirstRefresh,
}

/// Outcome of the first refresh, shared between the poller thread and its waiters.
#[derive(Clone)]
pub(crate) struct FirstRefresh {
    /// Holds `None` if the first refresh hasn't completed yet. Holds `Some(Ok(()))` if flags have
    /// been fetched successfully. Holds `Some(Err(...))` if the first refresh failed.
    inner: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl FirstRefresh {
    fn new() -> FirstRefresh {
        FirstRefresh {
            inner: Arc::new((Mutex::new(None), Condvar::new())),
        }
    }

    fn set(&self, value: Result<()>) {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        self.inner.1.notify_all();
    }

    /// Resolve waiters that would otherwise wait forever because the thread exited first.
    fn set_if_pending(&self, value: Result<()>) {
        let mut lock = self.inner.0.lock().unwrap_or_else(PoisonError::into_inner);
        if lock.is_none() {
            *lock = Some(value);
            self.inner.1.notify_all();
        }
    }

    /// Block until the first refresh completes and return its result.
    pub fn wait(&self) -> Result<()> {
        let mut lock = self
            .inner
            .0
            .lock()
            .map_err(|_| Error::PollerThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => return result.clone(),
                None => {
                    lock = self
                        .inner
                        .1
                        .wait(lock)
                        .map_err(|_| Error::PollerThreadPanicked)?;
                }
            }
        }
    }
}

impl PollerThread {
    /// Starts the poller thread. The first refresh is performed right away.
    ///
    /// # Errors
    ///
    /// IO Error if the thread failed to start.
    pub fn start(
        mut refresher: Refresher,
        interval: Duration,
        jitter_duration: Duration,
    ) -> std::io::Result<PollerThread> {
        let (command_sender, command_receiver) = sync_channel::<Command>(1);
        let stopped = Arc::new(AtomicBool::new(false));
        let result = FirstRefresh::new();

        let join_handle = {
            let stopped = Arc::clone(&stopped);
            let result = result.clone();

            std::thread::Builder::new()
                .name("ofrep-poller".to_owned())
                .spawn(move || {
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        let mut trigger = RefreshTrigger::Initial;
                        loop {
                            if stopped.load(Ordering::Acquire) {
                                return;
                            }

                            log::debug!(target: "ofrep", "evaluating flags ({:?})", trigger);
                            let refreshed = refresher.refresh(trigger);
                            if trigger == RefreshTrigger::Initial {
                                if let Ok(RefreshOutcome::Superseded) = refreshed {
                                    // The context changed mid-request. Its pending refresh is
                                    // served as the first one instead.
                                    let _ = command_receiver.try_recv();
                                    continue;
                                }
                                result.set(refreshed.map(|_| ()));
                            }

                            let timeout = jitter(interval, jitter_duration);
                            trigger = match command_receiver.recv_timeout(timeout) {
                                Err(RecvTimeoutError::Timeout) => RefreshTrigger::Poll,
                                Ok(Command::Refresh) => RefreshTrigger::ContextChange,
                                Ok(Command::Stop) => {
                                    log::debug!(target: "ofrep", "poller thread received stop command");
                                    return;
                                }
                                Err(RecvTimeoutError::Disconnected) => {
                                    log::debug!(target: "ofrep", "poller thread received disconnected");
                                    return;
                                }
                            };
                        }
                    }));

                    match outcome {
                        Ok(()) => result.set_if_pending(Err(Error::ProviderShutdown)),
                        Err(_panic_info) => result.set(Err(Error::PollerThreadPanicked)),
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            command_sender,
            stopped,
            result,
        })
    }

    /// Ask the poller thread to refresh flags without waiting for the next tick.
    ///
    /// Requests made while another one is pending are merged into it.
    pub fn request_refresh(&self) {
        match self.command_sender.try_send(Command::Refresh) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                log::warn!(target: "ofrep", "poller thread is not running, refresh request ignored");
            }
        }
    }

    /// A handle to wait for the first refresh without borrowing the poller.
    pub fn first_refresh(&self) -> FirstRefresh {
        self.result.clone()
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        // A full buffer holds a pending refresh, which the thread drops after seeing `stopped`.
        let _ = self.command_sender.try_send(Command::Stop);
    }

    /// Stop the poller thread and block waiting for it to exit.
    pub fn shutdown(self) -> Result<()> {
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}
