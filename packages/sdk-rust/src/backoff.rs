//! Reconnect delay scheduling
//!
//! The delay for attempt `n` is `timeouts[min(n, len - 1)]`, so delays grow
//! through the list and then stay at its last entry. The attempt counter goes
//! back to zero on [`BackoffScheduler::reset_counter`] or, when a reset window
//! is configured, once the window passes without a new attempt.

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::{SdkError, SdkResult};

#[derive(Default)]
struct Timers {
    window: Option<JoinHandle<()>>,
    actions: Vec<AbortHandle>,
}

pub struct BackoffScheduler {
    timeouts: Vec<Duration>,
    reset_window: Option<Duration>,
    attempts: Arc<AtomicUsize>,
    timers: Mutex<Timers>,
    disposed: AtomicBool,
}

impl BackoffScheduler {
    pub fn new(timeouts: Vec<Duration>, reset_window: Option<Duration>) -> Self {
        Self {
            timeouts,
            reset_window,
            attempts: Arc::new(AtomicUsize::new(0)),
            timers: Mutex::new(Timers::default()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Delay used for the given zero-based attempt
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self.timeouts.len() {
            0 => Duration::ZERO,
            len => self.timeouts[attempt.min(len - 1)],
        }
    }

    /// Delay the next `schedule` call will use
    pub fn next_delay(&self) -> Duration {
        self.delay_for(self.attempt_count())
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn reset_counter(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    /// Run `action` once after the current backoff delay.
    ///
    /// The returned future resolves with the action's own result, or with
    /// [`SdkError::Cancelled`] if the timer is cancelled first. Must be called
    /// from within a tokio runtime.
    pub fn schedule<F, Fut, T>(&self, action: F) -> BoxFuture<'static, SdkResult<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = SdkResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_disposed() {
            return futures_util::future::ready(Err(SdkError::Cancelled)).boxed();
        }

        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel);
        let delay = self.delay_for(attempt);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action().await
        });

        {
            let mut timers = self.timers.lock();
            timers.actions.retain(|h| !h.is_finished());
            timers.actions.push(handle.abort_handle());

            if let Some(window) = self.reset_window {
                if let Some(previous) = timers.window.take() {
                    previous.abort();
                }
                let attempts = Arc::clone(&self.attempts);
                timers.window = Some(tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    attempts.store(0, Ordering::Release);
                }));
            }
        }

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(SdkError::Cancelled),
                Err(e) => Err(SdkError::TaskFailed(e.to_string())),
            }
        }
        .boxed()
    }

    /// Cancel every pending timer; the scheduler stays usable
    pub fn cancel(&self) {
        let mut timers = self.timers.lock();
        if let Some(window) = timers.window.take() {
            window.abort();
        }
        for handle in timers.actions.drain(..) {
            handle.abort();
        }
    }

    /// Cancel every pending timer and refuse further scheduling. Idempotent.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .actions
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }
}

impl Drop for BackoffScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
