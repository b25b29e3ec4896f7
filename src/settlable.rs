use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::task::Waker;
use tracing::{debug, trace, warn};

use crate::{Error, Handlers, Response};

/// A write-once promise shared by one producer and any number of waiters.
///
/// The first call to [`resolve`](Self::resolve) or [`reject`](Self::reject)
/// settles it; every later call is a no-op. Waiters either get the settled
/// outcome or, if their own cancellation signal fires first,
/// [`Error::Canceled`], which leaves the promise pending for everyone else.
///
/// # Examples
///
/// ```
/// use settlable_promise::SettlablePromise;
/// use futures::executor::block_on;
/// use futures::future::pending;
/// use std::{sync::Arc, thread};
///
/// let promise = Arc::new(SettlablePromise::<String, String>::new());
/// let waiter = promise.clone();
/// let task = thread::spawn(move || block_on(waiter.wait(pending::<()>())));
/// promise.resolve("Hi".into());
/// assert_eq!(task.join().unwrap(), Ok("Hi".to_string()));
/// ```
pub struct SettlablePromise<T, E> {
    pub(crate) inner: Mutex<Inner<T, E>>,
    pub(crate) done: Condvar,
}

pub(crate) struct Inner<T, E> {
    pub(crate) state: State<T, E>,
    /// Async waiters, keyed so a dropped `Settled` can deregister itself.
    pub(crate) wakers: Vec<(u64, Waker)>,
    pub(crate) next_key: u64,
}

pub(crate) enum State<T, E> {
    Pending(Handlers<T, E>),
    /// Handlers are running; waiters keep waiting, settlers back off.
    Settling,
    Settled(Result<T, E>),
}

impl<T, E> State<T, E> {
    fn name(&self) -> &'static str {
        match self {
            State::Pending(_) => "pending",
            State::Settling => "settling",
            State::Settled(Ok(_)) => "resolved",
            State::Settled(Err(_)) => "rejected",
        }
    }
}

impl<T, E> SettlablePromise<T, E> {
    pub fn new() -> Self {
        Self::with_handlers(Handlers::new())
    }

    pub fn with_handlers(handlers: Handlers<T, E>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Pending(handlers),
                wakers: vec![],
                next_key: 0,
            }),
            done: Condvar::new(),
        }
    }

    /// Register more handlers after the ones already held.
    ///
    /// Returns `false` when the promise has already started settling; the
    /// handlers are then dropped without running.
    pub fn apply(&self, handlers: Handlers<T, E>) -> bool {
        let mut inner = self.lock();
        match inner.state {
            State::Pending(ref mut registered) => {
                registered.extend(handlers);
                true
            }
            ref state => {
                debug!(
                    state = state.name(),
                    dropped = handlers.len(),
                    "promise already settled, dropping handlers"
                );
                false
            }
        }
    }

    /// Settle with `value`, running the resolve handlers first.
    ///
    /// Returns whether this call settled the promise. If a handler panics,
    /// the remaining handlers are skipped, the promise still settles and
    /// the panic is resumed afterwards.
    ///
    /// ```
    /// use settlable_promise::SettlablePromise;
    ///
    /// let promise = SettlablePromise::<&str, &str>::new();
    /// assert!(promise.resolve("5"));
    /// assert!(!promise.reject("error"));
    /// assert_eq!(promise.try_response(), Some(Ok("5")));
    /// ```
    pub fn resolve(&self, value: T) -> bool {
        let Some(handlers) = self.begin_settle("resolve") else {
            return false;
        };
        self.settle(handlers, Ok(value));
        true
    }

    /// Settle with `err`, running the reject handlers first.
    ///
    /// Returns whether this call settled the promise.
    pub fn reject(&self, err: E) -> bool {
        let Some(handlers) = self.begin_settle("reject") else {
            return false;
        };
        self.settle(handlers, Err(err));
        true
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.lock().state, State::Settled(_))
    }

    /// The outcome if the promise has settled, without waiting.
    pub fn try_response(&self) -> Option<Response<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.lock().response()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_settle(&self, op: &'static str) -> Option<Handlers<T, E>> {
        let mut inner = self.lock();
        match std::mem::replace(&mut inner.state, State::Settling) {
            State::Pending(handlers) => {
                trace!(op, handlers = handlers.len(), "settling promise");
                Some(handlers)
            }
            state => {
                trace!(op, state = state.name(), "promise already settled, ignoring");
                inner.state = state;
                None
            }
        }
    }

    fn settle(&self, handlers: Handlers<T, E>, outcome: Result<T, E>) {
        let ran = panic::catch_unwind(AssertUnwindSafe(|| match &outcome {
            Ok(value) => handlers.run_resolve(value),
            Err(err) => handlers.run_reject(err),
        }));
        self.finish_settle(outcome);
        if let Err(payload) = ran {
            warn!("promise handler panicked");
            panic::resume_unwind(payload);
        }
    }

    fn finish_settle(&self, outcome: Result<T, E>) {
        let wakers = {
            let mut inner = self.lock();
            inner.state = State::Settled(outcome);
            std::mem::take(&mut inner.wakers)
        };
        self.done.notify_all();
        for (_, waker) in wakers {
            waker.wake()
        }
    }
}

impl<T, E> Inner<T, E> {
    pub(crate) fn response(&self) -> Option<Response<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        match self.state {
            State::Settled(ref outcome) => Some(outcome.clone().map_err(Error::Rejected)),
            _ => None,
        }
    }
}

impl<T, E> Default for SettlablePromise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for SettlablePromise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("SettlablePromise")
            .field("state", &inner.state.name())
            .field("waiters", &inner.wakers.len())
            .finish()
    }
}
