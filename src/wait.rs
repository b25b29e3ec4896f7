//! Waiting for a [`SettlablePromise`] to settle.
//!
//! Waiters register a [`Waker`] (async) or park on the promise's condition
//! variable (blocking). Settlement wakes all of them at once.
use futures::future::{self, Either};
use std::{
    future::Future,
    pin::{pin, Pin},
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tracing::debug;

use crate::settlable::State;
use crate::{Error, Response, SettlablePromise};

/// Resolves to the promise's outcome once it settles. Never cancels.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Settled<'a, T, E> {
    promise: &'a SettlablePromise<T, E>,
    key: Option<u64>,
}

impl<T: Clone, E: Clone> Future for Settled<'_, T, E> {
    type Output = Response<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut inner = this.promise.lock();
        if let Some(response) = inner.response() {
            return Poll::Ready(response);
        }
        let slot = this
            .key
            .and_then(|key| inner.wakers.iter().position(|(k, _)| *k == key));
        match slot {
            Some(index) => {
                let waker = &mut inner.wakers[index].1;
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => {
                let key = inner.next_key;
                inner.next_key += 1;
                inner.wakers.push((key, cx.waker().clone()));
                this.key = Some(key);
            }
        }
        Poll::Pending
    }
}

impl<T, E> Drop for Settled<'_, T, E> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.promise.lock().wakers.retain(|(k, _)| *k != key);
        }
    }
}

impl<T, E> SettlablePromise<T, E> {
    pub fn settled(&self) -> Settled<'_, T, E> {
        Settled {
            promise: self,
            key: None,
        }
    }

    /// Wait until the promise settles or `cancel` completes, whichever is
    /// first.
    ///
    /// Cancellation only ends this wait: the promise stays pending and other
    /// waiters still get the real outcome. An already settled promise always
    /// returns its outcome, even if `cancel` is ready too.
    ///
    /// # Examples
    ///
    /// ```
    /// use settlable_promise::{Error, SettlablePromise};
    /// use futures::executor::block_on;
    /// use futures::future::{pending, ready};
    ///
    /// let promise = SettlablePromise::<u32, String>::new();
    /// assert_eq!(block_on(promise.wait(ready(()))), Err(Error::Canceled));
    ///
    /// promise.resolve(42);
    /// assert_eq!(block_on(promise.wait(pending::<()>())), Ok(42));
    /// assert_eq!(block_on(promise.wait(ready(()))), Ok(42));
    /// ```
    pub async fn wait<C>(&self, cancel: C) -> Response<T, E>
    where
        T: Clone,
        E: Clone,
        C: Future,
    {
        let cancel = pin!(cancel);
        match future::select(self.settled(), cancel).await {
            Either::Left((response, _)) => response,
            Either::Right((_, _)) => match self.try_response() {
                Some(response) => response,
                None => {
                    debug!("wait canceled before settlement");
                    Err(Error::Canceled)
                }
            },
        }
    }

    /// [`wait`](Self::wait), driven to completion on the current thread.
    pub fn wait_blocking<C>(&self, cancel: C) -> Response<T, E>
    where
        T: Clone,
        E: Clone,
        C: Future,
    {
        futures::executor::block_on(self.wait(cancel))
    }

    /// Block until the promise settles or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Response<T, E>
    where
        T: Clone,
        E: Clone,
    {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_deadline(deadline),
            None => self.wait_blocking(future::pending::<()>()),
        }
    }

    /// Block until the promise settles or `deadline` passes.
    ///
    /// A deadline in the past still returns the outcome of a settled promise.
    pub fn wait_deadline(&self, deadline: Instant) -> Response<T, E>
    where
        T: Clone,
        E: Clone,
    {
        let mut inner = self.lock();
        loop {
            if let State::Settled(ref outcome) = inner.state {
                return outcome.clone().map_err(Error::Rejected);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("wait deadline passed before settlement");
                return Err(Error::Canceled);
            }
            inner = match self.done.wait_timeout(inner, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, SettlablePromise};
    use futures::executor::block_on;
    use futures::future::{lazy, pending, poll_fn, ready};
    use std::future::Future;
    use std::sync::Arc;
    use std::task::Poll;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_cancel_is_local_to_waiter() {
        let promise = Arc::new(SettlablePromise::<String, String>::new());
        assert_eq!(block_on(promise.wait(ready(()))), Err(Error::Canceled));
        assert!(!promise.is_settled());

        let waiter = promise.clone();
        let task = thread::spawn(move || block_on(waiter.wait(pending::<()>())));
        promise.resolve("🍓".into());
        let response = task.join().expect("The waiter thread has panicked");
        assert_eq!(response, Ok("🍓".to_string()));
    }

    #[test]
    fn test_settled_beats_ready_cancel() {
        let promise = SettlablePromise::<(), String>::new();
        promise.reject("reject!!".into());
        let response = block_on(promise.wait(ready(())));
        assert_eq!(response, Err(Error::Rejected("reject!!".to_string())));
    }

    #[test]
    fn test_settled_during_cancel_returns_outcome() {
        let promise = SettlablePromise::<u8, ()>::new();
        let cancel = lazy(|_| {
            promise.resolve(5);
        });
        assert_eq!(block_on(promise.wait(cancel)), Ok(5));
    }

    #[test]
    fn test_canceled_waits_deregister() {
        let promise = Arc::new(SettlablePromise::<u8, ()>::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let waiter = promise.clone();
                thread::spawn(move || block_on(waiter.wait(ready(()))))
            })
            .collect();
        for task in tasks {
            let response = task.join().expect("The waiter thread has panicked");
            assert_eq!(response, Err(Error::Canceled));
        }
        assert_eq!(format!("{:?}", promise), "SettlablePromise { state: \"pending\", waiters: 0 }");
    }

    #[test]
    fn test_repolled_waiter_registers_once() {
        let promise = SettlablePromise::<u8, ()>::new();
        let mut settled = Box::pin(promise.settled());
        block_on(poll_fn(|cx| {
            assert!(settled.as_mut().poll(cx).is_pending());
            assert!(settled.as_mut().poll(cx).is_pending());
            Poll::Ready(())
        }));
        assert_eq!(promise.lock().wakers.len(), 1);
        drop(settled);
        assert!(promise.lock().wakers.is_empty());
    }

    #[test]
    fn test_settled_future() {
        let promise = Arc::new(SettlablePromise::<u8, ()>::new());
        let waiter = promise.clone();
        let task = thread::spawn(move || block_on(waiter.settled()));
        thread::sleep(Duration::from_millis(20));
        promise.resolve(3);
        assert_eq!(task.join().expect("The waiter thread has panicked"), Ok(3));
    }

    #[test]
    fn test_wait_timeout_pending() {
        let promise = SettlablePromise::<u8, ()>::new();
        let start = Instant::now();
        assert_eq!(promise.wait_timeout(Duration::from_millis(50)), Err(Error::Canceled));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!promise.is_settled());
    }

    #[test]
    fn test_wait_deadline_passed_but_settled() {
        let promise = SettlablePromise::<u8, ()>::new();
        promise.resolve(1);
        assert_eq!(promise.wait_deadline(Instant::now()), Ok(1));
    }

    #[test]
    fn test_wait_timeout_wakes_on_settlement() {
        let promise = Arc::new(SettlablePromise::<u8, &str>::new());
        let waiter = promise.clone();
        let task = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(20));
        promise.reject("late");
        let response = task.join().expect("The waiter thread has panicked");
        assert_eq!(response, Err(Error::Rejected("late")));
    }

    #[test]
    fn test_wait_blocking() {
        let promise = SettlablePromise::<u8, ()>::new();
        promise.resolve(5);
        assert_eq!(promise.wait_blocking(pending::<()>()), Ok(5));
    }
}
