use std::fmt;

pub(crate) type ResolveHandler<T> = Box<dyn FnOnce(&T) + Send + 'static>;
pub(crate) type RejectHandler<E> = Box<dyn FnOnce(&E) + Send + 'static>;

/// Callbacks run when a promise settles.
///
/// Each list runs in registration order, exactly once, on the thread that
/// settles the promise. Handlers finish before any waiter sees the outcome.
///
/// # Examples
///
/// ```
/// use settlable_promise::{Handlers, SettlablePromise};
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = seen.clone();
/// let promise = SettlablePromise::<u32, String>::with_handlers(
///     Handlers::new().on_resolve(move |value: &u32| log.lock().unwrap().push(*value)),
/// );
/// promise.resolve(7);
/// assert_eq!(*seen.lock().unwrap(), vec![7]);
/// ```
pub struct Handlers<T, E> {
    pub(crate) resolve: Vec<ResolveHandler<T>>,
    pub(crate) reject: Vec<RejectHandler<E>>,
}

impl<T, E> Handlers<T, E> {
    pub fn new() -> Self {
        Self {
            resolve: Vec::new(),
            reject: Vec::new(),
        }
    }

    pub fn on_resolve<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.resolve.push(Box::new(handler));
        self
    }

    pub fn on_reject<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&E) + Send + 'static,
    {
        self.reject.push(Box::new(handler));
        self
    }

    /// Append `other` after the handlers already held.
    pub fn extend(&mut self, other: Handlers<T, E>) {
        self.resolve.extend(other.resolve);
        self.reject.extend(other.reject);
    }

    pub fn len(&self) -> usize {
        self.resolve.len() + self.reject.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn run_resolve(self, value: &T) {
        for handler in self.resolve {
            handler(value)
        }
    }

    pub(crate) fn run_reject(self, err: &E) {
        for handler in self.reject {
            handler(err)
        }
    }
}

impl<T, E> Default for Handlers<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Handlers<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("resolve", &self.resolve.len())
            .field("reject", &self.reject.len())
            .finish()
    }
}
