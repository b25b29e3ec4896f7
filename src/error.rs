/// Errors surfaced by waiting on a [`SettlablePromise`](crate::SettlablePromise).
///
/// `Canceled` belongs to the waiter that gave up; it is never stored in the
/// promise. `Rejected` carries the producer's error untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error<E> {
    #[error("promise: canceled before settlement")]
    Canceled,
    #[error("{0}")]
    Rejected(E),
}

/// What a waiter gets back: the payload or the reason it has none.
pub type Response<T, E> = Result<T, Error<E>>;

impl<E> Error<E> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }

    /// The producer's error, if this is a rejection.
    pub fn rejected(&self) -> Option<&E> {
        match self {
            Error::Rejected(err) => Some(err),
            Error::Canceled => None,
        }
    }

    pub fn into_rejected(self) -> Option<E> {
        match self {
            Error::Rejected(err) => Some(err),
            Error::Canceled => None,
        }
    }
}
