//! A write-once promise: one producer settles it with a value or an error,
//! any number of waiters receive that outcome.
//!
//! - The first [`SettlablePromise::resolve`] or [`SettlablePromise::reject`]
//!   wins; later calls do nothing.
//! - [`Handlers`] registered before settlement run once, in order, before
//!   any waiter is released.
//! - [`SettlablePromise::wait`] races settlement against a caller supplied
//!   cancellation future. A canceled wait returns [`Error::Canceled`] to that
//!   caller only.
//!
//! ```
//! use settlable_promise::{Handlers, SettlablePromise};
//! use futures::executor::block_on;
//! use futures::future::pending;
//! use std::{sync::Arc, thread};
//!
//! let promise = Arc::new(SettlablePromise::<u32, String>::with_handlers(
//!     Handlers::new().on_resolve(|value: &u32| println!("resolved with {value}")),
//! ));
//! let waiters: Vec<_> = (0..2)
//!     .map(|_| {
//!         let promise = promise.clone();
//!         thread::spawn(move || block_on(promise.wait(pending::<()>())))
//!     })
//!     .collect();
//! promise.resolve(42);
//! for waiter in waiters {
//!     assert_eq!(waiter.join().unwrap(), Ok(42));
//! }
//! ```
pub mod error;
pub mod handlers;
pub mod settlable;
pub mod wait;

pub use error::{Error, Response};
pub use handlers::Handlers;
pub use settlable::SettlablePromise;
pub use wait::Settled;
