//! The callback-based capability contract that test doubles wrap.
//!
//! A [`Capability`] is a single asynchronous operation that consumes a value
//! and reports success or failure exactly once through a [`Completion`]. Saving
//! a record, uploading a blob or persisting a download are all shaped this way.
//!
//! # Example
//!
//! ```rust
//! use testkit_observe::capability::{Capability, CapabilityExt, Completion};
//!
//! struct Discard;
//!
//! impl Capability for Discard {
//!     type Value = String;
//!     type Error = std::io::Error;
//!
//!     fn perform(&self, _value: String, completion: Completion<std::io::Error>) {
//!         completion(Ok(()));
//!     }
//! }
//!
//! let outcome = futures::executor::block_on(Discard.perform_async("x".to_string()));
//! assert!(matches!(outcome, Ok(Ok(()))));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::{Error, Result};

/// Callback invoked exactly once with the outcome of a [`Capability::perform`].
pub type Completion<E> = Box<dyn FnOnce(std::result::Result<(), E>) + Send + 'static>;

/// An abstract single-method asynchronous operation.
///
/// Implementations must invoke the completion exactly once per call, on any
/// thread, either before `perform` returns or later. A failure outcome means
/// no value was durably produced.
pub trait Capability {
    /// The value handed to the operation.
    type Value;
    /// The failure reported by the operation.
    type Error;

    /// Run the operation for `value`, reporting the outcome to `completion`.
    fn perform(&self, value: Self::Value, completion: Completion<Self::Error>);
}

impl<C: Capability + ?Sized> Capability for Arc<C> {
    type Value = C::Value;
    type Error = C::Error;

    fn perform(&self, value: Self::Value, completion: Completion<Self::Error>) {
        (**self).perform(value, completion);
    }
}

impl<C: Capability + ?Sized> Capability for &C {
    type Value = C::Value;
    type Error = C::Error;

    fn perform(&self, value: Self::Value, completion: Completion<Self::Error>) {
        (**self).perform(value, completion);
    }
}

/// Future-returning adapter over the callback contract.
pub trait CapabilityExt: Capability {
    /// Perform the operation and await its outcome.
    ///
    /// Resolves to `Err(Error::Canceled)` if the implementation drops the
    /// completion without invoking it, otherwise to the implementation's own
    /// outcome.
    fn perform_async(&self, value: Self::Value) -> PerformFuture<Self::Error>
    where
        Self::Error: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.perform(
            value,
            Box::new(move |outcome| {
                // The receiver may already be gone if the caller stopped waiting.
                let _ = tx.send(outcome);
            }),
        );
        PerformFuture { rx }
    }
}

impl<C: Capability + ?Sized> CapabilityExt for C {}

/// Future returned by [`CapabilityExt::perform_async`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct PerformFuture<E> {
    rx: oneshot::Receiver<std::result::Result<(), E>>,
}

impl<E> Future for PerformFuture<E> {
    type Output = Result<std::result::Result<(), E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.map_err(|_| Error::Canceled))
    }
}
