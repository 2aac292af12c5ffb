//! Waitable signals for asserting that something happened.
//!
//! An [`Expectation`] starts out pending and becomes fulfilled at most once.
//! Tests wait on one or more expectations with a timeout:
//!
//! - [`wait_all`] - Block the current thread until all are fulfilled
//! - [`Waiter`] - Same, with configurable timeout and order enforcement
//! - [`wait_all_async`] - Await fulfillment from async code
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_observe::signal::{wait_all, Expectation};
//!
//! let saved = Expectation::new("value saved");
//! let worker = saved.clone();
//!
//! std::thread::spawn(move || {
//!     worker.fulfill();
//! });
//!
//! wait_all([&saved], Duration::from_secs(1)).unwrap();
//! ```

mod registry;
mod wait;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

pub use registry::{FulfillOutcome, SignalKey, SignalRegistry};
pub use wait::{wait_all, wait_all_async, WaitAll, Waiter, DEFAULT_TIMEOUT};

use crate::error::Result;
use registry::{next_waiter_id, SignalState};

/// A test-owned waitable signal.
///
/// Clones share the same state. When an expectation was created by an
/// observer chain, dropping the last clone unregisters it; the chain keeps
/// running and simply no longer has anything to signal for it.
#[derive(Clone)]
pub struct Expectation {
    handle: Arc<Handle>,
}

struct Handle {
    state: Arc<SignalState>,
    registration: Option<(Arc<SignalRegistry>, SignalKey)>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some((registry, key)) = self.registration.take() {
            registry.unregister(key);
        }
    }
}

impl Expectation {
    /// Create a free-standing expectation, fulfilled only by [`fulfill`](Self::fulfill).
    ///
    /// # Example
    ///
    /// ```rust
    /// use testkit_observe::signal::Expectation;
    ///
    /// let done = Expectation::new("done");
    /// assert!(!done.is_fulfilled());
    /// done.fulfill();
    /// assert!(done.is_fulfilled());
    /// ```
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            handle: Arc::new(Handle {
                state: Arc::new(SignalState::new(description.into())),
                registration: None,
            }),
        }
    }

    /// Create an expectation whose slot lives in `registry` until the last clone drops.
    pub(crate) fn registered(
        description: impl Into<String>,
        registry: &Arc<SignalRegistry>,
    ) -> (Self, SignalKey) {
        let state = Arc::new(SignalState::new(description.into()));
        let key = registry.register(Arc::clone(&state));
        let expectation = Self {
            handle: Arc::new(Handle {
                state,
                registration: Some((Arc::clone(registry), key)),
            }),
        };
        (expectation, key)
    }

    /// Signal the expectation.
    ///
    /// Returns `true` if this call moved it from pending to fulfilled, `false`
    /// if it was already fulfilled.
    pub fn fulfill(&self) -> bool {
        self.handle.state.fulfill()
    }

    /// Check whether the expectation has been fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.handle.state.is_fulfilled()
    }

    /// The human-readable description reported on timeout.
    #[must_use]
    pub fn description(&self) -> &str {
        self.handle.state.description()
    }

    /// The registry key, if this expectation belongs to an observer chain.
    #[must_use]
    pub fn key(&self) -> Option<SignalKey> {
        self.handle.registration.as_ref().map(|(_, key)| *key)
    }

    /// Block until fulfilled, failing with [`Error::Timeout`](crate::Error::Timeout)
    /// once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns a timeout error naming this expectation if it is still pending.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        Waiter::new().timeout(timeout).wait([self])
    }

    /// A future that resolves once the expectation is fulfilled.
    pub fn fulfilled(&self) -> Fulfilled {
        Fulfilled {
            state: Arc::clone(&self.handle.state),
            waiter: next_waiter_id(),
        }
    }

    pub(crate) fn sequence(&self) -> Option<u64> {
        self.handle.state.sequence()
    }

    pub(crate) fn state(&self) -> &Arc<SignalState> {
        &self.handle.state
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("description", &self.description())
            .field("fulfilled", &self.is_fulfilled())
            .field("key", &self.key())
            .finish()
    }
}

/// Future returned by [`Expectation::fulfilled`].
#[must_use = "futures do nothing unless polled"]
pub struct Fulfilled {
    state: Arc<SignalState>,
    waiter: u64,
}

impl Future for Fulfilled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.state.poll_fulfilled(self.waiter, cx.waker()) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for Fulfilled {
    fn drop(&mut self) {
        self.state.forget_waiter(self.waiter);
    }
}

impl fmt::Debug for Fulfilled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fulfilled")
            .field("description", &self.state.description())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_fulfill_is_terminal() {
        let e = Expectation::new("once");
        assert!(e.fulfill());
        assert!(!e.fulfill());
        assert!(e.is_fulfilled());
    }

    #[test]
    fn test_clones_share_state() {
        let e = Expectation::new("shared");
        let c = e.clone();
        c.fulfill();
        assert!(e.is_fulfilled());
    }

    #[test]
    fn test_free_standing_has_no_key() {
        let e = Expectation::new("free");
        assert!(e.key().is_none());
        assert_eq!(e.description(), "free");
    }

    #[test]
    fn test_registered_unregisters_on_last_drop() {
        let registry = Arc::new(SignalRegistry::new());
        let (e, key) = Expectation::registered("tracked", &registry);
        let c = e.clone();

        drop(e);
        assert!(registry.contains(key));

        drop(c);
        assert!(!registry.contains(key));
        assert_eq!(registry.fulfill(key), FulfillOutcome::Gone);
    }

    #[test]
    fn test_registry_fulfill_reaches_expectation() {
        let registry = Arc::new(SignalRegistry::new());
        let (e, key) = Expectation::registered("tracked", &registry);
        assert_eq!(e.key(), Some(key));

        registry.fulfill(key);
        assert!(e.is_fulfilled());
    }

    #[test]
    fn test_fulfilled_future() {
        let e = Expectation::new("future");
        let mut fut = e.fulfilled();
        assert!(fut.poll_unpin(&mut Context::from_waker(&futures::task::noop_waker())).is_pending());

        e.fulfill();
        assert!(fut.now_or_never().is_some());
    }

    #[test]
    fn test_wait_times_out_with_description() {
        let e = Expectation::new("never");
        let err = e.wait(Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("never"));
    }

    #[test]
    fn test_dropped_future_releases_its_waker() {
        let e = Expectation::new("abandoned");
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut first = e.fulfilled();
        let mut second = e.fulfilled();
        assert!(first.poll_unpin(&mut cx).is_pending());
        assert!(second.poll_unpin(&mut cx).is_pending());
        assert_eq!(e.state().parked_wakers(), 2);

        drop(first);
        assert_eq!(e.state().parked_wakers(), 1);
        drop(second);
        assert_eq!(e.state().parked_wakers(), 0);
    }

    #[test]
    fn test_wait_with_maximum_timeout() {
        let e = Expectation::new("ready");
        e.fulfill();
        e.wait(Duration::MAX).unwrap();
    }

    #[test]
    fn test_wait_on_fulfilled_returns_immediately() {
        let e = Expectation::new("ready");
        e.fulfill();
        e.wait(Duration::ZERO).unwrap();
    }

    #[tokio::test]
    async fn test_fulfilled_from_other_task() {
        let e = Expectation::new("cross-task");
        let worker = e.clone();
        tokio::spawn(async move {
            worker.fulfill();
        });
        tokio::time::timeout(Duration::from_secs(1), e.fulfilled())
            .await
            .unwrap();
    }
}
