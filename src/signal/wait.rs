//! Waiting on expectations with a deadline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use super::registry::{next_waiter_id, SignalState};
use super::Expectation;
use crate::error::{Error, Result};

/// Timeout used by a [`Waiter`] unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for waiting on a set of expectations.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use testkit_observe::signal::{Expectation, Waiter};
///
/// let first = Expectation::new("first");
/// let second = Expectation::new("second");
/// first.fulfill();
/// second.fulfill();
///
/// Waiter::new()
///     .timeout(Duration::from_millis(100))
///     .enforce_order()
///     .wait([&first, &second])
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Waiter {
    /// How long to wait before giving up.
    pub timeout: Duration,
    /// Require expectations to be fulfilled in the order they are listed.
    pub enforce_order: bool,
}

impl Default for Waiter {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            enforce_order: false,
        }
    }
}

impl Waiter {
    /// Create a waiter with the default timeout and no order enforcement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require fulfillment in listed order.
    #[must_use]
    pub fn enforce_order(mut self) -> Self {
        self.enforce_order = true;
        self
    }

    /// Block until every expectation is fulfilled or the timeout elapses.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] listing every expectation still pending at the deadline.
    /// - [`Error::OutOfOrder`] if order is enforced and two expectations were
    ///   fulfilled the wrong way round.
    pub fn wait<'a>(&self, signals: impl IntoIterator<Item = &'a Expectation>) -> Result<()> {
        let signals: Vec<&Expectation> = signals.into_iter().collect();
        // A timeout too large to represent as an instant means no deadline.
        let deadline = Instant::now().checked_add(self.timeout);

        let unfulfilled: Vec<String> = signals
            .iter()
            .filter(|signal| !signal.state().wait_until(deadline))
            .map(|signal| signal.description().to_string())
            .collect();

        if !unfulfilled.is_empty() {
            tracing::debug!(
                timeout = ?self.timeout,
                pending = unfulfilled.len(),
                "expectations timed out"
            );
            return Err(Error::timeout(self.timeout, unfulfilled));
        }

        if self.enforce_order {
            for pair in signals.windows(2) {
                if pair[0].sequence() > pair[1].sequence() {
                    return Err(Error::out_of_order(
                        pair[0].description(),
                        pair[1].description(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Block until every expectation is fulfilled or `timeout` elapses.
///
/// # Errors
///
/// Returns [`Error::Timeout`] listing the expectations still pending.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use testkit_observe::signal::{wait_all, Expectation};
///
/// let never = Expectation::new("never fulfilled");
/// let err = wait_all([&never], Duration::from_millis(10)).unwrap_err();
/// assert!(err.is_timeout());
/// ```
pub fn wait_all<'a>(
    signals: impl IntoIterator<Item = &'a Expectation>,
    timeout: Duration,
) -> Result<()> {
    Waiter::new().timeout(timeout).wait(signals)
}

/// A future that resolves once every expectation is fulfilled.
///
/// It never times out by itself; wrap it in the runtime's timeout, e.g.
/// `tokio::time::timeout`.
pub fn wait_all_async<'a>(signals: impl IntoIterator<Item = &'a Expectation>) -> WaitAll {
    WaitAll {
        pending: signals
            .into_iter()
            .map(|signal| Arc::clone(signal.state()))
            .collect(),
        waiter: next_waiter_id(),
    }
}

/// Future returned by [`wait_all_async`].
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct WaitAll {
    pending: Vec<Arc<SignalState>>,
    waiter: u64,
}

impl WaitAll {
    /// Number of expectations not yet observed as fulfilled.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl Future for WaitAll {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let waiter = this.waiter;
        this.pending.retain(|state| !state.poll_fulfilled(waiter, cx.waker()));
        if this.pending.is_empty() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for WaitAll {
    fn drop(&mut self) {
        for state in &self.pending {
            state.forget_waiter(self.waiter);
        }
    }
}
