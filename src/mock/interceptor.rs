// Allow must_use_candidate since expectation builders are often called for their registration
#![allow(clippy::must_use_candidate)]

//! Observable interceptor wrapping a real capability.
//!
//! [`ObservableInterceptor`] forwards every call to the wrapped implementation
//! and, once a call succeeds, records the value and runs the observer chain
//! with it. Tests register expectations on the interceptor before handing it to
//! the code under test, then wait on them.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_observe::capability::{Capability, Completion};
//! use testkit_observe::mock::ObservableInterceptor;
//! use testkit_observe::signal::wait_all;
//!
//! struct Store;
//!
//! impl Capability for Store {
//!     type Value = String;
//!     type Error = std::io::Error;
//!
//!     fn perform(&self, _value: String, completion: Completion<std::io::Error>) {
//!         completion(Ok(()));
//!     }
//! }
//!
//! let store = ObservableInterceptor::new(Store);
//! let saved = store.expect_on_match(|v| v == "A");
//!
//! store.perform("A".to_string(), Box::new(|outcome| assert!(outcome.is_ok())));
//!
//! wait_all([&saved], Duration::from_secs(1)).unwrap();
//! assert_eq!(store.produced(), vec!["A".to_string()]);
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::Mutex;

use super::chain::ObserverChain;
use crate::capability::{Capability, Completion};
use crate::signal::Expectation;

/// Counts of calls made through an interceptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerformStats {
    /// Calls forwarded to the real implementation.
    pub calls: u64,
    /// Calls whose completion reported success.
    pub successes: u64,
    /// Calls whose completion reported failure.
    pub failures: u64,
}

impl PerformStats {
    /// Calls whose completion has not run yet.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.calls.saturating_sub(self.successes + self.failures)
    }
}

/// State shared between the interceptor and its in-flight completions.
struct Observed<V> {
    chain: ObserverChain<V>,
    produced: Mutex<Vec<V>>,
    stats: Mutex<PerformStats>,
}

impl<V: Clone + 'static> Observed<V> {
    fn record_success(&self, value: V) {
        self.stats.lock().successes += 1;
        self.produced.lock().push(value.clone());
        self.chain.notify(&value);
    }

    fn record_failure(&self) {
        self.stats.lock().failures += 1;
    }
}

/// Test double that forwards to a real [`Capability`] and observes its successes.
///
/// The interceptor implements [`Capability`] itself with the same value and
/// error types, so it can stand in wherever the real implementation was used.
///
/// The observer chain runs inline on whichever thread the real implementation
/// completes on, immediately after the caller's completion returns. Failed
/// calls never reach the chain.
pub struct ObservableInterceptor<C: Capability> {
    real: C,
    observed: Arc<Observed<C::Value>>,
}

impl<C> ObservableInterceptor<C>
where
    C: Capability,
    C::Value: Clone + Send + 'static,
{
    /// Wrap `real`, starting with an empty observer chain.
    pub fn new(real: C) -> Self {
        Self {
            real,
            observed: Arc::new(Observed {
                chain: ObserverChain::new(),
                produced: Mutex::new(Vec::new()),
                stats: Mutex::new(PerformStats::default()),
            }),
        }
    }

    /// Register an expectation fulfilled by the first produced value matching `predicate`.
    ///
    /// Earlier expectations keep working; the new one is consulted first.
    pub fn expect_on_match<P>(&self, predicate: P) -> Expectation
    where
        P: Fn(&C::Value) -> bool + Send + Sync + 'static,
    {
        self.observed.chain.expect_on_match(predicate)
    }

    /// Register a described expectation; the description is reported on timeout.
    pub fn expect_described<P>(&self, description: impl Into<String>, predicate: P) -> Expectation
    where
        P: Fn(&C::Value) -> bool + Send + Sync + 'static,
    {
        self.observed.chain.expect_described(description, predicate)
    }

    /// Expect a produced value equal to `expected`.
    pub fn expect_value(&self, expected: C::Value) -> Expectation
    where
        C::Value: PartialEq + Debug + Sync,
    {
        self.observed.chain.expect_value(expected)
    }

    /// Expect any successfully produced value.
    pub fn expect_any(&self) -> Expectation {
        self.observed.chain.expect_any()
    }

    /// Every successfully produced value, in completion order.
    pub fn produced(&self) -> Vec<C::Value> {
        self.observed.produced.lock().clone()
    }

    /// The most recent successfully produced value.
    pub fn last_produced(&self) -> Option<C::Value> {
        self.observed.produced.lock().last().cloned()
    }

    /// Call counts so far.
    #[must_use]
    pub fn stats(&self) -> PerformStats {
        *self.observed.stats.lock()
    }

    /// Number of expectations registered over the interceptor's lifetime.
    #[must_use]
    pub fn expectation_count(&self) -> usize {
        self.observed.chain.len()
    }

    /// Clear recorded values and counts. Registered expectations are kept.
    pub fn reset(&self) {
        self.observed.produced.lock().clear();
        *self.observed.stats.lock() = PerformStats::default();
    }

    /// The observer chain backing this interceptor.
    #[must_use]
    pub fn chain(&self) -> &ObserverChain<C::Value> {
        &self.observed.chain
    }

    /// The wrapped implementation.
    #[must_use]
    pub fn real(&self) -> &C {
        &self.real
    }

    /// Unwrap into the real implementation, discarding the chain.
    pub fn into_inner(self) -> C {
        self.real
    }
}

impl<C> Capability for ObservableInterceptor<C>
where
    C: Capability,
    C::Value: Clone + Send + 'static,
    C::Error: 'static,
{
    type Value = C::Value;
    type Error = C::Error;

    fn perform(&self, value: Self::Value, completion: Completion<Self::Error>) {
        self.observed.stats.lock().calls += 1;

        let observed = Arc::clone(&self.observed);
        let produced = value.clone();
        self.real.perform(
            value,
            Box::new(move |outcome: Result<(), C::Error>| {
                let succeeded = outcome.is_ok();
                completion(outcome);
                if succeeded {
                    observed.record_success(produced);
                } else {
                    observed.record_failure();
                }
            }),
        );
    }
}

impl<C> Debug for ObservableInterceptor<C>
where
    C: Capability + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableInterceptor")
            .field("real", &self.real)
            .field("stats", &*self.observed.stats.lock())
            .field("chain", &self.observed.chain)
            .finish()
    }
}
