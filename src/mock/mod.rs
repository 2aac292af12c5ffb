//! Observable test doubles for callback-based capabilities.
//!
//! This module provides the pieces a test uses to observe a collaborator:
//!
//! - [`ObservableInterceptor`] - Forwards to a real capability and observes successes
//! - [`ObserverChain`] - Newest-first chain of predicate-guarded expectations
//! - [`PerformStats`] - Call counts recorded by an interceptor
//!
//! # Chained Expectations
//!
//! ```rust
//! use testkit_observe::mock::ObserverChain;
//!
//! let chain = ObserverChain::<u32>::new();
//!
//! let even = chain.expect_on_match(|v| v % 2 == 0);
//! let big = chain.expect_on_match(|v| *v > 100);
//!
//! chain.notify(&4);
//!
//! assert!(even.is_fulfilled());
//! assert!(!big.is_fulfilled());
//! ```

mod chain;
mod interceptor;

pub use chain::ObserverChain;
pub use interceptor::{ObservableInterceptor, PerformStats};
