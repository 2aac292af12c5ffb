//! # testkit-observe
//!
//! > Observable test doubles for callback-based async collaborators
//!
//! A completion firing at the top of a call stack says nothing about whether a
//! dependency further down was handed the right value, in the right order, or
//! at all. **testkit-observe** wraps such a dependency in an
//! [`ObservableInterceptor`] that forwards every call to the real
//! implementation and lets the test wait for the values it actually produced.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use testkit_observe::prelude::*;
//!
//! struct Store;
//!
//! impl Capability for Store {
//!     type Value = String;
//!     type Error = String;
//!
//!     fn perform(&self, value: String, completion: Completion<String>) {
//!         if value.is_empty() {
//!             completion(Err("empty".to_string()));
//!         } else {
//!             completion(Ok(()));
//!         }
//!     }
//! }
//!
//! let store = ObservableInterceptor::new(Store);
//! let saved_a = store.expect_on_match(|v| v == "A");
//! let saved_b = store.expect_on_match(|v| v == "B");
//!
//! // Code under test drives the interceptor as if it were the real store.
//! store.perform("B".to_string(), Box::new(|_| {}));
//! store.perform("A".to_string(), Box::new(|_| {}));
//!
//! wait_all([&saved_a, &saved_b], Duration::from_secs(1)).unwrap();
//! ```
//!
//! ## Features
//!
//! - **Transparent forwarding** - Outcomes, including errors, reach the caller unchanged
//! - **Chained expectations** - Any number of predicates, none clobbering another
//! - **Non-owning signals** - Dropped expectations are tolerated, never leaked
//! - **Inline notification** - No extra thread hop between a result and its signal

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod error;
pub mod mock;
pub mod signal;

/// Prelude for convenient imports
///
/// ```rust
/// use testkit_observe::prelude::*;
/// ```
pub mod prelude {
    pub use crate::capability::{Capability, CapabilityExt, Completion};
    pub use crate::error::{Error, Result};
    pub use crate::mock::{ObservableInterceptor, ObserverChain, PerformStats};
    pub use crate::signal::{wait_all, wait_all_async, Expectation, Waiter};
}

// Re-exports
pub use error::{Error, Result};
pub use mock::ObservableInterceptor;
