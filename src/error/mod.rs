//! Error definitions
//!
//! This module provides error types for testkit-observe. Failures reported by a
//! wrapped capability are never converted into these; they travel through the
//! capability's own `Error` type untouched.

use std::time::Duration;

use thiserror::Error;

/// Main error type for testkit-observe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Waiting for expectations timed out
    #[error("Timed out after {waited:?} waiting for: {}", .unfulfilled.join(", "))]
    Timeout {
        /// How long the wait lasted.
        waited: Duration,
        /// Descriptions of the expectations still pending.
        unfulfilled: Vec<String>,
    },

    /// Expectations were fulfilled in a different order than required
    #[error("Expectation `{actual}` was fulfilled before `{expected}`")]
    OutOfOrder {
        /// The expectation that should have been fulfilled first.
        expected: String,
        /// The expectation that was fulfilled first instead.
        actual: String,
    },

    /// The capability dropped its completion without invoking it
    #[error("Completion was dropped without being invoked")]
    Canceled,
}

impl Error {
    /// Create a timeout error.
    #[must_use]
    pub fn timeout(waited: Duration, unfulfilled: Vec<String>) -> Self {
        Self::Timeout {
            waited,
            unfulfilled,
        }
    }

    /// Create an out-of-order error.
    #[must_use]
    pub fn out_of_order(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::OutOfOrder {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns `true` if this is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
