//! Newest-first chain of observers, one per registered expectation.
//!
//! Each registration prepends a link whose tail is the previous head, so
//! earlier links are never replaced or mutated. When a value arrives every
//! link runs its own observer and then hands the value to the link before it,
//! ending at a terminal no-op link.
//!
//! # Example
//!
//! ```rust
//! use testkit_observe::mock::ObserverChain;
//!
//! let chain = ObserverChain::<&str>::new();
//! let a = chain.expect_on_match(|v| *v == "A");
//! let b = chain.expect_on_match(|v| *v == "B");
//!
//! chain.notify(&"A");
//!
//! assert!(a.is_fulfilled());
//! assert!(!b.is_fulfilled());
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::signal::{Expectation, SignalRegistry};

type Observer<V> = Box<dyn Fn(&V) + Send + Sync>;

/// One node of the chain: a side effect plus the link registered before it.
struct ObserverLink<V> {
    observe: Observer<V>,
    previous: Option<Arc<ObserverLink<V>>>,
}

impl<V: 'static> ObserverLink<V> {
    fn terminal() -> Self {
        Self {
            observe: Box::new(|_: &V| {}),
            previous: None,
        }
    }
}

impl<V> Drop for ObserverLink<V> {
    // Unlink iteratively so dropping a long chain does not recurse once per link.
    fn drop(&mut self) {
        let mut next = self.previous.take();
        while let Some(link) = next {
            match Arc::try_unwrap(link) {
                Ok(mut link) => next = link.previous.take(),
                Err(_) => break,
            }
        }
    }
}

struct Head<V> {
    link: Arc<ObserverLink<V>>,
    depth: usize,
}

/// Chain of predicate-guarded expectations.
///
/// Registration is meant to happen before the values under test are produced.
/// A registration racing an in-flight [`notify`](Self::notify) is memory-safe
/// but unspecified: the new link may or may not see that value.
pub struct ObserverChain<V> {
    head: RwLock<Head<V>>,
    registry: Arc<SignalRegistry>,
}

impl<V: 'static> ObserverChain<V> {
    /// Create a chain holding only the terminal no-op link.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: RwLock::new(Head {
                link: Arc::new(ObserverLink::terminal()),
                depth: 0,
            }),
            registry: Arc::new(SignalRegistry::new()),
        }
    }

    /// Register an expectation fulfilled by the first value matching `predicate`.
    ///
    /// The returned expectation is owned by the caller; the chain keeps only a
    /// non-owning key to it. Dropping it early is fine, its link then does
    /// nothing but forward.
    pub fn expect_on_match<P>(&self, predicate: P) -> Expectation
    where
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let description = format!("expectation #{}", self.len() + 1);
        self.expect_described(description, predicate)
    }

    /// Like [`expect_on_match`](Self::expect_on_match), with a description
    /// reported when a wait on it times out.
    pub fn expect_described<P>(&self, description: impl Into<String>, predicate: P) -> Expectation
    where
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let (expectation, key) = Expectation::registered(description, &self.registry);
        let registry = Arc::clone(&self.registry);

        let mut head = self.head.write();
        let previous = Arc::clone(&head.link);
        head.link = Arc::new(ObserverLink {
            observe: Box::new(move |value: &V| {
                if predicate(value) {
                    registry.fulfill(key);
                }
            }),
            previous: Some(previous),
        });
        head.depth += 1;

        tracing::trace!(
            %key,
            description = expectation.description(),
            depth = head.depth,
            "expectation registered"
        );
        expectation
    }

    /// Expect a value equal to `expected`.
    pub fn expect_value(&self, expected: V) -> Expectation
    where
        V: PartialEq + Debug + Send + Sync,
    {
        let description = format!("value == {expected:?}");
        self.expect_described(description, move |value| *value == expected)
    }

    /// Expect any successfully produced value.
    pub fn expect_any(&self) -> Expectation {
        self.expect_described("any value", |_| true)
    }

    /// Run every link, newest first, with `value`.
    pub fn notify(&self, value: &V) {
        let head = Arc::clone(&self.head.read().link);
        let mut link: &ObserverLink<V> = &head;
        loop {
            (link.observe)(value);
            match &link.previous {
                Some(previous) => link = &**previous,
                None => break,
            }
        }
    }

    /// Number of registered expectations, not counting the terminal link.
    #[must_use]
    pub fn len(&self) -> usize {
        self.head.read().depth
    }

    /// Returns `true` if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry holding the signals of live expectations.
    #[must_use]
    pub fn registry(&self) -> &Arc<SignalRegistry> {
        &self.registry
    }
}

impl<V: 'static> Default for ObserverChain<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for ObserverChain<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverChain")
            .field("depth", &self.head.read().depth)
            .field("live_expectations", &self.registry.live_count())
            .finish()
    }
}
