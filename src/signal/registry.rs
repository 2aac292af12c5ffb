//! Registry of live signals addressed by non-owning keys.
//!
//! Observer links never hold an [`Expectation`](super::Expectation). They hold
//! a [`SignalKey`] into a [`SignalRegistry`]. The expectation removes its slot
//! when the test drops it, so a key whose expectation is gone resolves to
//! nothing and the link quietly no-ops.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Process-wide fulfillment counter, used to compare fulfillment order.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

static NEXT_WAITER: AtomicU64 = AtomicU64::new(1);

/// Allocates an id under which a future parks its waker.
pub(crate) fn next_waiter_id() -> u64 {
    NEXT_WAITER.fetch_add(1, Ordering::Relaxed)
}

/// Shared state behind one waitable signal.
pub(crate) struct SignalState {
    description: String,
    inner: Mutex<SignalInner>,
    fulfilled: Condvar,
}

#[derive(Default)]
struct SignalInner {
    /// Fulfillment sequence number, `None` while pending.
    sequence: Option<u64>,
    /// Wakers of futures waiting on this signal, keyed by waiter id.
    wakers: Vec<(u64, Waker)>,
}

impl SignalState {
    pub(crate) fn new(description: String) -> Self {
        Self {
            description,
            inner: Mutex::new(SignalInner::default()),
            fulfilled: Condvar::new(),
        }
    }

    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    /// Transitions `pending -> signaled`.
    ///
    /// Returns `false` if the signal was already fulfilled.
    pub(crate) fn fulfill(&self) -> bool {
        let wakers = {
            let mut inner = self.inner.lock();
            if inner.sequence.is_some() {
                return false;
            }
            inner.sequence = Some(NEXT_SEQUENCE.fetch_add(1, Ordering::SeqCst));
            std::mem::take(&mut inner.wakers)
        };
        self.fulfilled.notify_all();
        for (_, waker) in wakers {
            waker.wake();
        }
        true
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.inner.lock().sequence.is_some()
    }

    pub(crate) fn sequence(&self) -> Option<u64> {
        self.inner.lock().sequence
    }

    /// Blocks until fulfilled or `deadline` passes. Returns whether fulfilled.
    ///
    /// A `None` deadline waits without limit.
    pub(crate) fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut inner = self.inner.lock();
        while inner.sequence.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.fulfilled.wait_until(&mut inner, deadline).timed_out() {
                        return inner.sequence.is_some();
                    }
                }
                None => self.fulfilled.wait(&mut inner),
            }
        }
        true
    }

    /// Returns `true` if fulfilled, otherwise parks `waker` under `waiter`.
    ///
    /// Each waiter keeps at most one waker; a later poll replaces it.
    pub(crate) fn poll_fulfilled(&self, waiter: u64, waker: &Waker) -> bool {
        let mut inner = self.inner.lock();
        if inner.sequence.is_some() {
            return true;
        }
        match inner.wakers.iter().position(|(id, _)| *id == waiter) {
            Some(index) => {
                let parked = &mut inner.wakers[index].1;
                if !parked.will_wake(waker) {
                    parked.clone_from(waker);
                }
            }
            None => inner.wakers.push((waiter, waker.clone())),
        }
        false
    }

    /// Drops the waker parked under `waiter`, if any.
    pub(crate) fn forget_waiter(&self, waiter: u64) {
        self.inner.lock().wakers.retain(|(id, _)| *id != waiter);
    }

    #[cfg(test)]
    pub(crate) fn parked_wakers(&self) -> usize {
        self.inner.lock().wakers.len()
    }
}

impl fmt::Debug for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalState")
            .field("description", &self.description)
            .field("sequence", &self.sequence())
            .finish()
    }
}

/// Non-owning handle to a signal slot.
///
/// Keys are generation-checked: once a slot is unregistered and reused, keys
/// handed out for the old occupant no longer resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalKey {
    index: usize,
    generation: u64,
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// What happened when a key was fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillOutcome {
    /// The signal moved from pending to signaled.
    Fulfilled,
    /// The signal had been signaled before; nothing changed.
    AlreadyFulfilled,
    /// The expectation behind the key was dropped.
    Gone,
}

struct Slot {
    generation: u64,
    state: Option<Arc<SignalState>>,
}

/// Arena of live signals.
///
/// Each [`ObserverChain`](crate::mock::ObserverChain) owns one; reach it
/// through [`ObserverChain::registry`](crate::mock::ObserverChain::registry).
pub struct SignalRegistry {
    slots: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    entries: Vec<Slot>,
    free: Vec<usize>,
}

impl SignalRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
        }
    }

    pub(crate) fn register(&self, state: Arc<SignalState>) -> SignalKey {
        let mut slots = self.slots.lock();
        if let Some(index) = slots.free.pop() {
            let slot = &mut slots.entries[index];
            slot.state = Some(state);
            SignalKey {
                index,
                generation: slot.generation,
            }
        } else {
            let index = slots.entries.len();
            slots.entries.push(Slot {
                generation: 0,
                state: Some(state),
            });
            SignalKey {
                index,
                generation: 0,
            }
        }
    }

    pub(crate) fn unregister(&self, key: SignalKey) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.entries.get_mut(key.index) else {
            return;
        };
        if slot.generation != key.generation || slot.state.is_none() {
            return;
        }
        slot.state = None;
        slot.generation += 1;
        slots.free.push(key.index);
    }

    fn resolve(&self, key: SignalKey) -> Option<Arc<SignalState>> {
        let slots = self.slots.lock();
        slots
            .entries
            .get(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.state.clone())
    }

    /// Signals the expectation behind `key`, if it still exists.
    pub fn fulfill(&self, key: SignalKey) -> FulfillOutcome {
        let outcome = match self.resolve(key) {
            Some(state) if state.fulfill() => FulfillOutcome::Fulfilled,
            Some(_) => FulfillOutcome::AlreadyFulfilled,
            None => FulfillOutcome::Gone,
        };
        tracing::trace!(%key, ?outcome, "signal fulfill");
        outcome
    }

    /// Returns `true` if the expectation behind `key` is still alive.
    #[must_use]
    pub fn contains(&self, key: SignalKey) -> bool {
        self.resolve(key).is_some()
    }

    /// Number of expectations currently registered.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let slots = self.slots.lock();
        slots.entries.len() - slots.free.len()
    }
}

impl fmt::Debug for SignalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRegistry")
            .field("live_count", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(description: &str) -> Arc<SignalState> {
        Arc::new(SignalState::new(description.to_string()))
    }

    #[test]
    fn test_register_and_fulfill() {
        let registry = SignalRegistry::new();
        let s = state("a");
        let key = registry.register(Arc::clone(&s));

        assert_eq!(registry.live_count(), 1);
        assert!(!s.is_fulfilled());

        assert_eq!(registry.fulfill(key), FulfillOutcome::Fulfilled);
        assert!(s.is_fulfilled());
        assert_eq!(registry.fulfill(key), FulfillOutcome::AlreadyFulfilled);
    }

    #[test]
    fn test_unregistered_key_is_gone() {
        let registry = SignalRegistry::new();
        let s = state("a");
        let key = registry.register(Arc::clone(&s));

        registry.unregister(key);

        assert_eq!(registry.live_count(), 0);
        assert!(!registry.contains(key));
        assert_eq!(registry.fulfill(key), FulfillOutcome::Gone);
        assert!(!s.is_fulfilled());
    }

    #[test]
    fn test_reused_slot_rejects_stale_key() {
        let registry = SignalRegistry::new();
        let old = registry.register(state("old"));
        registry.unregister(old);

        let fresh_state = state("fresh");
        let fresh = registry.register(Arc::clone(&fresh_state));

        assert_ne!(old, fresh);
        assert_eq!(registry.fulfill(old), FulfillOutcome::Gone);
        assert!(!fresh_state.is_fulfilled());
        assert_eq!(registry.fulfill(fresh), FulfillOutcome::Fulfilled);
    }

    #[test]
    fn test_double_unregister_is_harmless() {
        let registry = SignalRegistry::new();
        let key = registry.register(state("a"));
        registry.unregister(key);
        registry.unregister(key);
        assert_eq!(registry.live_count(), 0);

        registry.register(state("b"));
        registry.register(state("c"));
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let first = state("first");
        let second = state("second");
        second.fulfill();
        first.fulfill();
        assert!(second.sequence().unwrap() < first.sequence().unwrap());
    }

    #[test]
    fn test_poll_fulfilled_registers_waker_once() {
        let s = state("a");
        let waker = futures::task::noop_waker();
        let waiter = next_waiter_id();

        assert!(!s.poll_fulfilled(waiter, &waker));
        assert!(!s.poll_fulfilled(waiter, &waker));
        assert_eq!(s.inner.lock().wakers.len(), 1);

        s.fulfill();
        assert!(s.poll_fulfilled(waiter, &waker));
        assert!(s.inner.lock().wakers.is_empty());
    }

    #[test]
    fn test_forget_waiter_removes_only_its_waker() {
        let s = state("a");
        let waker = futures::task::noop_waker();
        let first = next_waiter_id();
        let second = next_waiter_id();

        assert!(!s.poll_fulfilled(first, &waker));
        assert!(!s.poll_fulfilled(second, &waker));
        assert_eq!(s.inner.lock().wakers.len(), 2);

        s.forget_waiter(first);
        let parked: Vec<u64> = s.inner.lock().wakers.iter().map(|(id, _)| *id).collect();
        assert_eq!(parked, vec![second]);
    }

    #[test]
    fn test_wait_until_times_out() {
        let s = state("a");
        let deadline = Instant::now() + std::time::Duration::from_millis(10);
        assert!(!s.wait_until(Some(deadline)));
    }

    #[test]
    fn test_wait_until_without_deadline() {
        let s = state("a");
        let worker = Arc::clone(&s);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            worker.fulfill();
        });

        assert!(s.wait_until(None));
        handle.join().unwrap();
    }

    #[test]
    fn test_key_display() {
        let registry = SignalRegistry::new();
        let key = registry.register(state("a"));
        assert_eq!(key.to_string(), "#0.0");
    }
}
