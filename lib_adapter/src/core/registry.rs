//! # Active Request Registry
//!
//! A bounded, insertion-ordered set of request fingerprints. Every incoming
//! client request re-registers its fingerprint; the background refresh loop
//! walks a snapshot of the set each pass. Eviction is strict FIFO: when a new,
//! distinct fingerprint would exceed capacity, the oldest-inserted entry goes,
//! regardless of how often it was looked up or re-registered since. Entries
//! stay alive by being re-registered on each incoming request, not by having
//! their position refreshed.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use crate::error::AdapterError;

struct Inner {
    order: VecDeque<String>,
    members: HashSet<String>,
}

/// Bounded FIFO set of active request fingerprints.
///
/// One instance per data source; pull and push bookkeeping never share a set.
pub struct Registry {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Registry {
    /// Creates a registry holding at most `capacity` fingerprints.
    ///
    /// Capacity must be at least 1; a zero-capacity registry could never hold
    /// the request that is being registered and is rejected outright.
    pub fn new(capacity: usize) -> Result<Self, AdapterError> {
        if capacity == 0 {
            return Err(AdapterError::Config(
                "registry capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                order: VecDeque::new(),
                members: HashSet::new(),
            }),
        })
    }

    /// Records `fingerprint` as active.
    ///
    /// Idempotent: re-registering an already-present fingerprint neither
    /// duplicates nor reorders it. When the set is full, the single
    /// oldest-inserted fingerprint is evicted first.
    pub fn register(&self, fingerprint: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if inner.members.contains(fingerprint) {
            return;
        }
        if inner.order.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.members.remove(&oldest);
                log::debug!("registry full, evicting oldest fingerprint {}", oldest);
            }
        }
        inner.order.push_back(fingerprint.to_string());
        inner.members.insert(fingerprint.to_string());
    }

    /// O(1) membership test.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .members
            .contains(fingerprint)
    }

    /// Explicitly removes a fingerprint. Eviction does not use this; it exists
    /// for callers that know a request can never be served again.
    pub fn remove(&self, fingerprint: &str) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if inner.members.remove(fingerprint) {
            inner.order.retain(|f| f != fingerprint);
        }
    }

    /// Ordered copy of the currently active fingerprints, taken under the same
    /// lock that guards mutation so a concurrent `register` can never corrupt
    /// the traversal.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .order
            .iter()
            .cloned()
            .collect()
    }

    /// Number of active fingerprints.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").order.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_zero_is_rejected() {
        assert!(Registry::new(0).is_err());
    }

    #[test]
    fn fifo_eviction_removes_the_oldest() {
        let registry = Registry::new(3).unwrap();
        for fp in ["A", "B", "C", "D"] {
            registry.register(fp);
        }
        assert!(!registry.contains("A"));
        assert!(registry.contains("B"));
        assert!(registry.contains("C"));
        assert!(registry.contains("D"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn reregistration_does_not_promote() {
        let registry = Registry::new(3).unwrap();
        registry.register("A");
        registry.register("B");
        registry.register("C");
        // A stays in its original slot despite the touch ...
        registry.register("A");
        // ... so it is still the one the next insertion evicts.
        registry.register("D");
        assert!(!registry.contains("A"));
        assert_eq!(registry.snapshot(), vec!["B", "C", "D"]);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let registry = Registry::new(8).unwrap();
        registry.register("one");
        registry.register("two");
        registry.register("one");
        registry.register("three");
        assert_eq!(registry.snapshot(), vec!["one", "two", "three"]);
    }

    #[test]
    fn remove_is_explicit_and_exact() {
        let registry = Registry::new(4).unwrap();
        registry.register("keep");
        registry.register("drop");
        registry.remove("drop");
        assert!(registry.contains("keep"));
        assert!(!registry.contains("drop"));
        assert_eq!(registry.len(), 1);
        // Removing something unknown is a no-op.
        registry.remove("never-registered");
        assert_eq!(registry.len(), 1);
    }
}
