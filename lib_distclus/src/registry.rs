//! # Registry
//!
//! Maps descriptors to shared instances. Descriptors come from an atomic
//! counter starting at 1 and only ever grow, so a released descriptor can never
//! alias a later instance.
//!
//! The map lock is held for a single insert, lookup or removal. Callers get an
//! `Arc` clone and do their work after the lock is released, so a long call on
//! one instance never blocks lookups of another.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::ffi::c_int;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::OcError;

/// Caller-visible identity of a registered instance.
pub type Descriptor = c_int;

pub struct Registry<T: ?Sized> {
    entries: Mutex<HashMap<Descriptor, Arc<T>>>,
    next: AtomicI32,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next: AtomicI32::new(1),
        }
    }

    // Each critical section is one map operation, so a poisoned map is still consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<Descriptor, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `instance` under a fresh descriptor.
    pub fn register(&self, instance: Arc<T>) -> Result<Descriptor, OcError> {
        let descr = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map_err(|_| OcError::RegistryExhausted)?;
        self.entries().insert(descr, instance);
        tracing::debug!(descr, "registered instance");
        Ok(descr)
    }

    /// The instance behind `descr`, or `None` if it was never issued or was released.
    pub fn get(&self, descr: Descriptor) -> Option<Arc<T>> {
        self.entries().get(&descr).cloned()
    }

    /// Removes `descr`. Removing an absent descriptor is a no-op.
    pub fn unregister(&self, descr: Descriptor) -> Option<Arc<T>> {
        let removed = self.entries().remove(&descr);
        if removed.is_some() {
            tracing::debug!(descr, "unregistered instance");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Live descriptors in ascending order.
    pub fn descriptors(&self) -> Vec<Descriptor> {
        let mut descrs: Vec<Descriptor> = self.entries().keys().copied().collect();
        descrs.sort_unstable();
        descrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_register_is_strictly_increasing() {
        let registry: Registry<u32> = Registry::new();
        let d0 = registry.register(Arc::new(0)).unwrap();
        let d1 = registry.register(Arc::new(1)).unwrap();
        assert!(d0 >= 1);
        assert!(d1 > d0, "expected greater than {} got {}", d0, d1);

        registry.unregister(d1);
        let d2 = registry.register(Arc::new(2)).unwrap();
        assert!(d2 > d1, "released descriptor {} was reused", d1);
    }

    #[test]
    fn test_get_returns_distinct_instances() {
        let registry: Registry<String> = Registry::new();
        let d0 = registry.register(Arc::new("a".to_string())).unwrap();
        let d1 = registry.register(Arc::new("b".to_string())).unwrap();

        let a0 = registry.get(d0).expect("expected instance got none");
        let a1 = registry.get(d1).expect("expected instance got none");
        assert!(!Arc::ptr_eq(&a0, &a1));
        assert_eq!(*a0, "a");
        assert_eq!(*a1, "b");
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry: Registry<u32> = Registry::new();
        let d0 = registry.register(Arc::new(7)).unwrap();
        assert!(registry.unregister(d0).is_some());
        assert!(registry.get(d0).is_none());
        assert!(registry.unregister(d0).is_none());
        assert!(registry.get(12345).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration_issues_unique_descriptors() {
        let registry: Arc<Registry<usize>> = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..100)
                        .map(|i| registry.register(Arc::new(t * 100 + i)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for h in handles {
            let issued = h.join().unwrap();
            assert!(issued.windows(2).all(|w| w[0] < w[1]));
        }
        let descrs = registry.descriptors();
        assert_eq!(descrs.len(), 800);
        assert!(descrs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_exhausted_counter_is_reported() {
        let registry: Registry<u32> = Registry::new();
        registry.next.store(c_int::MAX, Ordering::SeqCst);
        assert!(matches!(registry.register(Arc::new(1)), Err(OcError::RegistryExhausted)));
    }
}
