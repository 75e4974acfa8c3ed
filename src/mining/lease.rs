//! Exclusive mining lease
//!
//! At most one mining pass runs at a time. A pass holds a [`LeaseGuard`]
//! for its whole duration; dropping the guard releases the lease on every
//! exit path, including errors and panics.

use std::sync::atomic::{AtomicBool, Ordering};

/// The single system-wide mining token
#[derive(Debug, Default)]
pub struct MiningLease {
    held: AtomicBool,
}

impl MiningLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease if nobody holds it
    pub fn try_acquire(&self) -> Option<LeaseGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LeaseGuard { lease: self })
    }

    /// Whether a mining pass currently holds the lease
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding the mining lease
#[derive(Debug)]
pub struct LeaseGuard<'a> {
    lease: &'a MiningLease,
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.lease.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_is_exclusive() {
        let lease = MiningLease::new();
        let guard = lease.try_acquire().unwrap();
        assert!(lease.is_held());
        assert!(lease.try_acquire().is_none());

        drop(guard);
        assert!(!lease.is_held());
        assert!(lease.try_acquire().is_some());
    }

    #[test]
    fn test_lease_released_on_panic() {
        let lease = MiningLease::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lease.try_acquire().unwrap();
            panic!("mining failed");
        }));
        assert!(result.is_err());
        assert!(!lease.is_held());
    }
}
