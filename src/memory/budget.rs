//! # Cache Budget
//!
//! Advisory byte budget for the in-memory name-index cache. The budget does
//! not fail allocations; the index consults [`CacheBudget::would_exceed`]
//! before growing its cache and the future eviction policy uses the same
//! accounting to decide what to drop.
//!
//! ## Auto-Detection
//!
//! With no explicit limit the budget claims half of the host's available
//! memory at first use, clamped to a floor so the cache stays functional on
//! small hosts. The probe runs once per process; single-board deployments
//! open several volumes and must not pay a sysinfo refresh per store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use sysinfo::System;

use crate::config::{DEFAULT_BUDGET_DIVISOR, MIN_BUDGET_FLOOR};

static HOST_AVAILABLE_MEMORY: OnceLock<usize> = OnceLock::new();

#[derive(Debug)]
pub struct CacheBudget {
    limit: usize,
    used: AtomicUsize,
}

impl CacheBudget {
    /// Budget of half the host's currently available memory.
    pub fn auto_detect() -> Self {
        let available = *HOST_AVAILABLE_MEMORY.get_or_init(|| {
            let mut sys = System::new();
            sys.refresh_memory();
            sys.available_memory() as usize
        });

        Self::with_limit(available / DEFAULT_BUDGET_DIVISOR)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(MIN_BUDGET_FLOOR),
            used: AtomicUsize::new(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// True when charging `bytes` would push usage past the limit.
    pub fn would_exceed(&self, bytes: usize) -> bool {
        self.used() + bytes > self.limit
    }

    pub fn charge(&self, bytes: usize) {
        self.used.fetch_add(bytes, Ordering::AcqRel);
    }

    pub fn release(&self, bytes: usize) {
        let mut current = self.used.load(Ordering::Acquire);
        loop {
            let next = current.saturating_sub(bytes);
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self::auto_detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_detect_respects_floor() {
        let budget = CacheBudget::auto_detect();
        assert!(budget.limit() >= MIN_BUDGET_FLOOR);
    }

    #[test]
    fn with_limit_clamps_to_floor() {
        let budget = CacheBudget::with_limit(1000);
        assert_eq!(budget.limit(), MIN_BUDGET_FLOOR);
    }

    #[test]
    fn charge_and_release_balance() {
        let budget = CacheBudget::with_limit(MIN_BUDGET_FLOOR);
        budget.charge(4096);
        budget.charge(4096);
        budget.release(4096);
        assert_eq!(budget.used(), 4096);
    }

    #[test]
    fn release_saturates_at_zero() {
        let budget = CacheBudget::with_limit(MIN_BUDGET_FLOOR);
        budget.release(1024);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn would_exceed_tracks_limit() {
        let budget = CacheBudget::with_limit(MIN_BUDGET_FLOOR);
        assert!(!budget.would_exceed(MIN_BUDGET_FLOOR));
        budget.charge(MIN_BUDGET_FLOOR);
        assert!(budget.would_exceed(1));
    }
}
