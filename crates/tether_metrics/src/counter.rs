//! Named counters for tracking marshalling events
//!
//! Counters are bumped from every thread that resolves translators, so
//! each name maps to its own atomic and no increment takes a global lock.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Counter {
    counters: DashMap<&'static str, AtomicUsize>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    pub fn increment(&self, name: &'static str, value: usize) {
        // Existing names only need a shared shard lock
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(name)
            .or_default()
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters
            .get(name)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn reset_all(&self) {
        self.counters.clear();
    }

    /// Copy of every counter, sorted by name.
    pub fn snapshot(&self) -> Vec<(&'static str, usize)> {
        let mut entries: Vec<_> = self
            .counters
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_accumulates() {
        let counter = Counter::new();
        counter.increment("depot.build", 1);
        counter.increment("depot.build", 2);
        counter.increment("depot.cache_hit", 1);

        assert_eq!(counter.get("depot.build"), 3);
        assert_eq!(counter.get("missing"), 0);
        assert_eq!(
            counter.snapshot(),
            vec![("depot.build", 3), ("depot.cache_hit", 1)]
        );

        counter.reset_all();
        assert_eq!(counter.get("depot.build"), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counter = Counter::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        counter.increment("engine.subroutine", 1);
                    }
                });
            }
        });
        assert_eq!(counter.get("engine.subroutine"), 8000);
    }
}
