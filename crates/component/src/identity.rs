//! Identity keys for component instances.
//!
//! Keys come from a [`KeyGenerator`] handed to each component at construction.
//! Clones of a generator share one counter, so every component built from the
//! same generator (and every duplicate of those components) gets a distinct key
//! for as long as the process runs. Keys are never reused.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

pub use shared::domain::ComponentKey;

#[derive(Debug, Clone, Default)]
pub struct KeyGenerator {
    next: Arc<AtomicU64>,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts issuing at `first`. Useful when keys must not collide with ones
    /// restored from elsewhere.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    pub fn issue(&self) -> ComponentKey {
        ComponentKey(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The value the next call to `issue` will hand out.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
