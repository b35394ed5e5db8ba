//! The config store: holds the current merged snapshot.
//!
//! Readers never block on the writer. The snapshot is replaced via an atomic
//! reference swap, never mutated in place, so a reader holding an old `Arc`
//! keeps a fully valid tree for as long as it wants.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::value::Value;

/// Thread-safe holder for the current immutable snapshot.
pub struct ConfigStore {
    snapshot: ArcSwap<Value>,
    version: AtomicU64,
}

impl ConfigStore {
    /// Create a store holding `initial` as version 1.
    pub fn new(initial: Value) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(initial),
            version: AtomicU64::new(1),
        }
    }

    /// The most recently published snapshot. Lock-free and non-blocking.
    pub fn current(&self) -> Arc<Value> {
        self.snapshot.load_full()
    }

    /// Replace the stored snapshot atomically and bump the version counter.
    /// Called only by the watch coordinator. Returns the new snapshot.
    pub fn publish(&self, tree: Value) -> Arc<Value> {
        let snapshot = Arc::new(tree);
        self.snapshot.store(Arc::clone(&snapshot));
        self.version.fetch_add(1, Ordering::AcqRel);
        snapshot
    }

    /// Monotonic snapshot version, starting at 1 for the initial snapshot.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
