// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;

/// Runtime counters of a reader
#[derive(Debug, Default)]
pub struct Metrics {
    /// Number of blocks that were actually read from the source
    pub(crate) block_load_io: AtomicUsize,

    /// Number of blocks that were read from block cache
    pub(crate) block_load_cached: AtomicUsize,

    /// Number of slots that were inspected by lookups
    pub(crate) slot_probes: AtomicUsize,

    /// Number of lookups that were answered without I/O because the bucket was empty
    pub(crate) empty_bucket_hits: AtomicUsize,
}

#[allow(clippy::cast_precision_loss)]
impl Metrics {
    /// Number of blocks that were read from the source.
    pub fn block_loads_io(&self) -> usize {
        self.block_load_io.load(Relaxed)
    }

    /// Number of blocks that were accessed.
    pub fn block_loads(&self) -> usize {
        self.block_load_cached.load(Relaxed) + self.block_load_io.load(Relaxed)
    }

    /// Block cache efficiency in percent (0.0 - 1.0).
    pub fn block_cache_efficiency(&self) -> f64 {
        let queries = self.block_loads() as f64;
        let hits = self.block_load_cached.load(Relaxed) as f64;
        hits / queries
    }

    /// Number of slots that were inspected.
    pub fn slot_probes(&self) -> usize {
        self.slot_probes.load(Relaxed)
    }

    /// Number of lookups that hit an empty bucket.
    pub fn empty_bucket_hits(&self) -> usize {
        self.empty_bucket_hits.load(Relaxed)
    }
}
