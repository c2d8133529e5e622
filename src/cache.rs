// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::source::Source;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;

/// Default block size in bytes
pub const DEFAULT_BLOCK_SIZE: u32 = 4_096;

/// Default number of cached blocks
pub const DEFAULT_BLOCK_LIMIT: usize = 1_024;

type Block = Arc<[u8]>;

/// Block cache, in which fixed-size, aligned blocks of a source are cached
/// in-memory after being read
///
/// Lookups probe many small, nearby ranges (slots, record headers, keys),
/// so caching whole blocks turns most of them into memory accesses.
///
/// Eviction is generational: blocks live in a "new" and an "old" generation.
/// When the new generation reaches half of the block limit, the old generation
/// is dropped and the new one takes its place. Blocks hit in the old
/// generation are promoted back into the new one.
pub struct BlockCache<S: Source> {
    inner: S,

    block_size: u32,
    block_limit: usize,

    fresh: crate::HashMap<u64, Block>,
    stale: crate::HashMap<u64, Block>,

    #[cfg(feature = "metrics")]
    metrics: Arc<Metrics>,
}

impl<S: Source> BlockCache<S> {
    /// Wraps a source.
    ///
    /// # Panics
    ///
    /// Panics if the block size is 0.
    #[must_use]
    pub fn new(inner: S, block_size: u32, block_limit: usize) -> Self {
        assert!(block_size > 0, "block size may not be 0");

        Self {
            inner,
            block_size,
            block_limit,
            fresh: crate::HashMap::default(),
            stale: crate::HashMap::default(),

            #[cfg(feature = "metrics")]
            metrics: Arc::default(),
        }
    }

    /// Uses shared counters.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn use_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the counters this cache updates.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Returns the block size.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Returns the number of cached blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fresh.len() + self.stale.len()
    }

    /// Returns `true` if there are no cached blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops all cached blocks.
    pub fn clear(&mut self) {
        self.fresh.clear();
        self.stale.clear();
    }

    /// Returns the wrapped source.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn insert(&mut self, idx: u64, block: Block) {
        self.fresh.insert(idx, block);

        if self.fresh.len() >= (self.block_limit / 2).max(1) {
            log::trace!(
                "Rotating block cache generations, dropping {} blocks",
                self.stale.len(),
            );

            self.stale = std::mem::take(&mut self.fresh);
        }
    }

    /// Loads a block from cache or the underlying source.
    ///
    /// The last block of the source may be shorter than the block size.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn read_block(&mut self, idx: u64) -> std::io::Result<Block> {
        #[cfg(feature = "metrics")]
        use std::sync::atomic::Ordering::Relaxed;

        if let Some(block) = self.fresh.get(&idx) {
            #[cfg(feature = "metrics")]
            self.metrics.block_load_cached.fetch_add(1, Relaxed);

            return Ok(block.clone());
        }

        if let Some(block) = self.stale.remove(&idx) {
            #[cfg(feature = "metrics")]
            self.metrics.block_load_cached.fetch_add(1, Relaxed);

            self.insert(idx, block.clone());
            return Ok(block);
        }

        let block: Block = self
            .inner
            .read(idx * u64::from(self.block_size), self.block_size as usize)?
            .into();

        #[cfg(feature = "metrics")]
        self.metrics.block_load_io.fetch_add(1, Relaxed);

        self.insert(idx, block.clone());

        Ok(block)
    }
}

impl<S: Source> Source for BlockCache<S> {
    fn open(&mut self) -> std::io::Result<()> {
        self.inner.open()
    }

    fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let block_size = u64::from(self.block_size);
        let end = start + len as u64;

        let first = start / block_size;
        let last = (end - 1) / block_size;

        let mut buf = Vec::with_capacity(len);

        for idx in first..=last {
            let block = self.read_block(idx)?;
            let block_start = idx * block_size;

            // NOTE: Offsets are < block size, which fits into usize
            #[expect(clippy::cast_possible_truncation)]
            let lo = start.saturating_sub(block_start) as usize;

            #[expect(clippy::cast_possible_truncation)]
            let hi = ((end - block_start).min(block_size) as usize).min(block.len());

            if let Some(bytes) = block.get(lo..hi) {
                buf.extend_from_slice(bytes);
            }

            // Source ended inside this block
            if block.len() < self.block_size as usize {
                break;
            }
        }

        Ok(buf)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.clear();
        self.inner.close()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use test_log::test;

    /// Counts reads that reach the source
    struct CountingSource {
        inner: MemorySource,
        reads: Vec<(u64, usize)>,
    }

    impl CountingSource {
        fn new(len: usize) -> Self {
            let bytes = (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>();
            Self {
                inner: MemorySource::new(bytes),
                reads: Vec::new(),
            }
        }
    }

    impl Source for CountingSource {
        fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>> {
            self.reads.push((start, len));
            self.inner.read(start, len)
        }
    }

    fn expected(start: usize, len: usize) -> Vec<u8> {
        (start..start + len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn block_cache_repeated_read() -> std::io::Result<()> {
        let mut cache = BlockCache::new(CountingSource::new(10_000), 4_096, 64);

        assert_eq!(expected(100, 50), cache.read(100, 50)?);
        assert_eq!(expected(100, 50), cache.read(100, 50)?);
        assert_eq!(1, cache.inner.reads.len());
        assert_eq!((0, 4_096), cache.inner.reads[0]);

        Ok(())
    }

    #[test]
    fn block_cache_spanning_read() -> std::io::Result<()> {
        let mut cache = BlockCache::new(CountingSource::new(10_000), 16, 64);

        assert_eq!(expected(10, 40), cache.read(10, 40)?);
        assert_eq!(
            vec![(0, 16), (16, 16), (32, 16), (48, 16)],
            cache.inner.reads,
        );

        // Fully covered by the cached blocks
        assert_eq!(expected(16, 32), cache.read(16, 32)?);
        assert_eq!(4, cache.inner.reads.len());

        Ok(())
    }

    #[test]
    fn block_cache_end_of_source() -> std::io::Result<()> {
        let mut cache = BlockCache::new(CountingSource::new(100), 64, 64);

        assert_eq!(expected(90, 10), cache.read(90, 10)?);
        assert_eq!(expected(60, 40), cache.read(60, 100)?);
        assert!(cache.read(200, 10)?.is_empty());

        Ok(())
    }

    #[test]
    fn block_cache_generations() -> std::io::Result<()> {
        // Rotates every 2 inserted blocks
        let mut cache = BlockCache::new(CountingSource::new(1_000), 10, 4);

        cache.read_block(0)?;
        cache.read_block(1)?;
        assert_eq!(2, cache.stale.len());
        assert!(cache.fresh.is_empty());

        // Hit in old generation is promoted, no I/O
        cache.read_block(1)?;
        assert_eq!(2, cache.inner.reads.len());
        assert!(cache.fresh.contains_key(&1));
        assert!(!cache.stale.contains_key(&1));

        // Block 2 causes a rotation, block 0 was not touched and is dropped
        cache.read_block(2)?;
        assert_eq!(3, cache.inner.reads.len());
        assert!(cache.stale.contains_key(&1));
        assert!(cache.stale.contains_key(&2));

        cache.read_block(0)?;
        assert_eq!(4, cache.inner.reads.len());
        assert_eq!((0, 10), cache.inner.reads[3]);

        Ok(())
    }

    #[test]
    fn block_cache_eviction_after_two_rotations() -> std::io::Result<()> {
        let mut cache = BlockCache::new(CountingSource::new(1_000), 10, 4);

        for idx in 0..4 {
            cache.read_block(idx)?;
        }
        assert_eq!(4, cache.inner.reads.len());

        // Blocks 2 and 3 survived in the old generation
        cache.read_block(3)?;
        assert_eq!(4, cache.inner.reads.len());

        cache.read_block(0)?;
        assert_eq!(5, cache.inner.reads.len());

        Ok(())
    }

    #[test]
    fn block_cache_clear() -> std::io::Result<()> {
        let mut cache = BlockCache::new(CountingSource::new(100), 10, 100);
        cache.read(0, 35)?;
        assert_eq!(4, cache.len());

        cache.clear();
        assert!(cache.is_empty());

        cache.read(0, 5)?;
        assert_eq!(5, cache.inner.reads.len());

        Ok(())
    }
}
