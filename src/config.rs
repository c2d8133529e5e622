// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    cache::{BlockCache, DEFAULT_BLOCK_LIMIT, DEFAULT_BLOCK_SIZE},
    format::Profile,
    hash::{DefaultHash, HashFunction, OriginalHash},
    sink::{FileSink, MemorySink, Sink, DEFAULT_HIGH_WATER_MARK},
    source::{Accessor, FileSource, MemorySource, RawSource, Source},
    Reader, Writer,
};
use std::{path::Path, sync::Arc};

/// Database configuration
///
/// The file does not record its profile or hash function,
/// so readers need to use the same configuration as the writer.
#[derive(Clone)]
pub struct Config {
    /// Field width profile
    pub profile: Profile,

    /// Hash function, if not set, the profile's default is used
    hash_function: Option<Arc<dyn HashFunction>>,

    /// Block size of the read cache
    pub block_size: u32,

    /// Maximum number of cached blocks
    pub cache_block_limit: usize,

    /// Whether reads go through a block cache
    pub use_cache: bool,

    /// Buffered bytes after which a sink asks to be drained
    pub high_water_mark: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("profile", &self.profile)
            .field("custom_hash_function", &self.hash_function.is_some())
            .field("block_size", &self.block_size)
            .field("cache_block_limit", &self.cache_block_limit)
            .field("use_cache", &self.use_cache)
            .field("high_water_mark", &self.high_water_mark)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Profile::Classic,
            hash_function: None,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_block_limit: DEFAULT_BLOCK_LIMIT,
            use_cache: true,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl Config {
    /// Creates a configuration using the classic (32-bit) profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration using the extended (64-bit) profile.
    #[must_use]
    pub fn extended() -> Self {
        Self::default().profile(Profile::Extended)
    }

    /// Sets the field width profile.
    ///
    /// Defaults to [`Profile::Classic`].
    #[must_use]
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the hash function.
    ///
    /// Defaults to [`OriginalHash`] for the classic profile
    /// and [`DefaultHash`] for the extended profile.
    #[must_use]
    pub fn hash_function<H: HashFunction + 'static>(mut self, hash_function: H) -> Self {
        self.hash_function = Some(Arc::new(hash_function));
        self
    }

    /// Sets the block size of the read cache.
    ///
    /// Defaults to 4 KiB.
    ///
    /// # Panics
    ///
    /// Panics if the block size is 0.
    #[must_use]
    pub fn block_size(mut self, bytes: u32) -> Self {
        assert!(bytes > 0, "block size may not be 0");

        self.block_size = bytes;
        self
    }

    /// Sets the maximum number of cached blocks.
    ///
    /// Defaults to 1024.
    #[must_use]
    pub fn cache_block_limit(mut self, blocks: usize) -> Self {
        self.cache_block_limit = blocks;
        self
    }

    /// If `false`, every read goes directly to the source.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Sets the amount of buffered bytes after which the sinks created by
    /// [`Config::create`] and [`Config::create_in_memory`] signal backpressure.
    ///
    /// Defaults to 64 KiB.
    #[must_use]
    pub fn high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes;
        self
    }

    /// Returns the configured hash function.
    #[must_use]
    pub fn hasher(&self) -> Arc<dyn HashFunction> {
        match (&self.hash_function, self.profile) {
            (Some(hash_function), _) => hash_function.clone(),
            (None, Profile::Classic) => Arc::new(OriginalHash),
            (None, Profile::Extended) => Arc::new(DefaultHash),
        }
    }

    /// Creates (or truncates) a database file and opens a writer for it.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn create<P: AsRef<Path>>(&self, path: P) -> crate::Result<Writer<FileSink>> {
        let sink = FileSink::new(path).use_high_water_mark(self.high_water_mark);
        self.create_with_sink(sink)
    }

    /// Opens a writer that builds the database in memory.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn create_in_memory(&self) -> crate::Result<Writer<MemorySink>> {
        let sink = MemorySink::new().use_high_water_mark(self.high_water_mark);
        self.create_with_sink(sink)
    }

    /// Opens a writer on a caller-supplied sink.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the sink cannot be opened.
    pub fn create_with_sink<S: Sink>(&self, sink: S) -> crate::Result<Writer<S>> {
        Writer::new(sink, self.profile, self.hasher())
    }

    /// Opens a database file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the header is invalid.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> crate::Result<Reader> {
        log::debug!("Opening database at {}", path.as_ref().display());
        self.open_source(RawSource::File(FileSource::new(path)))
    }

    /// Opens a database held in memory.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the header is invalid.
    pub fn open_bytes<B: Into<Arc<[u8]>>>(&self, bytes: B) -> crate::Result<Reader> {
        self.open_source(RawSource::Memory(MemorySource::new(bytes)))
    }

    /// Opens a database from any source.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the header is invalid.
    pub fn open_source<S: Source>(&self, source: S) -> crate::Result<Reader<S>> {
        let accessor = if self.use_cache {
            Accessor::Cached(BlockCache::new(
                source,
                self.block_size,
                self.cache_block_limit,
            ))
        } else {
            Accessor::Direct(source)
        };

        Reader::open(accessor, self.profile, self.hasher())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Backpressure;
    use test_log::test;

    #[test]
    fn config_default_hashers() {
        assert_eq!(5_381, Config::new().hasher().hash(b""));

        assert_eq!(
            crate::hash::default_hash(b"abcd"),
            Config::extended().hasher().hash(b"abcd"),
        );

        let config = Config::extended().hash_function(|_: &[u8]| 7_u64);
        assert_eq!(7, config.hasher().hash(b"abcd"));
    }

    #[test]
    fn config_in_memory_roundtrip() -> crate::Result<()> {
        for config in [Config::new(), Config::extended(), Config::new().use_cache(false)] {
            let mut writer = config.create_in_memory()?;
            writer.put("foo", "bar")?;
            writer.close()?;

            let mut reader = config.open_bytes(writer.into_sink().into_inner())?;
            assert_eq!(Some(b"bar".to_vec()), reader.get("foo")?);
        }

        Ok(())
    }

    #[test]
    fn config_in_memory_high_water_mark() -> crate::Result<()> {
        let mut writer = Config::new().high_water_mark(16).create_in_memory()?;

        // 8 + 3 + 3 bytes
        assert_eq!(Backpressure::Ready, writer.put("foo", "bar")?);
        assert_eq!(Backpressure::Drain, writer.put("baz", "qux")?);

        writer.drain()?;
        assert_eq!(Backpressure::Ready, writer.put("a", "b")?);

        Ok(())
    }

    #[test]
    #[should_panic = "block size may not be 0"]
    fn config_zero_block_size() {
        let _ = Config::new().block_size(0);
    }
}
