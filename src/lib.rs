// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A constant (write-once, read-many) key-value database.
//!
//! ##### About
//!
//! A database is written once, record by record, and then only read.
//! Lookups touch at most a handful of small, nearby file regions,
//! making them fast even without any in-memory index.
//!
//! A file consists of three regions:
//!
//! - a fixed-size header of 256 bucket descriptors
//! - the data region, holding the records in write order
//! - one hashtable per bucket, linearly probed, with a load factor of 0.5
//!
//! A key is hashed, the low 8 bits of the hash select the bucket, the remaining
//! bits select the start slot in the bucket's hashtable.
//!
//! Keys may be written more than once, all values are kept and can be read
//! in write order.
//!
//! Two field width profiles exist: the classic 32-bit one, which limits files to 4 GiB,
//! and an extended 64-bit one.
//!
//! ```
//! use constdb::Config;
//!
//! # fn main() -> constdb::Result<()> {
//! let config = Config::new();
//!
//! let mut writer = config.create_in_memory()?;
//! writer.put("foo", "bar")?;
//! writer.put("dup", "1")?;
//! writer.put("dup", "2")?;
//! writer.close()?;
//!
//! let mut reader = config.open_bytes(writer.into_sink().into_inner())?;
//! assert_eq!(Some(b"bar".to_vec()), reader.get("foo")?);
//!
//! assert_eq!(Some(b"1".to_vec()), reader.get("dup")?);
//! assert_eq!(Some(b"2".to_vec()), reader.get_next()?);
//! assert_eq!(None, reader.get_next()?);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[doc(hidden)]
pub type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;

mod cache;

#[doc(hidden)]
pub mod coding;

/// Configuration
pub mod config;

mod error;

pub mod format;

pub mod hash;

/// Slot table construction
#[doc(hidden)]
pub mod hashtable;

#[cfg(feature = "metrics")]
pub(crate) mod metrics;

mod reader;
mod sink;
mod source;
mod writer;

/// User defined key (byte array)
pub type UserKey = Vec<u8>;

/// User defined data (byte array)
pub type UserValue = Vec<u8>;

/// KV-tuple (key + value)
pub type KvPair = (UserKey, UserValue);

pub use {
    cache::{BlockCache, DEFAULT_BLOCK_LIMIT, DEFAULT_BLOCK_SIZE},
    config::Config,
    error::{Error, Result},
    format::Profile,
    hash::{DefaultHash, HashFunction, OriginalHash, Xxh3Hash},
    reader::{GetAll, Iter, Reader},
    sink::{Backpressure, FileSink, MemorySink, Sink, DEFAULT_HIGH_WATER_MARK},
    source::{Accessor, CustomSource, CustomSourceBuilder, FileSource, MemorySource, RawSource, Source},
    writer::Writer,
};

#[cfg(feature = "metrics")]
pub use metrics::Metrics;

#[doc(hidden)]
#[must_use]
#[allow(missing_docs, clippy::missing_errors_doc, clippy::unwrap_used)]
pub fn get_tmp_folder() -> tempfile::TempDir {
    if let Ok(p) = std::env::var("CONSTDB_TMP_FOLDER") {
        tempfile::tempdir_in(p)
    } else {
        tempfile::tempdir()
    }
    .unwrap()
}
