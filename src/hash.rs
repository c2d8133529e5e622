// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Key hash functions
//!
//! The file does not record which function built its index, so a reader
//! must be configured with the same function as the writer.

use byteorder::{ByteOrder, LittleEndian};

const DJB_SEED: u32 = 5_381;

/// Adapted DJB hash, as used by the classic profile.
///
/// Each step computes `acc = (acc * 33) ^ byte` modulo 2^32.
#[must_use]
pub fn original_hash(key: &[u8]) -> u32 {
    key.iter()
        .fold(DJB_SEED, |acc, &byte| acc.wrapping_mul(33) ^ u32::from(byte))
}

/// 64-bit hash, as used by the extended profile.
///
/// The low 32 bits are [`original_hash`], the high 32 bits are
/// the first 4 bytes of the key (zero-padded, little-endian).
#[must_use]
pub fn default_hash(key: &[u8]) -> u64 {
    let mut prefix = [0; 4];

    for (dst, src) in prefix.iter_mut().zip(key) {
        *dst = *src;
    }

    (u64::from(LittleEndian::read_u32(&prefix)) << 32) | u64::from(original_hash(key))
}

/// Deterministic mapping from a key to a hash value
///
/// Values wider than the profile's hash field are truncated.
pub trait HashFunction: Send + Sync {
    /// Hashes a key.
    fn hash(&self, key: &[u8]) -> u64;
}

impl<F: Fn(&[u8]) -> u64 + Send + Sync> HashFunction for F {
    fn hash(&self, key: &[u8]) -> u64 {
        self(key)
    }
}

/// [`original_hash`]
#[derive(Copy, Clone, Debug, Default)]
pub struct OriginalHash;

impl HashFunction for OriginalHash {
    fn hash(&self, key: &[u8]) -> u64 {
        original_hash(key).into()
    }
}

/// [`default_hash`]
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultHash;

impl HashFunction for DefaultHash {
    fn hash(&self, key: &[u8]) -> u64 {
        default_hash(key)
    }
}

/// 64-bit XXH3
#[derive(Copy, Clone, Debug, Default)]
pub struct Xxh3Hash;

impl HashFunction for Xxh3Hash {
    fn hash(&self, key: &[u8]) -> u64 {
        xxhash_rust::xxh3::xxh3_64(key)
    }
}
