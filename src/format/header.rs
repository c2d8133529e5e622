// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{FieldKind, Profile, BUCKET_COUNT};

/// Describes where a bucket's slot table lives
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HeaderEntry {
    /// File offset of the slot table
    pub position: u64,

    /// Number of slots, 0 if the bucket is empty
    pub slot_count: u64,
}

impl HeaderEntry {
    /// Returns `true` if no key hashes into this bucket.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot_count == 0
    }
}

/// The 256 bucket descriptors at the start of the file
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header(Box<[HeaderEntry]>);

impl Default for Header {
    fn default() -> Self {
        Self(vec![HeaderEntry::default(); BUCKET_COUNT].into_boxed_slice())
    }
}

impl std::ops::Deref for Header {
    type Target = [HeaderEntry];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Header {
    /// Returns the descriptor of the bucket a hash falls into.
    #[must_use]
    pub fn bucket_for(&self, hash: u64) -> (usize, HeaderEntry) {
        let idx = (hash & 0xFF) as usize;

        #[expect(clippy::indexing_slicing, reason = "header always has 256 entries")]
        (idx, self.0[idx])
    }

    /// Returns a mutable reference to a bucket descriptor.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= 256`.
    #[expect(clippy::indexing_slicing, reason = "bucket indexes are < 256")]
    pub(crate) fn entry_mut(&mut self, idx: usize) -> &mut HeaderEntry {
        &mut self.0[idx]
    }

    /// File offset at which the data region ends.
    ///
    /// Bucket 0's table is always written first, directly after the last record.
    #[must_use]
    pub fn data_region_end(&self) -> u64 {
        self.0.first().map_or(0, |entry| entry.position)
    }

    /// Number of records indexed by the hashtables.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.0.iter().map(|entry| entry.slot_count / 2).sum()
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self, profile: Profile) -> Vec<u8> {
        let entry_size = profile.header_entry_size();
        let pointer_width = profile.width(FieldKind::Pointer);

        let mut buf = vec![0; profile.header_size()];

        for (idx, entry) in self.0.iter().enumerate() {
            let offset = idx * entry_size;
            profile.write(FieldKind::Pointer, &mut buf, entry.position, offset);
            profile.write(
                FieldKind::SlotCount,
                &mut buf,
                entry.slot_count,
                offset + pointer_width,
            );
        }

        buf
    }

    /// Deserializes a header.
    ///
    /// Returns `None` if `bytes` is shorter than the profile's header size.
    #[must_use]
    pub fn decode(profile: Profile, bytes: &[u8]) -> Option<Self> {
        if bytes.len() < profile.header_size() {
            return None;
        }

        let entry_size = profile.header_entry_size();
        let pointer_width = profile.width(FieldKind::Pointer);

        let entries = (0..BUCKET_COUNT)
            .map(|idx| {
                let offset = idx * entry_size;
                HeaderEntry {
                    position: profile.read(FieldKind::Pointer, bytes, offset),
                    slot_count: profile.read(FieldKind::SlotCount, bytes, offset + pointer_width),
                }
            })
            .collect();

        Some(Self(entries))
    }
}
