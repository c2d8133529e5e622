// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{FieldKind, Profile};

/// A (hash, record position) pair inside a bucket's slot table
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SlotEntry {
    /// Hash of the record's key
    pub hash: u64,

    /// File offset of the record
    pub position: u64,
}

impl SlotEntry {
    /// Returns `true` if the slot is unoccupied.
    ///
    /// Position 0 is always inside the header, so no record can live there.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Reads the `slot`-th entry of a serialized slot table.
    ///
    /// # Panics
    ///
    /// Panics if the slot is out of bounds.
    #[must_use]
    pub fn read(profile: Profile, table: &[u8], slot: usize) -> Self {
        let offset = slot * profile.slot_entry_size();

        Self {
            hash: profile.read(FieldKind::Hash, table, offset),
            position: profile.read(
                FieldKind::Pointer,
                table,
                offset + profile.width(FieldKind::Hash),
            ),
        }
    }

    /// Writes the entry into the `slot`-th position of a slot table.
    ///
    /// # Panics
    ///
    /// Panics if the slot is out of bounds.
    pub fn write(&self, profile: Profile, table: &mut [u8], slot: usize) {
        let offset = slot * profile.slot_entry_size();

        profile.write(FieldKind::Hash, table, self.hash, offset);
        profile.write(
            FieldKind::Pointer,
            table,
            self.position,
            offset + profile.width(FieldKind::Hash),
        );
    }
}
