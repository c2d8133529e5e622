// Copyright (c) 2025-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::format::{Profile, SlotEntry};

/// Number of slots in a table holding `entry_count` entries (load factor 0.5).
#[must_use]
pub fn slot_count_for(entry_count: usize) -> usize {
    entry_count * 2
}

/// Home slot of a hash in a table of `slot_count` slots.
///
/// The low byte selects the bucket, so it is shifted out.
#[must_use]
pub fn home_slot(hash: u64, slot_count: u64) -> u64 {
    (hash >> 8) % slot_count
}

/// Builds the linearly-probed slot table of a single bucket.
///
/// Entries are placed in the given order, each at its home slot or the first
/// free slot after it (wrapping around), so duplicates of a key are found
/// in insertion order when probing.
///
/// Consumes the bucket's entries, an empty bucket produces an empty table.
#[must_use]
pub fn build_slot_table(entries: Vec<SlotEntry>, profile: Profile) -> Vec<u8> {
    let slot_count = slot_count_for(entries.len());
    let mut table = vec![0; slot_count * profile.slot_entry_size()];

    for entry in entries {
        debug_assert!(!entry.is_empty(), "record cannot be at position 0");

        #[expect(clippy::cast_possible_truncation, reason = "slot is < slot count")]
        let mut slot = home_slot(entry.hash, slot_count as u64) as usize;

        while !SlotEntry::read(profile, &table, slot).is_empty() {
            slot = (slot + 1) % slot_count;
        }

        entry.write(profile, &mut table, slot);
    }

    table
}
