// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! On-disk layout
//!
//! ```text
//! [header: 256 x (position, slot count)]
//! [data region: records...]
//! [hashtable region: 256 x slot table]
//! ```
//!
//! All integers are unsigned little-endian.
//! The width of pointer, slot count and hash fields depends on the [`Profile`],
//! which is not recorded in the file itself.

mod header;
mod record;
mod slot;

pub use header::{Header, HeaderEntry};
pub use record::{RecordHeader, RECORD_HEADER_LEN};
pub use slot::SlotEntry;

use byteorder::{ByteOrder, LittleEndian};

/// Number of buckets (selected by the low byte of a key hash)
pub const BUCKET_COUNT: usize = 256;

/// Kind of a fixed-width field
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// File offset
    Pointer,

    /// Number of slots in a bucket's table
    SlotCount,

    /// Key or value length, always 4 bytes
    Length,

    /// Stored key hash
    Hash,
}

/// Field width profile
///
/// Must be the same for the writer that created a file and every reader of it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Profile {
    /// All fields are 4 bytes wide, header is 2048 bytes
    #[default]
    Classic,

    /// Pointer, slot count and hash fields are 8 bytes wide, header is 4096 bytes
    Extended,
}

impl Profile {
    /// Returns the byte width of a field.
    #[must_use]
    pub const fn width(self, kind: FieldKind) -> usize {
        match (self, kind) {
            (_, FieldKind::Length) | (Self::Classic, _) => 4,
            (Self::Extended, _) => 8,
        }
    }

    /// Reads a field at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the field does not fit into the buffer.
    #[must_use]
    pub fn read(self, kind: FieldKind, buf: &[u8], offset: usize) -> u64 {
        let width = self.width(kind);

        #[expect(
            clippy::indexing_slicing,
            reason = "out-of-bounds access is a programming error"
        )]
        let bytes = &buf[offset..offset + width];

        if width == 4 {
            u64::from(LittleEndian::read_u32(bytes))
        } else {
            LittleEndian::read_u64(bytes)
        }
    }

    /// Writes a field at `offset`.
    ///
    /// Values are truncated to the field width.
    ///
    /// # Panics
    ///
    /// Panics if the field does not fit into the buffer.
    pub fn write(self, kind: FieldKind, buf: &mut [u8], value: u64, offset: usize) {
        let width = self.width(kind);

        #[expect(
            clippy::indexing_slicing,
            reason = "out-of-bounds access is a programming error"
        )]
        let bytes = &mut buf[offset..offset + width];

        if width == 4 {
            #[expect(clippy::cast_possible_truncation, reason = "truncation is intended")]
            LittleEndian::write_u32(bytes, value as u32);
        } else {
            LittleEndian::write_u64(bytes, value);
        }
    }

    /// Size of a single header entry.
    #[must_use]
    pub const fn header_entry_size(self) -> usize {
        self.width(FieldKind::Pointer) + self.width(FieldKind::SlotCount)
    }

    /// Size of the header region at the start of the file.
    #[must_use]
    pub const fn header_size(self) -> usize {
        BUCKET_COUNT * self.header_entry_size()
    }

    /// Size of a single slot in a bucket's table.
    #[must_use]
    pub const fn slot_entry_size(self) -> usize {
        self.width(FieldKind::Hash) + self.width(FieldKind::Pointer)
    }

    /// Highest file position a pointer field can address.
    #[must_use]
    pub const fn max_pointer(self) -> u64 {
        match self {
            Self::Classic => u32::MAX as u64,
            Self::Extended => u64::MAX,
        }
    }

    /// Truncates a hash value to the width of the hash field.
    #[must_use]
    pub const fn mask_hash(self, hash: u64) -> u64 {
        match self {
            Self::Classic => hash & 0xFFFF_FFFF,
            Self::Extended => hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn profile_sizes() {
        assert_eq!(2_048, Profile::Classic.header_size());
        assert_eq!(4_096, Profile::Extended.header_size());
        assert_eq!(8, Profile::Classic.slot_entry_size());
        assert_eq!(16, Profile::Extended.slot_entry_size());
        assert_eq!(4, Profile::Extended.width(FieldKind::Length));
    }

    #[test]
    fn field_little_endian() {
        let mut buf = [0; 12];
        Profile::Classic.write(FieldKind::Pointer, &mut buf, 0x0102_0304, 2);
        assert_eq!([0, 0, 4, 3, 2, 1, 0, 0, 0, 0, 0, 0], buf);
        assert_eq!(0x0102_0304, Profile::Classic.read(FieldKind::Pointer, &buf, 2));

        let mut buf = [0; 8];
        Profile::Extended.write(FieldKind::Hash, &mut buf, 0xAB00_0000_0000_00CD, 0);
        assert_eq!([0xCD, 0, 0, 0, 0, 0, 0, 0xAB], buf);
        assert_eq!(
            0xAB00_0000_0000_00CD,
            Profile::Extended.read(FieldKind::Hash, &buf, 0),
        );
    }

    #[test]
    fn field_classic_truncates() {
        let mut buf = [0; 4];
        Profile::Classic.write(FieldKind::Hash, &mut buf, 0x1_0000_0002, 0);
        assert_eq!(2, Profile::Classic.read(FieldKind::Hash, &buf, 0));
    }

    #[test]
    #[should_panic(expected = "range end index")]
    fn field_out_of_bounds() {
        let buf = [0; 6];
        let _ = Profile::Classic.read(FieldKind::Pointer, &buf, 4);
    }
}
