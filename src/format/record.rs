// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, Encode};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of the length prefix of every record
pub const RECORD_HEADER_LEN: usize = 2 * std::mem::size_of::<u32>();

/// Length prefix of a record
///
/// Lengths are always 4 bytes wide, regardless of the profile.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    /// Key length in bytes
    pub key_len: u32,

    /// Value length in bytes
    pub data_len: u32,
}

impl RecordHeader {
    /// Size of the whole record, including the length prefix.
    #[must_use]
    pub fn record_len(&self) -> u64 {
        RECORD_HEADER_LEN as u64 + u64::from(self.key_len) + u64::from(self.data_len)
    }
}

impl Encode for RecordHeader {
    fn encode_into<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        // NOTE:
        // RECORD LAYOUT
        //
        // [key len; 4B]
        // [data len; 4B]
        // [...key; ?]
        // [...data; ?]
        writer.write_u32::<LittleEndian>(self.key_len)?;
        writer.write_u32::<LittleEndian>(self.data_len)?;
        Ok(())
    }
}

impl Decode for RecordHeader {
    fn decode_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let key_len = reader.read_u32::<LittleEndian>()?;
        let data_len = reader.read_u32::<LittleEndian>()?;
        Ok(Self { key_len, data_len })
    }
}
