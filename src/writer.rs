// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::Encode,
    format::{Header, HeaderEntry, Profile, RecordHeader, SlotEntry, BUCKET_COUNT},
    hash::HashFunction,
    hashtable::{build_slot_table, slot_count_for},
    sink::{Backpressure, FileSink, Sink},
    Error,
};
use std::sync::Arc;

enum State {
    Open,
    Closing,
    Closed,

    /// Holds the I/O error that failed the session
    Errored(Arc<std::io::Error>),
}

/// Writes a constant database
///
/// Records are appended to the data region as they are written, while their
/// (hash, position) pairs are kept in memory, one list per bucket.
/// Closing the writer writes the bucket hashtables and then the header.
///
/// Any I/O error poisons the writer, the partially written file must be discarded.
pub struct Writer<S: Sink = FileSink> {
    sink: S,
    profile: Profile,
    hasher: Arc<dyn HashFunction>,

    state: State,

    /// Current file position, the next record starts here
    position: u64,

    /// Number of written records
    item_count: u64,

    /// (hash, position) pairs of every written record, by bucket
    buckets: Vec<Vec<SlotEntry>>,
}

impl<S: Sink> std::fmt::Debug for Writer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Writer(profile={:?}, position={}, items={})",
            self.profile, self.position, self.item_count,
        )
    }
}

impl<S: Sink> Writer<S> {
    /// Opens a writer, reserving the header region of the sink.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the sink cannot be opened.
    pub fn new(
        mut sink: S,
        profile: Profile,
        hasher: Arc<dyn HashFunction>,
    ) -> crate::Result<Self> {
        let header_size = profile.header_size() as u64;
        sink.open(header_size)?;

        log::debug!("Opened writer with {profile:?} profile, reserved {header_size}B header");

        Ok(Self {
            sink,
            profile,
            hasher,
            state: State::Open,
            position: header_size,
            item_count: 0,
            buckets: (0..BUCKET_COUNT).map(|_| Vec::new()).collect(),
        })
    }

    /// Returns the current file position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the number of written records.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.item_count
    }

    /// Returns `true` if no record was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// Returns the field width profile.
    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    fn check_open(&self) -> crate::Result<()> {
        match &self.state {
            State::Open => Ok(()),
            State::Closing | State::Closed => Err(Error::Closed),
            State::Errored(e) => Err(Error::Poisoned(e.clone())),
        }
    }

    fn poison(&mut self, error: std::io::Error) -> Error {
        log::error!("Writer failed, database file is unusable: {error}");

        let error = Arc::new(error);
        self.state = State::Errored(error.clone());

        // Bucket lists are useless now
        self.buckets = Vec::new();

        Error::Poisoned(error)
    }

    /// Appends a record.
    ///
    /// Writing a key multiple times stores every value, readers see them in write order.
    ///
    /// Returns [`Backpressure::Drain`] if the sink's buffer is full, the caller
    /// may then call [`Writer::drain`] before writing more.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the writer has been closed or poisoned.
    pub fn put<K: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: K,
        value: V,
    ) -> crate::Result<Backpressure> {
        self.check_open()?;

        let key = key.as_ref();
        let value = value.as_ref();

        let header = RecordHeader {
            key_len: u32::try_from(key.len()).map_err(|_| Error::RecordTooLarge)?,
            data_len: u32::try_from(value.len()).map_err(|_| Error::RecordTooLarge)?,
        };

        if self.position > self.profile.max_pointer() {
            return Err(Error::PointerOverflow(self.position));
        }

        let hash = self.profile.mask_hash(self.hasher.hash(key));

        let mut record = Vec::with_capacity(header.record_len() as usize);
        header.encode_into(&mut record)?;
        record.extend_from_slice(key);
        record.extend_from_slice(value);

        let backpressure = match self.sink.append(&record) {
            Ok(backpressure) => backpressure,
            Err(e) => return Err(self.poison(e)),
        };

        #[expect(clippy::indexing_slicing, reason = "bucket index is < 256")]
        self.buckets[(hash & 0xFF) as usize].push(SlotEntry {
            hash,
            position: self.position,
        });

        self.position += header.record_len();
        self.item_count += 1;

        Ok(backpressure)
    }

    /// Waits for the sink to drain its buffer.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the writer has been closed or poisoned.
    pub fn drain(&mut self) -> crate::Result<()> {
        self.check_open()?;

        self.sink.drain().map_err(|e| self.poison(e))
    }

    /// Writes the hashtables and header, sealing the database.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the writer has been closed or poisoned.
    pub fn close(&mut self) -> crate::Result<()> {
        self.check_open()?;

        // NOTE: Check up front that every table position fits into a pointer,
        // so we never end up with a half-written index
        {
            let slot_size = self.profile.slot_entry_size() as u64;

            let last_table_position = self.position
                + self
                    .buckets
                    .iter()
                    .take(BUCKET_COUNT - 1)
                    .map(|entries| slot_count_for(entries.len()) as u64 * slot_size)
                    .sum::<u64>();

            if last_table_position > self.profile.max_pointer() {
                return Err(Error::PointerOverflow(last_table_position));
            }
        }

        self.state = State::Closing;

        if let Err(e) = self.sink.finish() {
            return Err(self.poison(e));
        }

        log::debug!(
            "Wrote {} records ({}B), writing hashtables",
            self.item_count,
            self.position,
        );

        let mut header = Header::default();

        for (idx, entries) in std::mem::take(&mut self.buckets).into_iter().enumerate() {
            let slot_count = slot_count_for(entries.len()) as u64;
            let table = build_slot_table(entries, self.profile);

            if !table.is_empty() {
                if let Err(e) = self.sink.append(&table) {
                    return Err(self.poison(e));
                }
            }

            *header.entry_mut(idx) = HeaderEntry {
                position: self.position,
                slot_count,
            };

            self.position += table.len() as u64;
        }

        if let Err(e) = self.sink.finish() {
            return Err(self.poison(e));
        }

        if let Err(e) = self.sink.write_header(&header.encode(self.profile)) {
            return Err(self.poison(e));
        }

        log::debug!("Sealed database, file size is {}B", self.position);

        self.state = State::Closed;

        Ok(())
    }

    /// Returns the sink.
    ///
    /// The sink only holds a valid database after a successful [`Writer::close`].
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }
}
