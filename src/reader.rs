// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::Decode,
    format::{Header, HeaderEntry, Profile, RecordHeader, SlotEntry, RECORD_HEADER_LEN},
    hash::HashFunction,
    hashtable::home_slot,
    source::{read_exact, Accessor, RawSource, Source},
    Error, KvPair, UserValue,
};
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;

/// Saved probe position of the last successful lookup
///
/// Allows resuming the probe sequence to find further values of the same key.
#[derive(Clone)]
struct Continuation {
    key: Vec<u8>,
    hash: u64,
    bucket: usize,

    /// Next slot to inspect
    slot: u64,

    /// Number of slots not yet inspected
    remaining: u64,
}

/// Reads a constant database
///
/// The header is read when opening, all other data is read on demand,
/// optionally through a [`crate::BlockCache`].
pub struct Reader<S: Source = RawSource> {
    source: Accessor<S>,
    profile: Profile,
    hasher: Arc<dyn HashFunction>,
    header: Header,

    continuation: Option<Continuation>,

    #[cfg(feature = "metrics")]
    metrics: Arc<Metrics>,
}

impl<S: Source> std::fmt::Debug for Reader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Reader(profile={:?}, records={}, source={:?})",
            self.profile,
            self.header.record_count(),
            self.source,
        )
    }
}

impl<S: Source> Reader<S> {
    /// Opens the source and reads the header.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the header is truncated or invalid.
    pub fn open(
        mut source: Accessor<S>,
        profile: Profile,
        hasher: Arc<dyn HashFunction>,
    ) -> crate::Result<Self> {
        source.open()?;

        let header_size = profile.header_size();
        let bytes = source.read(0, header_size)?;

        let Some(header) = Header::decode(profile, &bytes) else {
            log::error!(
                "Header is truncated: expected {header_size}B, got {}B",
                bytes.len(),
            );
            return Err(Error::InvalidHeader("truncated"));
        };

        if header
            .iter()
            .any(|entry| !entry.is_empty() && entry.position < header_size as u64)
        {
            return Err(Error::InvalidHeader("hashtable position inside header"));
        }

        log::debug!(
            "Opened database with {profile:?} profile, {} records",
            header.record_count(),
        );

        #[cfg(feature = "metrics")]
        let metrics = match &source {
            Accessor::Cached(cache) => cache.metrics().clone(),
            Accessor::Direct(_) => Arc::default(),
        };

        Ok(Self {
            source,
            profile,
            hasher,
            header,
            continuation: None,

            #[cfg(feature = "metrics")]
            metrics,
        })
    }

    /// Returns the parsed header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the field width profile.
    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.header.record_count()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the runtime counters.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Returns the first value written for `key`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn get<K: AsRef<[u8]>>(&mut self, key: K) -> crate::Result<Option<UserValue>> {
        self.get_nth(key, 0)
    }

    /// Returns the `occurrence`-th value written for `key` (0-based).
    ///
    /// On success, [`Reader::get_next`] continues with the following value.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn get_nth<K: AsRef<[u8]>>(
        &mut self,
        key: K,
        occurrence: usize,
    ) -> crate::Result<Option<UserValue>> {
        let key = key.as_ref();

        self.continuation = None;

        let hash = self.profile.mask_hash(self.hasher.hash(key));
        let (bucket, entry) = self.header.bucket_for(hash);

        if entry.is_empty() {
            #[cfg(feature = "metrics")]
            self.metrics
                .empty_bucket_hits
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            return Ok(None);
        }

        let cursor = Continuation {
            key: key.into(),
            hash,
            bucket,
            slot: home_slot(hash, entry.slot_count),
            remaining: entry.slot_count,
        };

        self.probe(cursor, occurrence)
    }

    /// Returns the next value of the key of the last successful lookup.
    ///
    /// Returns `None` if there are no more values, or there was no successful lookup.
    /// An I/O error keeps the current position, so the call can be retried.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn get_next(&mut self) -> crate::Result<Option<UserValue>> {
        let Some(cursor) = self.continuation.take() else {
            return Ok(None);
        };

        let saved = cursor.clone();
        let result = self.probe(cursor, 0);

        if result.is_err() {
            self.continuation = Some(saved);
        }

        result
    }

    /// Returns all values written for `key`, in write order.
    pub fn get_all<K: AsRef<[u8]>>(&mut self, key: K) -> GetAll<'_, S> {
        GetAll {
            reader: self,
            key: Some(key.as_ref().into()),
            done: false,
        }
    }

    /// Returns `true` if the database contains `key`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn contains_key<K: AsRef<[u8]>>(&mut self, key: K) -> crate::Result<bool> {
        self.get(key).map(|value| value.is_some())
    }

    /// Scans all records in write order.
    pub fn iter(&mut self) -> Iter<'_, S> {
        let position = self.profile.header_size() as u64;
        let end = self.header.data_region_end().max(position);

        Iter {
            reader: self,
            position,
            end,
        }
    }

    /// Closes the underlying source.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn close(mut self) -> crate::Result<()> {
        self.source.close()?;
        Ok(())
    }

    fn probe(
        &mut self,
        mut cursor: Continuation,
        mut occurrence: usize,
    ) -> crate::Result<Option<UserValue>> {
        #[expect(clippy::indexing_slicing, reason = "bucket index is < 256")]
        let bucket = self.header[cursor.bucket];

        while cursor.remaining > 0 {
            let slot = self.read_slot(bucket, cursor.slot)?;

            cursor.slot = (cursor.slot + 1) % bucket.slot_count;
            cursor.remaining -= 1;

            if slot.is_empty() {
                return Ok(None);
            }

            if slot.hash != cursor.hash {
                continue;
            }

            let Some(record) = self.match_record(&cursor.key, slot.position)? else {
                log::trace!("Hash collision at position {}", slot.position);
                continue;
            };

            if occurrence > 0 {
                occurrence -= 1;
                continue;
            }

            let value = read_exact(
                &mut self.source,
                slot.position + RECORD_HEADER_LEN as u64 + u64::from(record.key_len),
                record.data_len as usize,
            )?;

            self.continuation = Some(cursor);

            return Ok(Some(value));
        }

        // NOTE: Only reachable if the table has no free slot, which the writer never produces
        log::warn!("Probed every slot of bucket {} without finding a free slot", cursor.bucket);

        Ok(None)
    }

    fn read_slot(&mut self, bucket: HeaderEntry, slot: u64) -> crate::Result<SlotEntry> {
        #[cfg(feature = "metrics")]
        self.metrics
            .slot_probes
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let slot_size = self.profile.slot_entry_size();
        let position = bucket.position + slot * slot_size as u64;

        let bytes = read_exact(&mut self.source, position, slot_size)?;

        Ok(SlotEntry::read(self.profile, &bytes, 0))
    }

    /// Returns the record header if the record at `position` has the given key.
    fn match_record(&mut self, key: &[u8], position: u64) -> crate::Result<Option<RecordHeader>> {
        let bytes = read_exact(&mut self.source, position, RECORD_HEADER_LEN)?;
        let record = RecordHeader::decode_from(&mut bytes.as_slice())?;

        // Different key length, no need to read the key
        if record.key_len as usize != key.len() {
            return Ok(None);
        }

        let stored_key = read_exact(
            &mut self.source,
            position + RECORD_HEADER_LEN as u64,
            key.len(),
        )?;

        Ok((stored_key == key).then_some(record))
    }
}

/// Iterator over all values of a key, see [`Reader::get_all`]
pub struct GetAll<'a, S: Source> {
    reader: &'a mut Reader<S>,
    key: Option<Vec<u8>>,
    done: bool,
}

impl<S: Source> Iterator for GetAll<'_, S> {
    type Item = crate::Result<UserValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.key.take() {
            Some(key) => self.reader.get(key),
            None => self.reader.get_next(),
        };

        match result {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over all records in write order, see [`Reader::iter`]
pub struct Iter<'a, S: Source> {
    reader: &'a mut Reader<S>,
    position: u64,
    end: u64,
}

impl<S: Source> Iter<'_, S> {
    fn next_record(&mut self) -> crate::Result<KvPair> {
        let bytes = read_exact(&mut self.reader.source, self.position, RECORD_HEADER_LEN)?;
        let record = RecordHeader::decode_from(&mut bytes.as_slice())?;

        let mut key = read_exact(
            &mut self.reader.source,
            self.position + RECORD_HEADER_LEN as u64,
            record.key_len as usize + record.data_len as usize,
        )?;
        let value = key.split_off(record.key_len as usize);

        self.position += record.record_len();

        Ok((key, value))
    }
}

impl<S: Source> Iterator for Iter<'_, S> {
    type Item = crate::Result<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }

        let item = self.next_record();

        if item.is_err() {
            self.position = self.end;
        }

        Some(item)
    }
}
