// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Default amount of buffered bytes after which a sink asks to be drained
pub const DEFAULT_HIGH_WATER_MARK: usize = 64 * 1_024;

/// Signals whether a sink can take more data without growing its buffer
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backpressure {
    /// The sink accepts more data
    Ready,

    /// The sink's buffer reached its high-water mark
    ///
    /// The caller may call `drain` before writing more. Not doing so only
    /// increases memory usage.
    Drain,
}

/// Append-only byte sink a database is written into
///
/// The header region is reserved when opening and written last.
pub trait Sink {
    /// Prepares the sink, reserving `reserved` bytes at the start.
    ///
    /// Appended data starts at offset `reserved`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the sink cannot be created.
    fn open(&mut self, reserved: u64) -> std::io::Result<()>;

    /// Appends bytes.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn append(&mut self, bytes: &[u8]) -> std::io::Result<Backpressure>;

    /// Waits until buffered data has been handed to the underlying storage.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn drain(&mut self) -> std::io::Result<()>;

    /// Ends appending, all appended data is flushed.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn finish(&mut self) -> std::io::Result<()>;

    /// Writes the header into the reserved region at offset 0.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn write_header(&mut self, header: &[u8]) -> std::io::Result<()>;
}

/// Writes a database file
pub struct FileSink {
    path: PathBuf,

    file_writer: Option<BufWriter<File>>,

    high_water_mark: usize,
    pending: usize,
}

impl FileSink {
    /// Creates a sink that will create (or truncate) the file at `path` when opened.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().into(),
            file_writer: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            pending: 0,
        }
    }

    /// Sets the amount of buffered bytes after which [`Backpressure::Drain`] is signalled.
    #[must_use]
    pub fn use_high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes.max(1);
        self
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        self.file_writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "file sink is not open")
        })
    }
}

impl Sink for FileSink {
    fn open(&mut self, reserved: u64) -> std::io::Result<()> {
        let file = File::create(&self.path)?;

        let mut writer = BufWriter::with_capacity(self.high_water_mark, file);
        writer.seek(SeekFrom::Start(reserved))?;

        self.file_writer = Some(writer);
        self.pending = 0;

        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> std::io::Result<Backpressure> {
        self.writer()?.write_all(bytes)?;
        self.pending += bytes.len();

        Ok(if self.pending >= self.high_water_mark {
            Backpressure::Drain
        } else {
            Backpressure::Ready
        })
    }

    fn drain(&mut self) -> std::io::Result<()> {
        self.writer()?.flush()?;
        self.pending = 0;
        Ok(())
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.drain()
    }

    fn write_header(&mut self, header: &[u8]) -> std::io::Result<()> {
        let writer = self.writer()?;
        writer.flush()?;

        let file = writer.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(header)?;
        file.sync_all()?;

        Ok(())
    }
}

/// Writes a database into memory
#[derive(Debug, Default)]
pub struct MemorySink {
    buf: Vec<u8>,
    high_water_mark: Option<usize>,
    pending: usize,
}

impl MemorySink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals [`Backpressure::Drain`] every `bytes` appended bytes.
    #[must_use]
    pub fn use_high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = Some(bytes.max(1));
        self
    }

    /// Returns the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Sink for MemorySink {
    fn open(&mut self, reserved: u64) -> std::io::Result<()> {
        let reserved = usize::try_from(reserved).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::OutOfMemory, "reserved region too large")
        })?;

        self.buf.clear();
        self.buf.resize(reserved, 0);
        self.pending = 0;

        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> std::io::Result<Backpressure> {
        self.buf.extend_from_slice(bytes);
        self.pending += bytes.len();

        Ok(match self.high_water_mark {
            Some(mark) if self.pending >= mark => Backpressure::Drain,
            _ => Backpressure::Ready,
        })
    }

    fn drain(&mut self) -> std::io::Result<()> {
        self.pending = 0;
        Ok(())
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.drain()
    }

    fn write_header(&mut self, header: &[u8]) -> std::io::Result<()> {
        let Some(region) = self.buf.get_mut(..header.len()) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "header is larger than the reserved region",
            ));
        };
        region.copy_from_slice(header);
        Ok(())
    }
}
