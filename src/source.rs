// Copyright (c) 2025-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{cache::BlockCache, Error};
use enum_dispatch::enum_dispatch;
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Random-access byte source a database is read from
#[enum_dispatch]
pub trait Source {
    /// Acquires the underlying resource.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the source cannot be opened.
    fn open(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Reads up to `len` bytes starting at `start`.
    ///
    /// Only returns fewer bytes if the source ends before `start + len`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>>;

    /// Releases the underlying resource.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reads exactly `len` bytes starting at `start`.
pub fn read_exact<S: Source + ?Sized>(
    source: &mut S,
    start: u64,
    len: usize,
) -> std::io::Result<Vec<u8>> {
    let bytes = source.read(start, len)?;

    if bytes.len() < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "short read at {start}: wanted {len} bytes, got {}",
                bytes.len()
            ),
        ));
    }

    Ok(bytes)
}

/// Reads from a file using positional reads
pub struct FileSource {
    path: Option<PathBuf>,
    file: Option<Arc<File>>,
}

impl FileSource {
    /// Creates a source that opens the file at `path` when opened.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().into()),
            file: None,
        }
    }

    /// Creates a source from an already opened file.
    #[must_use]
    pub fn from_file(file: File) -> Self {
        Self {
            path: None,
            file: Some(Arc::new(file)),
        }
    }
}

impl Source for FileSource {
    fn open(&mut self) -> std::io::Result<()> {
        if let (None, Some(path)) = (&self.file, &self.path) {
            self.file = Some(Arc::new(File::open(path)?));
        }
        Ok(())
    }

    fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let Some(file) = &self.file else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "file source is not open",
            ));
        };

        let mut buf = vec![0; len];
        let mut filled = 0;

        while filled < len {
            let offset = start + filled as u64;

            #[expect(clippy::indexing_slicing, reason = "filled < len")]
            let dst = &mut buf[filled..];

            #[cfg(unix)]
            let bytes_read = {
                use std::os::unix::fs::FileExt;
                file.read_at(dst, offset)
            };

            #[cfg(windows)]
            let bytes_read = {
                use std::os::windows::fs::FileExt;
                file.seek_read(dst, offset)
            };

            #[cfg(not(any(unix, windows)))]
            {
                compile_error!("unsupported OS");
            }

            match bytes_read {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.file = None;
        Ok(())
    }
}

/// Reads from an in-memory buffer
#[derive(Clone, Debug)]
pub struct MemorySource(Arc<[u8]>);

impl MemorySource {
    /// Wraps a buffer holding a whole database.
    pub fn new<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        Self(bytes.into())
    }
}

impl Source for MemorySource {
    fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let start = usize::try_from(start)
            .unwrap_or(usize::MAX)
            .min(self.0.len());
        let end = start.saturating_add(len).min(self.0.len());

        Ok(self.0.get(start..end).unwrap_or_default().to_vec())
    }
}

type ReadFn = Box<dyn FnMut(u64, usize) -> std::io::Result<Vec<u8>> + Send>;
type HookFn = Box<dyn FnMut() -> std::io::Result<()> + Send>;

/// Caller-supplied source, see [`CustomSource::builder`]
pub struct CustomSource {
    read: ReadFn,
    open: Option<HookFn>,
    close: Option<HookFn>,
}

impl CustomSource {
    /// Starts building a custom source.
    ///
    /// A read callback is required, open and close callbacks are optional.
    #[must_use]
    pub fn builder() -> CustomSourceBuilder {
        CustomSourceBuilder::default()
    }
}

impl Source for CustomSource {
    fn open(&mut self) -> std::io::Result<()> {
        self.open.as_mut().map_or(Ok(()), |f| f())
    }

    fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut bytes = (self.read)(start, len)?;
        bytes.truncate(len);
        Ok(bytes)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.close.as_mut().map_or(Ok(()), |f| f())
    }
}

/// Builder for [`CustomSource`]
#[derive(Default)]
pub struct CustomSourceBuilder {
    read: Option<ReadFn>,
    open: Option<HookFn>,
    close: Option<HookFn>,
}

impl CustomSourceBuilder {
    /// Sets the read callback, receiving `(start, len)`.
    #[must_use]
    pub fn read<F>(mut self, f: F) -> Self
    where
        F: FnMut(u64, usize) -> std::io::Result<Vec<u8>> + Send + 'static,
    {
        self.read = Some(Box::new(f));
        self
    }

    /// Sets the open callback.
    #[must_use]
    pub fn open<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> std::io::Result<()> + Send + 'static,
    {
        self.open = Some(Box::new(f));
        self
    }

    /// Sets the close callback.
    #[must_use]
    pub fn close<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> std::io::Result<()> + Send + 'static,
    {
        self.close = Some(Box::new(f));
        self
    }

    /// Builds the source.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no read callback was given.
    pub fn build(self) -> crate::Result<CustomSource> {
        let Some(read) = self.read else {
            return Err(Error::InvalidSource("custom source requires a read callback"));
        };

        Ok(CustomSource {
            read,
            open: self.open,
            close: self.close,
        })
    }
}

/// Any of the built-in sources
#[enum_dispatch(Source)]
pub enum RawSource {
    /// File on disk
    File(FileSource),

    /// In-memory buffer
    Memory(MemorySource),

    /// Caller-supplied callbacks
    Custom(CustomSource),
}

/// A source, optionally behind a block cache
pub enum Accessor<S: Source> {
    /// Every read goes to the source
    Direct(S),

    /// Reads are served block-wise from a cache
    Cached(BlockCache<S>),
}

impl<S: Source> Source for Accessor<S> {
    fn open(&mut self) -> std::io::Result<()> {
        match self {
            Self::Direct(source) => source.open(),
            Self::Cached(cache) => cache.open(),
        }
    }

    fn read(&mut self, start: u64, len: usize) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Direct(source) => source.read(start, len),
            Self::Cached(cache) => cache.read(start, len),
        }
    }

    fn close(&mut self) -> std::io::Result<()> {
        match self {
            Self::Direct(source) => source.close(),
            Self::Cached(cache) => cache.close(),
        }
    }
}

impl<S: Source> std::fmt::Debug for Accessor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Direct(_) => write!(f, "Accessor::Direct(...)"),
            Self::Cached(cache) => write!(f, "Accessor::Cached({} blocks)", cache.len()),
        }
    }
}
