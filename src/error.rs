// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::Arc;

/// Represents errors that can occur in the database
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// The writer session failed earlier and can no longer be used
    ///
    /// Holds the I/O error that originally failed the session.
    /// The partially written file is invalid and should be discarded.
    Poisoned(Arc<std::io::Error>),

    /// The writer was already closed
    Closed,

    /// Key or value is longer than 2^32 - 1 bytes
    RecordTooLarge,

    /// A file position does not fit into the pointer width of the configured profile
    PointerOverflow(u64),

    /// The header region is truncated or contradicts itself
    InvalidHeader(&'static str),

    /// A custom source is missing a required capability
    InvalidSource(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConstDbError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Poisoned(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Database result
pub type Result<T> = std::result::Result<T, Error>;
