//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is an invalid tmod archive: {0}
    #[error("file is an invalid tmod archive: {0}")]
    InvalidHeader(String),

    /// invalid entry table: {0}
    #[error("invalid entry table: {0}")]
    InvalidEntryTable(String),

    /// entry {path} is truncated
    #[error("entry {path} is truncated, expected {expected} bytes but only {available} remain")]
    TruncatedPayload {
        path: String,
        expected: u64,
        available: u64,
    },

    /// unable to decompress entry: {0}
    #[error("unable to decompress entry: {0}")]
    DecompressionFailed(String),

    /// unexpected end of stream
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    /// archives written by tModLoader {0} are not supported
    #[error("archives written by tModLoader {0} are not supported")]
    UnsupportedLegacyFormat(String),

    /// entry {0} is too large to be stored
    #[error("entry {0} is too large to be stored")]
    EntryTooLarge(String),

    /// entry {0} already exists
    #[error("entry {0} already exists")]
    DuplicateEntry(String),

    /// unable to find requested file {0}
    #[error("unable to find requested file {0}")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),

    /// at path {0}
    #[error("at path {0}")]
    Path(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
