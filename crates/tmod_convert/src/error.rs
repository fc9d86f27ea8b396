//! Error types that can be emitted from this library
//!

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`tmod_archive::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] tmod_archive::error::Error),

    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`image::ImageError`]
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Transparent wrapper for [`rayon::ThreadPoolBuildError`]
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// unable to convert {path}: {reason}
    #[error("unable to convert {path}: {reason}")]
    ConversionFailed { path: String, reason: String },

    /// invalid build file: {0}
    #[error("invalid build file: {0}")]
    InvalidBuildFile(String),

    /// {0} would be written outside of the target directory
    #[error("{0} would be written outside of the target directory")]
    UnsafePath(String),

    /// {0} already exists
    #[error("{0} already exists")]
    AlreadyExists(String),
}

impl Error {
    pub(crate) fn conversion(path: &str, reason: impl ToString) -> Self {
        Error::ConversionFailed {
            path: path.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
