//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The leading bytes are not a ZIP signature. The user picked the wrong
    /// file; don't retry with the same input.
    #[display("not a ZIP archive")]
    NotZip,
    /// The container has a ZIP signature but its directory or a member's
    /// compressed stream is broken.
    #[display("invalid or corrupted archive")]
    Corrupted,
    /// The requested member does not exist in the archive.
    #[display("archive member not found: {_0}")]
    MemberNotFound(#[error(not(source))] String),
    /// A string could not be parsed as a dataset identity.
    #[display("invalid dataset identity: {_0}")]
    InvalidIdentity(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Archives are immutable byte buffers: the bytes are either valid or
        // they're not.
        false
    }
}
