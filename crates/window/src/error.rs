//! Windowed Source Error Types

use derive_more::{Display, Error};

/// A windowed source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for windowed source operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Slice fetches are spawned on a Tokio runtime, and none was available.
    #[display("no async runtime available for slice fetches")]
    NoRuntime,
    #[display("invalid window option: {_0}")]
    InvalidConfig(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
