//! Ingestion Error Types
//!
//! Problems with the archive itself are not errors: they are collected as
//! [`ParseWarning`](rollcall_extract::models::ParseWarning)s and returned in
//! [`IngestOutcome::Failed`](crate::IngestOutcome::Failed). The kinds below
//! cover infrastructure failures only.

use derive_more::{Display, Error};

/// An ingestion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading from or writing to the record store failed.
    #[display("record store operation failed")]
    Store,
    /// A blocking task (hashing, parsing) panicked or was aborted.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Store)
    }
}
