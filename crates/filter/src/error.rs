//! Filter Engine Error Types

use derive_more::{Display, Error};

/// A filter engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for filter engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No dataset is bound; call `initialize` first.
    #[display("filter engine is not initialized")]
    NotReady,
    /// Loading the dataset from the record store failed.
    #[display("could not load dataset from the record store")]
    Store,
    /// The stored records don't form a contiguous index.
    #[display("dataset records are inconsistent")]
    Inconsistent,
    /// The worker thread could not be started.
    #[display("filter worker unavailable")]
    WorkerUnavailable,
    /// The worker thread died while handling a request.
    #[display("filter worker crashed")]
    WorkerCrashed,
    #[display("filter request timed out")]
    Timeout,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Store | ErrorKind::Timeout)
    }

    /// Failures of the isolated execution context itself, recovered by
    /// switching to the inline engine.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ErrorKind::WorkerUnavailable | ErrorKind::WorkerCrashed | ErrorKind::Timeout)
    }
}
