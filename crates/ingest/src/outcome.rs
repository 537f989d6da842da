use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{FileDiscovery, ParseWarning};

/// An archive handed to the pipeline: the file's bytes plus the name it was
/// uploaded under. Consumed by ingestion and never retained.
#[derive(Debug, Clone)]
pub struct RawArchive {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawArchive {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Accounts per merge/write batch. Progress is reported and cancellation
    /// checked between batches.
    pub batch_size: usize,
    /// Minimum number of unified accounts for the dataset to be usable.
    pub min_accounts: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { batch_size: 500, min_accounts: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Unifying parsed entries into account records.
    Merging,
    /// Writing account records to the store.
    Persisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    pub processed: usize,
    pub total: usize,
}

/// How an ingestion ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The dataset was parsed and is now fully persisted. `warnings` holds any
    /// non-fatal problems.
    Completed {
        identity: DatasetIdentity,
        account_count: u64,
        discovery: FileDiscovery,
        warnings: Vec<ParseWarning>,
    },
    /// A dataset for the same archive bytes already exists; nothing was
    /// parsed or written.
    Cached { identity: DatasetIdentity, account_count: u64 },
    /// Nothing was persisted. Warnings are sorted so the most relevant error
    /// comes first.
    Failed { warnings: Vec<ParseWarning>, discovery: Option<FileDiscovery> },
    /// Cancelled by the caller; nothing is visible in the store.
    Cancelled,
}

impl IngestOutcome {
    pub fn identity(&self) -> Option<&DatasetIdentity> {
        match self {
            IngestOutcome::Completed { identity, .. } | IngestOutcome::Cached { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn account_count(&self) -> Option<u64> {
        match self {
            IngestOutcome::Completed { account_count, .. } | IngestOutcome::Cached { account_count, .. } => {
                Some(*account_count)
            },
            _ => None,
        }
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        match self {
            IngestOutcome::Completed { warnings, .. } | IngestOutcome::Failed { warnings, .. } => warnings,
            _ => &[],
        }
    }

    /// The warning to show the user first: on failure, the richest error.
    pub fn primary_warning(&self) -> Option<&ParseWarning> {
        self.warnings().first()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Completed { .. } | IngestOutcome::Cached { .. })
    }
}

/// Events emitted by [`ingest_stream`](crate::ingest_stream), in order.
///
/// `Started` is always first and `Complete` always last; `Identified`,
/// `CacheHit` and `Discovered` appear at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Started,
    Identified(DatasetIdentity),
    CacheHit,
    Discovered(FileDiscovery),
    Progress(Progress),
    Complete(Box<IngestOutcome>),
}
