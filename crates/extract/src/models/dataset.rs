use rollcall_archive::DatasetIdentity;
use time::UtcDateTime;

/// Per-dataset metadata.
///
/// Written exactly once, as the final step of a successful ingestion. Readers
/// treat its presence as "the dataset is complete".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMetadata {
    pub identity: DatasetIdentity,
    /// Name of the uploaded file, for display only.
    pub display_name: String,
    /// Size of the archive in bytes.
    pub byte_size: u64,
    pub ingested_at: UtcDateTime,
    pub account_count: u64,
}
