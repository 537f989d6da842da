//! Local record store for ingested datasets.
//!
//! The store is the only shared resource in the system. It is written
//! exclusively by the ingestion pipeline and read concurrently by the
//! filtering engine and the windowed data source.
//!
//! # Consistency
//! A dataset is only visible once its [`DatasetMetadata`] exists. Ingestion
//! writes account ranges and badge stats first and metadata last, so a reader
//! that starts from [`RecordStore::get_metadata`] always sees a complete
//! snapshot and no explicit locking is required. Leftovers of an aborted
//! write are invisible and removed with [`RecordStore::delete_dataset`].
//!
//! # Layout
//! - one metadata record per dataset identity,
//! - one badge-stats record per dataset identity,
//! - account records addressable by contiguous `[start, end)` index ranges.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod memory;
mod models;
mod repo;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::memory::MemoryStore;
pub use crate::repo::SqliteStore;
use crate::error::Result;
use async_trait::async_trait;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{AccountRecord, BadgeStats, DatasetMetadata};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn RecordStore + Send + Sync>;

/// Unified interface over record store implementations.
///
/// All operations are asynchronous. Index ranges are half-open: `start` is
/// inclusive and `end` is exclusive.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Metadata for a dataset, or `None` if the dataset doesn't exist (or
    /// its ingestion never completed).
    async fn get_metadata(&self, identity: &DatasetIdentity) -> Result<Option<DatasetMetadata>>;

    async fn put_metadata(&self, metadata: &DatasetMetadata) -> Result<()>;

    /// Write a contiguous run of account records starting at `start`.
    ///
    /// Returns [`InvalidData`](crate::error::ErrorKind::InvalidData) if
    /// `records[i].index != start + i` for any record. Existing records at
    /// the same indices are replaced.
    async fn put_account_range(&self, identity: &DatasetIdentity, start: usize, records: &[AccountRecord])
    -> Result<()>;

    /// Read the records in `[start, end)`, ordered by index. Indices past the
    /// end of the dataset are simply absent from the result.
    async fn get_account_range(&self, identity: &DatasetIdentity, start: usize, end: usize)
    -> Result<Vec<AccountRecord>>;

    async fn get_badge_stats(&self, identity: &DatasetIdentity) -> Result<Option<BadgeStats>>;

    async fn put_badge_stats(&self, identity: &DatasetIdentity, stats: &BadgeStats) -> Result<()>;

    /// Metadata of every complete dataset, most recently ingested first.
    async fn list_datasets(&self) -> Result<Vec<DatasetMetadata>>;

    /// Remove everything stored under `identity` (metadata, stats and
    /// accounts). Removing a dataset that doesn't exist is not an error.
    async fn delete_dataset(&self, identity: &DatasetIdentity) -> Result<()>;
}

/// Shared check for [`RecordStore::put_account_range`] implementations.
pub(crate) fn check_contiguous(start: usize, records: &[AccountRecord]) -> Result<()> {
    for (offset, record) in records.iter().enumerate() {
        if record.index != start + offset {
            exn::bail!(error::ErrorKind::InvalidData("account index"));
        }
    }
    Ok(())
}
