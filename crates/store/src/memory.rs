//! In-memory record store for testing.

use crate::error::{ErrorKind, Result};
use crate::{RecordStore, check_contiguous};
use async_trait::async_trait;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{AccountRecord, BadgeStats, DatasetMetadata};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Dataset {
    metadata: Option<DatasetMetadata>,
    stats: Option<BadgeStats>,
    accounts: BTreeMap<usize, AccountRecord>,
}

/// In-memory [`RecordStore`] for testing.
///
/// Datasets live in a `HashMap` behind a [`RwLock`]. Besides storing data it
/// counts write operations and reads, and can be told to fail reads, so tests
/// can assert on caching and error paths without a database.
#[derive(Default)]
pub struct MemoryStore {
    datasets: RwLock<HashMap<DatasetIdentity, Dataset>>,
    writes: AtomicUsize,
    range_reads: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations performed so far (every `put_*` call and
    /// every delete).
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of [`RecordStore::get_account_range`] calls so far.
    pub fn range_reads(&self) -> usize {
        self.range_reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail with [`ErrorKind::Database`].
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Whether any data (complete or not) is stored under `identity`.
    pub async fn contains(&self, identity: &DatasetIdentity) -> bool {
        self.datasets.read().await.contains_key(identity)
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_metadata(&self, identity: &DatasetIdentity) -> Result<Option<DatasetMetadata>> {
        self.check_read()?;
        Ok(self.datasets.read().await.get(identity).and_then(|d| d.metadata.clone()))
    }

    async fn put_metadata(&self, metadata: &DatasetMetadata) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut datasets = self.datasets.write().await;
        datasets.entry(metadata.identity.clone()).or_default().metadata = Some(metadata.clone());
        Ok(())
    }

    async fn put_account_range(&self, identity: &DatasetIdentity, start: usize, records: &[AccountRecord])
    -> Result<()> {
        check_contiguous(start, records)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut datasets = self.datasets.write().await;
        let dataset = datasets.entry(identity.clone()).or_default();
        for record in records {
            dataset.accounts.insert(record.index, record.clone());
        }
        Ok(())
    }

    async fn get_account_range(&self, identity: &DatasetIdentity, start: usize, end: usize)
    -> Result<Vec<AccountRecord>> {
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read()?;
        if end <= start {
            return Ok(Vec::new());
        }
        let datasets = self.datasets.read().await;
        Ok(datasets
            .get(identity)
            .map(|d| d.accounts.range(start..end).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_badge_stats(&self, identity: &DatasetIdentity) -> Result<Option<BadgeStats>> {
        self.check_read()?;
        Ok(self.datasets.read().await.get(identity).and_then(|d| d.stats))
    }

    async fn put_badge_stats(&self, identity: &DatasetIdentity, stats: &BadgeStats) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.datasets.write().await.entry(identity.clone()).or_default().stats = Some(*stats);
        Ok(())
    }

    async fn list_datasets(&self) -> Result<Vec<DatasetMetadata>> {
        self.check_read()?;
        let mut list: Vec<_> = self.datasets.read().await.values().filter_map(|d| d.metadata.clone()).collect();
        list.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at).then_with(|| a.identity.cmp(&b.identity)));
        Ok(list)
    }

    async fn delete_dataset(&self, identity: &DatasetIdentity) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.datasets.write().await.remove(identity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_extract::models::BadgeSet;

    #[tokio::test]
    async fn test_counts_writes_and_reads() {
        let store = MemoryStore::new();
        let id = rollcall_archive::identify(b"x");
        let records: Vec<_> = (0..4).map(|i| AccountRecord::new(i, format!("u{i}"), BadgeSet::empty())).collect();
        store.put_account_range(&id, 0, &records).await.unwrap();
        assert_eq!(store.writes(), 1);
        assert!(store.contains(&id).await);
        assert_eq!(store.get_metadata(&id).await.unwrap(), None);

        let range = store.get_account_range(&id, 1, 3).await.unwrap();
        assert_eq!(range.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.range_reads(), 1);

        store.fail_reads(true);
        assert_eq!(*store.get_account_range(&id, 0, 1).await.unwrap_err(), ErrorKind::Database);
        store.fail_reads(false);

        store.delete_dataset(&id).await.unwrap();
        assert!(!store.contains(&id).await);
    }
}
