//! Store fixtures shared by the tests in this crate.

use async_trait::async_trait;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{AccountRecord, BadgeKey, BadgeSet, BadgeStats, DatasetMetadata};
use rollcall_store::error::Result as StoreResult;
use rollcall_store::{MemoryStore, RecordStore, StoreHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::watch;

/// Badges cycle through mutual, following only, followers only.
pub(crate) fn records(usernames: &[&str]) -> Vec<AccountRecord> {
    usernames
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let badges: BadgeSet = match index % 3 {
                0 => [BadgeKey::Following, BadgeKey::Followers].into_iter().collect(),
                1 => BadgeKey::Following.into(),
                _ => BadgeKey::Followers.into(),
            };
            AccountRecord::new(index, *name, badges.with_derived())
        })
        .collect()
}

pub(crate) async fn seed(store: &MemoryStore, seed: &[u8], usernames: &[&str]) -> DatasetIdentity {
    let identity = rollcall_archive::identify(seed);
    let records = records(usernames);
    store.put_account_range(&identity, 0, &records).await.unwrap();
    store.put_badge_stats(&identity, &BadgeStats::from_records(&records)).await.unwrap();
    store
        .put_metadata(&DatasetMetadata {
            identity: identity.clone(),
            display_name: "export.zip".to_string(),
            byte_size: 1,
            ingested_at: UtcDateTime::now(),
            account_count: records.len() as u64,
        })
        .await
        .unwrap();
    identity
}

pub(crate) async fn seeded_store(usernames: &[&str]) -> (Arc<MemoryStore>, StoreHandle, DatasetIdentity) {
    let memory = Arc::new(MemoryStore::new());
    let identity = seed(&memory, b"first", usernames).await;
    let handle: StoreHandle = memory.clone();
    (memory, handle, identity)
}

/// Store whose range reads block until [`open`](Gated::open) is called.
pub(crate) struct Gated {
    inner: Arc<MemoryStore>,
    gate: watch::Sender<bool>,
    reads: AtomicUsize,
}

impl Gated {
    pub(crate) fn new(inner: Arc<MemoryStore>) -> Self {
        let (gate, _) = watch::channel(false);
        Self { inner, gate, reads: AtomicUsize::new(0) }
    }

    pub(crate) fn open(&self) {
        self.gate.send_replace(true);
    }

    /// Range reads started so far, including those still waiting.
    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for Gated {
    async fn get_metadata(&self, identity: &DatasetIdentity) -> StoreResult<Option<DatasetMetadata>> {
        self.inner.get_metadata(identity).await
    }
    async fn put_metadata(&self, metadata: &DatasetMetadata) -> StoreResult<()> {
        self.inner.put_metadata(metadata).await
    }
    async fn put_account_range(&self, identity: &DatasetIdentity, start: usize, records: &[AccountRecord])
    -> StoreResult<()> {
        self.inner.put_account_range(identity, start, records).await
    }
    async fn get_account_range(&self, identity: &DatasetIdentity, start: usize, end: usize)
    -> StoreResult<Vec<AccountRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        // The sender lives as long as the store, so this only returns once open.
        let _ = gate.wait_for(|open| *open).await;
        self.inner.get_account_range(identity, start, end).await
    }
    async fn get_badge_stats(&self, identity: &DatasetIdentity) -> StoreResult<Option<BadgeStats>> {
        self.inner.get_badge_stats(identity).await
    }
    async fn put_badge_stats(&self, identity: &DatasetIdentity, stats: &BadgeStats) -> StoreResult<()> {
        self.inner.put_badge_stats(identity, stats).await
    }
    async fn list_datasets(&self) -> StoreResult<Vec<DatasetMetadata>> {
        self.inner.list_datasets().await
    }
    async fn delete_dataset(&self, identity: &DatasetIdentity) -> StoreResult<()> {
        self.inner.delete_dataset(identity).await
    }
}
