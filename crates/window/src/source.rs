use crate::cache::SliceCache;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::AccountRecord;
use rollcall_store::StoreHandle;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOptions {
    /// Records per slice.
    pub slice_size: usize,
    /// Resident slices kept after an eviction pass.
    pub max_slices: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self { slice_size: 100, max_slices: 20 }
    }
}

struct State {
    identity: Option<DatasetIdentity>,
    total_accounts: usize,
    // Bumped whenever cached data stops being valid; fetches started under an
    // older generation are dropped on completion.
    generation: u64,
    cache: SliceCache,
}

struct Inner {
    store: StoreHandle,
    runtime: Handle,
    state: Mutex<State>,
    landed: watch::Sender<u64>,
}

/// Synchronous, best-effort access to a dataset's records by index.
///
/// Records are fetched from the store in fixed-size slices on the runtime the
/// source was created with. [`get_account`](Self::get_account) never waits:
/// a miss starts a fetch and returns `None`, and [`subscribe`](Self::subscribe)
/// tells the renderer when to ask again.
#[derive(Clone)]
pub struct WindowedSource {
    inner: Arc<Inner>,
}

impl WindowedSource {
    /// Create a source that spawns its fetches on the current Tokio runtime.
    pub fn new(store: StoreHandle, options: WindowOptions) -> Result<Self> {
        let runtime = Handle::try_current().or_raise(|| ErrorKind::NoRuntime)?;
        Self::with_runtime(store, options, runtime)
    }

    pub fn with_runtime(store: StoreHandle, options: WindowOptions, runtime: Handle) -> Result<Self> {
        if options.slice_size == 0 {
            exn::bail!(ErrorKind::InvalidConfig("slice_size"));
        }
        if options.max_slices == 0 {
            exn::bail!(ErrorKind::InvalidConfig("max_slices"));
        }
        let state = State {
            identity: None,
            total_accounts: 0,
            generation: 0,
            cache: SliceCache::new(options.slice_size, options.max_slices),
        };
        let (landed, _) = watch::channel(0);
        Ok(Self { inner: Arc::new(Inner { store, runtime, state: Mutex::new(state), landed }) })
    }

    /// Bind the source to a dataset of `total_accounts` records.
    ///
    /// Changing the dataset clears the cache; fetches still in flight for
    /// the previous one are ignored when they land.
    pub fn set_dataset(&self, identity: &DatasetIdentity, total_accounts: usize) {
        let mut state = self.inner.lock();
        if state.identity.as_ref() == Some(identity) && state.total_accounts == total_accounts {
            return;
        }
        tracing::debug!(identity = %identity.short(), total_accounts, "Windowed source bound to dataset");
        state.identity = Some(identity.clone());
        state.total_accounts = total_accounts;
        state.invalidate();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().total_accounts
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slices currently cached.
    pub fn resident_slices(&self) -> usize {
        self.inner.lock().cache.resident()
    }

    /// Receiver whose value increments every time a slice lands.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.landed.subscribe()
    }

    /// The record at `index`, if its slice is cached.
    ///
    /// On a miss the owning slice is fetched in the background, unless a
    /// fetch for it is already running, and `None` is returned.
    pub fn get_account(&self, index: usize) -> Option<AccountRecord> {
        let mut state = self.inner.lock();
        if state.identity.is_none() || index >= state.total_accounts {
            return None;
        }
        if let Some(record) = state.cache.get(index) {
            return record;
        }
        let start = state.cache.slice_start(index);
        self.inner.fetch(&mut state, start);
        None
    }

    /// Best-effort prefetch of the slices just before and just after the
    /// visible range `[visible_start, visible_end)`.
    pub fn preload_adjacent(&self, visible_start: usize, visible_end: usize) {
        let mut state = self.inner.lock();
        if state.identity.is_none() || visible_start >= state.total_accounts {
            return;
        }
        let slice_size = state.cache.slice_size();
        let first = state.cache.slice_start(visible_start);
        let last = state.cache.slice_start(visible_end.saturating_sub(1).max(visible_start));
        if let Some(before) = first.checked_sub(slice_size) {
            self.inner.fetch(&mut state, before);
        }
        let after = last + slice_size;
        if after < state.total_accounts {
            self.inner.fetch(&mut state, after);
        }
    }

    /// Fetch exactly the records at `indices`, in ascending index order.
    ///
    /// Nearby indices are grouped into ranges so each range costs one store
    /// read. A failed read is logged and its indices are left out.
    #[instrument(skip_all, fields(requested = indices.len()))]
    pub async fn get_by_indices(&self, indices: &[usize]) -> Vec<AccountRecord> {
        let (identity, slice_size, total_accounts) = {
            let state = self.inner.lock();
            match &state.identity {
                Some(identity) => (identity.clone(), state.cache.slice_size(), state.total_accounts),
                None => return Vec::new(),
            }
        };
        let mut wanted: Vec<usize> = indices.iter().copied().filter(|index| *index < total_accounts).collect();
        wanted.sort_unstable();
        wanted.dedup();

        let mut found = Vec::with_capacity(wanted.len());
        for range in merge_ranges(&wanted, slice_size) {
            let records = match self.inner.store.get_account_range(&identity, range.start, range.end).await {
                Ok(records) => records,
                Err(error) => {
                    tracing::warn!(?error, start = range.start, end = range.end, "Could not read account range");
                    continue;
                },
            };
            let mut requested = wanted.iter().copied().filter(|index| range.contains(index)).peekable();
            for record in records {
                while requested.next_if(|index| *index < record.index).is_some() {}
                if requested.next_if_eq(&record.index).is_some() {
                    found.push(record);
                }
            }
        }
        found
    }

    /// Drop every cached slice. Fetches in flight are ignored when they land.
    pub fn clear_cache(&self) {
        self.inner.lock().invalidate();
    }

    /// Unbind the dataset and drop everything cached.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        state.identity = None;
        state.total_accounts = 0;
        state.invalidate();
    }
}

impl State {
    fn invalidate(&mut self) {
        self.generation += 1;
        self.cache.clear();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start fetching the slice at `start` unless it is cached or already
    /// being fetched.
    fn fetch(self: &Arc<Self>, state: &mut State, start: usize) {
        let Some(identity) = state.identity.clone() else {
            return;
        };
        if start >= state.total_accounts || !state.cache.begin_load(start) {
            return;
        }
        let end = (start + state.cache.slice_size()).min(state.total_accounts);
        let generation = state.generation;
        let inner = Arc::clone(self);
        self.runtime.spawn(async move { inner.load_slice(identity, generation, start, end).await });
    }

    async fn load_slice(&self, identity: DatasetIdentity, generation: u64, start: usize, end: usize) {
        let records = match self.store.get_account_range(&identity, start, end).await {
            Ok(records) => records,
            // Cached empty so the renderer doesn't refetch it on every frame.
            Err(error) => {
                tracing::warn!(?error, start, end, "Could not load slice, treating it as empty");
                Vec::new()
            },
        };
        {
            let mut state = self.lock();
            if state.generation != generation {
                tracing::debug!(start, end, "Dropping stale slice");
                return;
            }
            let evicted = state.cache.complete_load(start, end, records);
            if evicted > 0 {
                tracing::debug!(evicted, resident = state.cache.resident(), "Evicted slices");
            }
        }
        self.landed.send_modify(|landed| *landed += 1);
    }
}

/// Group ascending `indices` into half-open ranges, merging neighbours
/// separated by a gap smaller than half of `slice_size`.
fn merge_ranges(indices: &[usize], slice_size: usize) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for &index in indices {
        match ranges.last_mut() {
            Some(range) if (index - range.end) * 2 < slice_size => range.end = index + 1,
            _ => ranges.push(index..index + 1),
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rollcall_extract::models::{BadgeSet, BadgeStats, DatasetMetadata};
    use rollcall_store::error::Result as StoreResult;
    use rollcall_store::{MemoryStore, RecordStore};
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    async fn seed(store: &MemoryStore, seed: &[u8], total: usize) -> DatasetIdentity {
        let identity = rollcall_archive::identify(seed);
        let records: Vec<_> = (0..total)
            .map(|index| AccountRecord::new(index, format!("{}{index}", String::from_utf8_lossy(seed)), BadgeSet::empty()))
            .collect();
        store.put_account_range(&identity, 0, &records).await.unwrap();
        identity
    }

    async fn source(total: usize, options: WindowOptions) -> (Arc<MemoryStore>, WindowedSource, DatasetIdentity) {
        let memory = Arc::new(MemoryStore::new());
        let identity = seed(&memory, b"user", total).await;
        let source = WindowedSource::new(memory.clone(), options).unwrap();
        source.set_dataset(&identity, total);
        (memory, source, identity)
    }

    fn options(slice_size: usize, max_slices: usize) -> WindowOptions {
        WindowOptions { slice_size, max_slices }
    }

    /// Wraps a store so that range reads wait for a permit.
    struct Gated {
        inner: Arc<MemoryStore>,
        permits: Semaphore,
        reads: AtomicUsize,
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
            if let Ok(permit) = self.permits.acquire().await {
                permit.forget();
            }
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

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[rstest]
    #[case(&[], 100, vec![])]
    #[case(&[3], 100, vec![3..4])]
    #[case(&[1, 2, 3], 100, vec![1..4])]
    #[case(&[0, 49], 100, vec![0..50])]
    #[case(&[0, 51], 100, vec![0..1, 51..52])]
    #[case(&[0, 10, 200, 210], 100, vec![0..11, 200..211])]
    #[case(&[0, 51], 101, vec![0..52])]
    #[case(&[0, 52], 101, vec![0..1, 52..53])]
    #[case(&[3, 4, 5], 1, vec![3..6])]
    #[case(&[3, 5], 1, vec![3..4, 5..6])]
    fn test_merge_ranges(#[case] indices: &[usize], #[case] slice_size: usize, #[case] expected: Vec<Range<usize>>) {
        assert_eq!(merge_ranges(indices, slice_size), expected);
    }

    #[test]
    fn test_invalid_options() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let err = WindowedSource::with_runtime(store.clone(), options(0, 20), runtime.handle().clone())
            .err()
            .unwrap();
        assert_eq!(*err, ErrorKind::InvalidConfig("slice_size"));
        let err = WindowedSource::with_runtime(store, options(100, 0), runtime.handle().clone()).err().unwrap();
        assert_eq!(*err, ErrorKind::InvalidConfig("max_slices"));
    }

    #[test]
    fn test_requires_runtime() {
        let store: StoreHandle = Arc::new(MemoryStore::new());
        let err = WindowedSource::new(store, WindowOptions::default()).err().unwrap();
        assert_eq!(*err, ErrorKind::NoRuntime);
    }

    #[tokio::test]
    async fn test_get_account_fetches_on_miss() {
        let (memory, source, _) = source(250, options(100, 20)).await;
        let mut landed = source.subscribe();
        assert_eq!(source.len(), 250);

        assert_eq!(source.get_account(150), None);
        // A second miss on the same slice doesn't start another fetch.
        assert_eq!(source.get_account(199), None);
        landed.changed().await.unwrap();
        assert_eq!(memory.range_reads(), 1);
        assert_eq!(source.resident_slices(), 1);

        assert_eq!(source.get_account(150).unwrap().username, "user150");
        assert_eq!(source.get_account(100).unwrap().index, 100);
        assert_eq!(source.get_account(99), None);
        assert_eq!(source.get_account(250), None);
        landed.changed().await.unwrap();
        assert_eq!(memory.range_reads(), 2);
    }

    #[tokio::test]
    async fn test_last_slice_is_short() {
        let (_, source, _) = source(250, options(100, 20)).await;
        let mut landed = source.subscribe();
        assert_eq!(source.get_account(249), None);
        landed.changed().await.unwrap();
        assert_eq!(source.get_account(249).unwrap().username, "user249");
        assert_eq!(source.get_account(250), None);
    }

    #[tokio::test]
    async fn test_failed_slice_reads_as_empty() {
        let (memory, source, _) = source(250, options(100, 20)).await;
        let mut landed = source.subscribe();
        memory.fail_reads(true);
        assert_eq!(source.get_account(10), None);
        landed.changed().await.unwrap();
        memory.fail_reads(false);
        assert_eq!(source.get_account(10), None);
        assert_eq!(memory.range_reads(), 1);

        source.clear_cache();
        assert_eq!(source.get_account(10), None);
        landed.changed().await.unwrap();
        assert_eq!(source.get_account(10).unwrap().index, 10);
    }

    #[tokio::test]
    async fn test_preload_adjacent() {
        let (memory, source, _) = source(1_000, options(100, 20)).await;
        source.preload_adjacent(250, 350);
        settle().await;
        assert_eq!(memory.range_reads(), 2);
        assert_eq!(source.resident_slices(), 2);
        assert!(source.get_account(199).is_some());
        assert!(source.get_account(400).is_some());

        // Already cached: nothing new.
        source.preload_adjacent(250, 350);
        settle().await;
        assert_eq!(memory.range_reads(), 2);

        // Nothing before the first slice or after the last; slice 100 is
        // already resident.
        source.preload_adjacent(0, 50);
        source.preload_adjacent(950, 1_000);
        settle().await;
        assert_eq!(memory.range_reads(), 3);
        assert!(source.get_account(800).is_some());
    }

    #[tokio::test]
    async fn test_cache_stays_bounded() {
        let (_, source, _) = source(10_000, options(10, 4)).await;
        for index in (0..70).step_by(10) {
            source.get_account(index);
            settle().await;
        }
        assert_eq!(source.resident_slices(), 4);
        assert!(source.get_account(60).is_some());
        assert!(source.get_account(0).is_none());
    }

    #[tokio::test]
    async fn test_get_by_indices() {
        let (memory, source, _) = source(1_000, options(100, 20)).await;
        let records = source.get_by_indices(&[510, 3, 5, 3, 40, 999, 1_000, 520]).await;
        let indices: Vec<usize> = records.iter().map(|record| record.index).collect();
        assert_eq!(indices, vec![3, 5, 40, 510, 520, 999]);
        // [3, 40], [510, 520] and [999].
        assert_eq!(memory.range_reads(), 3);
        assert_eq!(source.resident_slices(), 0);

        memory.fail_reads(true);
        assert!(source.get_by_indices(&[1, 2]).await.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_indices_single_record_slices() {
        let (memory, source, _) = source(20, options(1, 4)).await;
        let records = source.get_by_indices(&[3, 4, 5, 9]).await;
        let indices: Vec<usize> = records.iter().map(|record| record.index).collect();
        assert_eq!(indices, vec![3, 4, 5, 9]);
        // [3, 5] and [9].
        assert_eq!(memory.range_reads(), 2);
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let memory = Arc::new(MemoryStore::new());
        let first = seed(&memory, b"first", 50).await;
        let second = seed(&memory, b"second", 50).await;
        let gated = Arc::new(Gated { inner: memory, permits: Semaphore::new(0), reads: AtomicUsize::new(0) });
        let source = WindowedSource::new(gated.clone(), options(100, 20)).unwrap();
        let landed = source.subscribe();

        source.set_dataset(&first, 50);
        assert_eq!(source.get_account(0), None);
        settle().await;
        assert_eq!(gated.reads.load(Ordering::SeqCst), 1);

        source.set_dataset(&second, 50);
        gated.permits.add_permits(1);
        settle().await;
        assert_eq!(source.resident_slices(), 0);
        assert!(!landed.has_changed().unwrap());

        // The new dataset fetches its own slice.
        gated.permits.add_permits(1);
        assert_eq!(source.get_account(0), None);
        settle().await;
        assert_eq!(source.get_account(0).unwrap().username, "second0");
    }

    #[tokio::test]
    async fn test_dispose() {
        let (_, source, _) = source(100, options(10, 4)).await;
        let mut landed = source.subscribe();
        source.get_account(0);
        landed.changed().await.unwrap();
        source.dispose();
        assert_eq!(source.resident_slices(), 0);
        assert!(source.is_empty());
        assert_eq!(source.get_account(0), None);
        settle().await;
        assert_eq!(source.resident_slices(), 0);
    }
}
