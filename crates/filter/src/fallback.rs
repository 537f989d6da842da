use crate::error::{Error, ErrorKind, Result};
use crate::inline::InlineEngine;
use crate::worker::WorkerEngine;
use crate::{EngineHandle, FilterEngine};
use async_trait::async_trait;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{BadgeSet, BadgeStats};
use rollcall_store::StoreHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Filter engine that prefers the worker thread and transparently falls back
/// to the inline engine.
///
/// The worker is probed once at construction. If it can't be started, or
/// later crashes or times out, the inline engine takes over: it is bound to
/// the remembered dataset and the failed request is replayed, so callers only
/// ever notice extra latency.
pub struct FallbackEngine {
    store: StoreHandle,
    engine: RwLock<EngineHandle>,
    isolated: RwLock<bool>,
    binding: Mutex<Option<(DatasetIdentity, usize)>>,
    disposed: AtomicBool,
}

impl FallbackEngine {
    pub fn new(store: StoreHandle, prefer_worker: bool, timeout: Duration) -> Self {
        let worker = if prefer_worker {
            match WorkerEngine::spawn(store.clone(), timeout) {
                Ok(worker) => Some(worker),
                Err(error) => {
                    tracing::warn!(?error, "Filter worker unavailable, filtering inline");
                    None
                },
            }
        } else {
            None
        };
        let isolated = worker.is_some();
        let engine: EngineHandle = match worker {
            Some(worker) => Arc::new(worker),
            None => Arc::new(InlineEngine::new(store.clone())),
        };
        Self::with_engine(store, engine, isolated)
    }

    /// Wrap an existing engine. `isolated` marks it as one that may fail with
    /// infrastructure errors and should be replaced on the first one.
    pub fn with_engine(store: StoreHandle, engine: EngineHandle, isolated: bool) -> Self {
        Self {
            store,
            engine: RwLock::new(engine),
            isolated: RwLock::new(isolated),
            binding: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Whether requests are currently served by the worker thread.
    pub fn is_isolated(&self) -> bool {
        *self.isolated.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::NotReady);
        }
        Ok(())
    }

    fn current(&self) -> EngineHandle {
        Arc::clone(&self.engine.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn binding(&self) -> Option<(DatasetIdentity, usize)> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_binding(&self, binding: Option<(DatasetIdentity, usize)>) {
        *self.binding.lock().unwrap_or_else(PoisonError::into_inner) = binding;
    }

    /// Swap `failed` for an inline engine bound to the current dataset.
    ///
    /// Returns the error unchanged when it isn't an infrastructure failure.
    async fn recover(&self, failed: &EngineHandle, error: Error) -> Result<EngineHandle> {
        // Errors from an engine torn down mid-request are expected.
        if !error.is_infrastructure() || self.disposed.load(Ordering::SeqCst) {
            return Err(error);
        }
        let replacement = {
            let mut engine = self.engine.write().unwrap_or_else(PoisonError::into_inner);
            if Arc::ptr_eq(&engine, failed) {
                tracing::warn!(?error, "Filter worker failed, switching to inline filtering");
                let inline: EngineHandle = Arc::new(InlineEngine::new(self.store.clone()));
                *engine = Arc::clone(&inline);
                *self.isolated.write().unwrap_or_else(PoisonError::into_inner) = false;
                inline
            } else {
                // Another request already replaced it.
                Arc::clone(&engine)
            }
        };
        if !Arc::ptr_eq(&replacement, failed) {
            failed.dispose().await;
        }
        if let Some((identity, total_accounts)) = self.binding() {
            replacement.initialize(&identity, total_accounts).await?;
        }
        Ok(replacement)
    }
}

#[async_trait]
impl FilterEngine for FallbackEngine {
    async fn initialize(&self, identity: &DatasetIdentity, total_accounts: usize) -> Result<()> {
        self.ensure_live()?;
        self.set_binding(Some((identity.clone(), total_accounts)));
        let engine = self.current();
        match engine.initialize(identity, total_accounts).await {
            // `recover` already binds the replacement to this dataset.
            Err(error) => self.recover(&engine, error).await.map(|_| ()),
            ok => ok,
        }
    }

    fn is_ready(&self) -> bool {
        self.current().is_ready()
    }

    async fn filter_to_indices(&self, query: &str, badges: BadgeSet) -> Result<Vec<usize>> {
        self.ensure_live()?;
        let engine = self.current();
        match engine.filter_to_indices(query, badges).await {
            Err(error) => self.recover(&engine, error).await?.filter_to_indices(query, badges).await,
            ok => ok,
        }
    }

    async fn get_stats(&self) -> Result<BadgeStats> {
        self.ensure_live()?;
        let engine = self.current();
        match engine.get_stats().await {
            Err(error) => self.recover(&engine, error).await?.get_stats().await,
            ok => ok,
        }
    }

    async fn reset(&self) -> Result<()> {
        self.ensure_live()?;
        self.set_binding(None);
        let engine = self.current();
        match engine.reset().await {
            Err(error) => self.recover(&engine, error).await?.reset().await,
            ok => ok,
        }
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.set_binding(None);
        self.current().dispose().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{records, seeded_store};
    use async_trait::async_trait;
    use rollcall_extract::models::{AccountRecord, BadgeKey, DatasetMetadata};
    use rollcall_store::RecordStore;
    use rollcall_store::error::Result as StoreResult;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Store whose first range read panics, taking the worker thread down.
    struct PanicOnce {
        inner: StoreHandle,
        armed: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for PanicOnce {
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
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("simulated worker crash");
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

    /// Engine that always fails with a fixed error kind.
    struct Broken {
        kind: ErrorKind,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FilterEngine for Broken {
        async fn initialize(&self, _: &DatasetIdentity, _: usize) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            exn::bail!(self.kind.clone())
        }
        fn is_ready(&self) -> bool {
            false
        }
        async fn filter_to_indices(&self, _: &str, _: BadgeSet) -> Result<Vec<usize>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            exn::bail!(self.kind.clone())
        }
        async fn get_stats(&self) -> Result<BadgeStats> {
            exn::bail!(self.kind.clone())
        }
        async fn reset(&self) -> Result<()> {
            Ok(())
        }
        async fn dispose(&self) {}
    }

    #[tokio::test]
    async fn test_worker_crash_falls_back_and_replays() {
        let (_, inner, identity) = seeded_store(&["alice", "bob", "carol"]).await;
        let store: StoreHandle = Arc::new(PanicOnce { inner, armed: AtomicBool::new(true) });
        let engine = FallbackEngine::new(store, true, Duration::from_secs(5));
        assert!(engine.is_isolated());

        engine.initialize(&identity, 3).await.unwrap();
        assert!(!engine.is_isolated());
        assert!(engine.is_ready());
        assert_eq!(engine.filter_to_indices("", BadgeKey::Mutuals.into()).await.unwrap(), vec![0]);
        assert_eq!(engine.get_stats().await.unwrap()[BadgeKey::Following], 2);
    }

    #[tokio::test]
    async fn test_fallback_rebinds_remembered_dataset() {
        let (_, store, identity) = seeded_store(&["alice", "bob", "carol"]).await;
        let broken = Arc::new(Broken { kind: ErrorKind::Timeout, calls: AtomicUsize::new(0) });
        let engine = FallbackEngine::with_engine(store.clone(), broken.clone(), true);

        // Initialization goes through the broken engine, then the inline one.
        engine.initialize(&identity, 3).await.unwrap();
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.filter_to_indices("bob", BadgeKey::Following.into()).await.unwrap(), vec![1]);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);

        // Same answers as a plain inline engine.
        let inline = InlineEngine::new(store);
        inline.initialize(&identity, 3).await.unwrap();
        for badge in BadgeKey::ALL {
            assert_eq!(
                engine.filter_to_indices("", badge.into()).await.unwrap(),
                inline.filter_to_indices("", badge.into()).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_engine_errors_are_not_masked() {
        let (_, store, _) = seeded_store(&["alice"]).await;
        let broken = Arc::new(Broken { kind: ErrorKind::NotReady, calls: AtomicUsize::new(0) });
        let engine = FallbackEngine::with_engine(store, broken, true);
        let err = engine.filter_to_indices("", BadgeSet::empty()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotReady);
        assert!(engine.is_isolated());
    }

    #[tokio::test]
    async fn test_disposed_engine_stays_down() {
        let (_, store, identity) = seeded_store(&["alice"]).await;
        let broken = Arc::new(Broken { kind: ErrorKind::Timeout, calls: AtomicUsize::new(0) });
        let engine = FallbackEngine::with_engine(store, broken.clone(), true);
        engine.dispose().await;

        assert_eq!(*engine.filter_to_indices("", BadgeSet::empty()).await.unwrap_err(), ErrorKind::NotReady);
        assert_eq!(*engine.initialize(&identity, 1).await.unwrap_err(), ErrorKind::NotReady);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 0);
        // No inline replacement was started.
        assert!(engine.is_isolated());
        assert!(!engine.is_ready());
    }

    #[tokio::test]
    async fn test_disposed_worker_is_not_replaced() {
        let (_, store, identity) = seeded_store(&["alice", "bob"]).await;
        let engine = FallbackEngine::new(store, true, Duration::from_secs(5));
        engine.initialize(&identity, 2).await.unwrap();
        assert!(engine.is_isolated());
        engine.dispose().await;

        assert_eq!(*engine.get_stats().await.unwrap_err(), ErrorKind::NotReady);
        assert!(engine.is_isolated());
    }

    #[tokio::test]
    async fn test_inline_only_when_worker_not_preferred() {
        let (_, store, identity) = seeded_store(&["alice", "bob"]).await;
        let engine = FallbackEngine::new(store, false, Duration::from_secs(5));
        assert!(!engine.is_isolated());
        engine.initialize(&identity, 2).await.unwrap();
        assert_eq!(engine.filter_to_indices("", BadgeSet::empty()).await.unwrap().len(), records(&["alice", "bob"]).len());
    }
}
