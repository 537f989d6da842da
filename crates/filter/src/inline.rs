use crate::FilterEngine;
use crate::error::{ErrorKind, Result};
use crate::index::FilterIndex;
use async_trait::async_trait;
use exn::OptionExt;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{BadgeSet, BadgeStats};
use rollcall_store::StoreHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Filter engine that runs on the caller's task.
///
/// Also the engine hosted by the worker thread, so both paths share one
/// algorithm.
pub struct InlineEngine {
    store: StoreHandle,
    index: Mutex<Option<Arc<FilterIndex>>>,
    // Serialises (re)initialisation so two loads never race.
    init: tokio::sync::Mutex<()>,
    // Bumped by teardown; a load started under an older value is discarded.
    generation: AtomicU64,
}

impl InlineEngine {
    pub fn new(store: StoreHandle) -> Self {
        Self { store, index: Mutex::new(None), init: tokio::sync::Mutex::new(()), generation: AtomicU64::new(0) }
    }

    fn current(&self) -> Option<Arc<FilterIndex>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, index: Option<Arc<FilterIndex>>) {
        *self.index.lock().unwrap_or_else(PoisonError::into_inner) = index;
    }

    /// Install a freshly loaded index unless teardown happened since
    /// `generation` was read.
    fn install(&self, generation: u64, index: Arc<FilterIndex>) -> bool {
        let mut slot = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *slot = Some(index);
        true
    }

    fn teardown(&self) {
        let mut slot = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *slot = None;
    }

    fn ready_index(&self) -> Result<Arc<FilterIndex>> {
        self.current().ok_or_raise(|| ErrorKind::NotReady)
    }
}

#[async_trait]
impl FilterEngine for InlineEngine {
    async fn initialize(&self, identity: &DatasetIdentity, total_accounts: usize) -> Result<()> {
        let _guard = self.init.lock().await;
        if let Some(index) = self.current() {
            if index.identity() == identity {
                return Ok(());
            }
            tracing::debug!(previous = %index.identity().short(), next = %identity.short(), "Discarding filter index");
        }
        // Drop the previous dataset before loading the next one.
        self.replace(None);
        let generation = self.generation.load(Ordering::SeqCst);
        let index = FilterIndex::load(&self.store, identity, total_accounts).await?;
        let accounts = index.len();
        if self.install(generation, Arc::new(index)) {
            tracing::debug!(identity = %identity.short(), accounts, "Filter index ready");
        } else {
            tracing::debug!(identity = %identity.short(), "Engine torn down during load, discarding index");
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    async fn filter_to_indices(&self, query: &str, badges: BadgeSet) -> Result<Vec<usize>> {
        Ok(self.ready_index()?.filter(query, badges))
    }

    async fn get_stats(&self) -> Result<BadgeStats> {
        Ok(self.ready_index()?.stats())
    }

    async fn reset(&self) -> Result<()> {
        self.teardown();
        Ok(())
    }

    async fn dispose(&self) {
        self.teardown();
    }
}
