//! Search and badge filtering over one dataset at a time.
//!
//! An engine is bound to a dataset with [`FilterEngine::initialize`], which
//! loads every account's username and badges from the record store into a
//! [`FilterIndex`]. Queries return ascending account indices; the caller
//! resolves those to full records through the windowed source.
//!
//! Three engines are provided:
//!
//! - [`InlineEngine`] runs on the caller's task;
//! - [`WorkerEngine`] forwards every call to a dedicated thread;
//! - [`FallbackEngine`] prefers the worker and switches to the inline engine
//!   when the worker can't be started, crashes, or stops answering.

pub mod error;
mod fallback;
mod index;
mod inline;
#[cfg(test)]
mod testing;
mod worker;

use crate::error::Result;
use async_trait::async_trait;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{BadgeSet, BadgeStats};
use std::sync::Arc;

pub use crate::fallback::FallbackEngine;
pub use crate::index::FilterIndex;
pub use crate::inline::InlineEngine;
pub use crate::worker::WorkerEngine;

pub type EngineHandle = Arc<dyn FilterEngine + Send + Sync>;

#[async_trait]
pub trait FilterEngine: Send + Sync {
    /// Bind the engine to a dataset of `total_accounts` accounts.
    ///
    /// A no-op if already bound to `identity`. Binding to another dataset
    /// discards the previous index first.
    async fn initialize(&self, identity: &DatasetIdentity, total_accounts: usize) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Ascending indices of the accounts matching `query` and `badges`.
    ///
    /// An empty or whitespace query matches every username; an empty badge
    /// set matches every account.
    async fn filter_to_indices(&self, query: &str, badges: BadgeSet) -> Result<Vec<usize>>;

    async fn get_stats(&self) -> Result<BadgeStats>;

    /// Unbind the current dataset.
    async fn reset(&self) -> Result<()>;

    /// Release the engine's resources.
    async fn dispose(&self);
}
