use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use memchr::memmem::Finder;
use rollcall_archive::DatasetIdentity;
use rollcall_extract::models::{AccountRecord, BadgeSet, BadgeStats};
use rollcall_store::StoreHandle;
use tracing::instrument;

// Records per store read while building the index.
const LOAD_CHUNK: usize = 10_000;

/// In-memory search index over one dataset.
///
/// Holds a lowercased username and the badge set of every account, indexed
/// by account index, plus the precomputed badge stats.
#[derive(Debug, Clone)]
pub struct FilterIndex {
    identity: DatasetIdentity,
    usernames: Vec<String>,
    badges: Vec<BadgeSet>,
    stats: BadgeStats,
}

impl FilterIndex {
    /// Build the index for `identity` from the store.
    ///
    /// Badge stats are taken from the store; they are only recomputed if the
    /// stored copy is missing.
    #[instrument(skip(store), fields(identity = %identity.short()))]
    pub async fn load(store: &StoreHandle, identity: &DatasetIdentity, total_accounts: usize) -> Result<Self> {
        let mut records = Vec::with_capacity(total_accounts);
        let mut start = 0;
        while start < total_accounts {
            let end = (start + LOAD_CHUNK).min(total_accounts);
            let chunk = store.get_account_range(identity, start, end).await.or_raise(|| ErrorKind::Store)?;
            if chunk.len() != end - start {
                tracing::warn!(start, end, found = chunk.len(), "Dataset range is incomplete");
                exn::bail!(ErrorKind::Inconsistent);
            }
            records.extend(chunk);
            start = end;
        }
        let stats = store.get_badge_stats(identity).await.or_raise(|| ErrorKind::Store)?;
        if stats.is_none() {
            tracing::debug!("No stored badge stats, recomputing");
        }
        Self::from_records(identity.clone(), records, stats)
    }

    /// Build an index from records already in memory.
    ///
    /// `records[i].index` must equal `i`.
    pub fn from_records(identity: DatasetIdentity, records: Vec<AccountRecord>, stats: Option<BadgeStats>) -> Result<Self> {
        let mut usernames = Vec::with_capacity(records.len());
        let mut badges = Vec::with_capacity(records.len());
        for (position, record) in records.into_iter().enumerate() {
            if record.index != position {
                exn::bail!(ErrorKind::Inconsistent);
            }
            usernames.push(record.username.to_lowercase());
            badges.push(record.badges);
        }
        let stats = stats.unwrap_or_else(|| {
            let mut computed = BadgeStats::default();
            badges.iter().for_each(|set| computed.record(*set));
            computed
        });
        Ok(Self { identity, usernames, badges, stats })
    }

    pub fn identity(&self) -> &DatasetIdentity {
        &self.identity
    }

    pub fn len(&self) -> usize {
        self.usernames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usernames.is_empty()
    }

    pub fn stats(&self) -> BadgeStats {
        self.stats
    }

    /// Ascending indices of accounts matching both conditions:
    ///
    /// - `badges` is empty, or the account carries at least one of them;
    /// - `query` is empty or whitespace, or the username contains it
    ///   (case-insensitive).
    pub fn filter(&self, query: &str, badges: BadgeSet) -> Vec<usize> {
        let needle = query.trim().to_lowercase();
        let finder = (!needle.is_empty()).then(|| Finder::new(needle.as_bytes()));
        self.usernames
            .iter()
            .zip(&self.badges)
            .enumerate()
            .filter(|(_, (username, set))| {
                (badges.is_empty() || set.intersects(badges))
                    && finder.as_ref().is_none_or(|f| f.find(username.as_bytes()).is_some())
            })
            .map(|(index, _)| index)
            .collect()
    }
}
