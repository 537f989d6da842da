use super::{BadgeKey, BadgeSet};

/// One unified account in a dataset.
///
/// `index` is 0-based and follows first-seen order during ingestion; it stays
/// stable for the dataset's lifetime. Records are immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub index: usize,
    pub username: String,
    pub badges: BadgeSet,
}

impl AccountRecord {
    pub fn new(index: usize, username: impl Into<String>, badges: BadgeSet) -> Self {
        Self { index, username: username.into(), badges }
    }

    pub fn has(&self, badge: BadgeKey) -> bool {
        self.badges.contains(badge)
    }
}
