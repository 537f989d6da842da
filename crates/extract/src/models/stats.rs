use super::{AccountRecord, BadgeKey, BadgeSet};
use std::ops::Index;

/// Per-badge account counts for a dataset.
///
/// Derived once when ingestion completes; `stats[k]` always equals the number
/// of accounts carrying badge `k`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeStats {
    counts: [u64; BadgeKey::COUNT],
}

impl BadgeStats {
    pub fn get(&self, badge: BadgeKey) -> u64 {
        self.counts[badge.ordinal()]
    }

    pub fn set(&mut self, badge: BadgeKey, count: u64) {
        self.counts[badge.ordinal()] = count;
    }

    /// Count one account carrying `badges`.
    pub fn record(&mut self, badges: BadgeSet) {
        for badge in badges.iter() {
            self.counts[badge.ordinal()] += 1;
        }
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AccountRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.record(record.badges);
        }
        stats
    }

    /// Every badge with its count, in [`BadgeKey::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (BadgeKey, u64)> + '_ {
        BadgeKey::ALL.into_iter().map(|badge| (badge, self.get(badge)))
    }
}

impl Index<BadgeKey> for BadgeStats {
    type Output = u64;
    fn index(&self, badge: BadgeKey) -> &u64 {
        &self.counts[badge.ordinal()]
    }
}

impl FromIterator<(BadgeKey, u64)> for BadgeStats {
    fn from_iter<T: IntoIterator<Item = (BadgeKey, u64)>>(iter: T) -> Self {
        let mut stats = Self::default();
        for (badge, count) in iter {
            stats.set(badge, count);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records() {
        let records = [
            AccountRecord::new(0, "alice", [BadgeKey::Following, BadgeKey::Followers].into_iter().collect::<BadgeSet>().with_derived()),
            AccountRecord::new(1, "bob", BadgeSet::from(BadgeKey::Following).with_derived()),
            AccountRecord::new(2, "carol", BadgeSet::from(BadgeKey::Followers).with_derived()),
        ];
        let stats = BadgeStats::from_records(&records);
        assert_eq!(stats[BadgeKey::Following], 2);
        assert_eq!(stats[BadgeKey::Followers], 2);
        assert_eq!(stats[BadgeKey::Mutuals], 1);
        assert_eq!(stats[BadgeKey::NotFollowingBack], 1);
        assert_eq!(stats[BadgeKey::NotFollowedBack], 1);
        assert_eq!(stats[BadgeKey::Pending], 0);
        assert_eq!(stats.iter().count(), BadgeKey::COUNT);
    }

    #[test]
    fn test_collect_from_pairs() {
        let stats: BadgeStats = [(BadgeKey::Close, 4), (BadgeKey::Dismissed, 9)].into_iter().collect();
        assert_eq!(stats.get(BadgeKey::Close), 4);
        assert_eq!(stats.get(BadgeKey::Dismissed), 9);
        assert_eq!(stats.get(BadgeKey::Following), 0);
    }
}
