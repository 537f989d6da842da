use rollcall_extract::models::{AccountRecord, BadgeSet, BadgeStats};
use rollcall_extract::{LogicalFile, RawEntry, username_key};
use std::collections::HashMap;

/// Unifies entries from every relationship list into one record per account.
///
/// Indices follow first-seen order. The same account appearing in several
/// lists (compared case-insensitively) gets the union of their badges and
/// keeps the spelling it was first seen with.
#[derive(Debug, Default)]
pub(crate) struct Merger {
    positions: HashMap<String, usize>,
    records: Vec<AccountRecord>,
}

impl Merger {
    pub fn merge(&mut self, file: LogicalFile, entries: &[RawEntry]) {
        let badge = file.badge();
        for entry in entries {
            let key = username_key(&entry.username);
            match self.positions.get(&key) {
                Some(&index) => self.records[index].badges.insert(badge),
                None => {
                    let index = self.records.len();
                    self.positions.insert(key, index);
                    self.records.push(AccountRecord::new(index, entry.username.clone(), BadgeSet::from(badge)));
                },
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Fill in the derived badges and count them.
    pub fn finish(self) -> (Vec<AccountRecord>, BadgeStats) {
        let mut records = self.records;
        let mut stats = BadgeStats::default();
        for record in &mut records {
            record.badges = record.badges.with_derived();
            stats.record(record.badges);
        }
        (records, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_extract::models::BadgeKey;

    fn entries(names: &[&str]) -> Vec<RawEntry> {
        names.iter().map(|n| RawEntry { username: n.to_string(), timestamp: None }).collect()
    }

    #[test]
    fn test_three_account_scenario() {
        let mut merger = Merger::default();
        merger.merge(LogicalFile::Following, &entries(&["alice", "bob"]));
        merger.merge(LogicalFile::Followers, &entries(&["alice", "carol"]));
        let (records, stats) = merger.finish();

        let names: Vec<_> = records.iter().map(|r| (r.index, r.username.as_str())).collect();
        assert_eq!(names, vec![(0, "alice"), (1, "bob"), (2, "carol")]);
        assert!(records[0].has(BadgeKey::Mutuals));
        assert!(records[1].has(BadgeKey::NotFollowingBack));
        assert!(records[2].has(BadgeKey::NotFollowedBack));

        assert_eq!(stats[BadgeKey::Following], 2);
        assert_eq!(stats[BadgeKey::Followers], 2);
        assert_eq!(stats[BadgeKey::Mutuals], 1);
        assert_eq!(stats[BadgeKey::NotFollowingBack], 1);
        assert_eq!(stats[BadgeKey::NotFollowedBack], 1);
        assert_eq!(stats[BadgeKey::Close], 0);
    }

    #[test]
    fn test_duplicates_are_merged_case_insensitively() {
        let mut merger = Merger::default();
        merger.merge(LogicalFile::Followers, &entries(&["Dave"]));
        merger.merge(LogicalFile::CloseFriends, &entries(&["dave", "DAVE"]));
        merger.merge(LogicalFile::Followers, &entries(&["dave"]));
        assert_eq!(merger.len(), 1);
        let (records, stats) = merger.finish();
        assert_eq!(records[0].username, "Dave");
        assert!(records[0].has(BadgeKey::Close));
        assert!(records[0].has(BadgeKey::NotFollowedBack));
        assert_eq!(stats[BadgeKey::Followers], 1);
    }
}
