use super::sanitize;
use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Relationship category attached to an account.
///
/// `Mutuals`, `NotFollowingBack` and `NotFollowedBack` are derived from the
/// two required lists; the rest are populated directly from archive members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum BadgeKey {
    Following,
    Followers,
    /// following ∧ followers
    Mutuals,
    /// following ∧ ¬followers
    NotFollowingBack,
    /// followers ∧ ¬following
    NotFollowedBack,
    Pending,
    Permanent,
    Restricted,
    Close,
    Unfollowed,
    Dismissed,
}

impl BadgeKey {
    pub const COUNT: usize = 11;
    pub const ALL: [BadgeKey; Self::COUNT] = [
        BadgeKey::Following,
        BadgeKey::Followers,
        BadgeKey::Mutuals,
        BadgeKey::NotFollowingBack,
        BadgeKey::NotFollowedBack,
        BadgeKey::Pending,
        BadgeKey::Permanent,
        BadgeKey::Restricted,
        BadgeKey::Close,
        BadgeKey::Unfollowed,
        BadgeKey::Dismissed,
    ];

    /// Position of this key in [`ALL`](Self::ALL).
    #[inline]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    #[inline]
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Returns the wire name (camelCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeKey::Following => "following",
            BadgeKey::Followers => "followers",
            BadgeKey::Mutuals => "mutuals",
            BadgeKey::NotFollowingBack => "notFollowingBack",
            BadgeKey::NotFollowedBack => "notFollowedBack",
            BadgeKey::Pending => "pending",
            BadgeKey::Permanent => "permanent",
            BadgeKey::Restricted => "restricted",
            BadgeKey::Close => "close",
            BadgeKey::Unfollowed => "unfollowed",
            BadgeKey::Dismissed => "dismissed",
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, BadgeKey::Mutuals | BadgeKey::NotFollowingBack | BadgeKey::NotFollowedBack)
    }
}

impl FromStr for BadgeKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = sanitize(s);
        Ok(match sanitized.as_str() {
            "following" => Self::Following,
            "followers" => Self::Followers,
            "mutuals" | "mutual" => Self::Mutuals,
            "notfollowingback" => Self::NotFollowingBack,
            "notfollowedback" => Self::NotFollowedBack,
            "pending" => Self::Pending,
            "permanent" => Self::Permanent,
            "restricted" => Self::Restricted,
            "close" | "closefriends" => Self::Close,
            "unfollowed" => Self::Unfollowed,
            "dismissed" => Self::Dismissed,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "badge",
                value: format!("unknown badge: {}", s)
            }),
        })
    }
}

impl Display for BadgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

const ALL_BITS: u16 = (1 << BadgeKey::COUNT) - 1;
const DERIVED_BITS: u16 = BadgeKey::Mutuals.bit() | BadgeKey::NotFollowingBack.bit() | BadgeKey::NotFollowedBack.bit();

/// Compact set of [`BadgeKey`]s (one bit per key).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BadgeSet(u16);

impl BadgeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build from raw bits, silently dropping bits that don't map to a key.
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & ALL_BITS)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn contains(&self, key: BadgeKey) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn insert(&mut self, key: BadgeKey) {
        self.0 |= key.bit();
    }

    pub fn remove(&mut self, key: BadgeKey) {
        self.0 &= !key.bit();
    }

    pub const fn intersects(&self, other: BadgeSet) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(&self, other: BadgeSet) -> BadgeSet {
        Self(self.0 | other.0)
    }

    /// Recompute the derived badges from `following` and `followers`.
    ///
    /// Any derived bits already present are discarded first, so this is safe
    /// to call repeatedly.
    #[must_use]
    pub fn with_derived(self) -> BadgeSet {
        let mut set = Self(self.0 & !DERIVED_BITS);
        match (set.contains(BadgeKey::Following), set.contains(BadgeKey::Followers)) {
            (true, true) => set.insert(BadgeKey::Mutuals),
            (true, false) => set.insert(BadgeKey::NotFollowingBack),
            (false, true) => set.insert(BadgeKey::NotFollowedBack),
            (false, false) => {},
        }
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = BadgeKey> + '_ {
        BadgeKey::ALL.into_iter().filter(|key| self.contains(*key))
    }
}

impl FromIterator<BadgeKey> for BadgeSet {
    fn from_iter<T: IntoIterator<Item = BadgeKey>>(iter: T) -> Self {
        let mut set = BadgeSet::empty();
        set.extend(iter);
        set
    }
}

impl Extend<BadgeKey> for BadgeSet {
    fn extend<T: IntoIterator<Item = BadgeKey>>(&mut self, iter: T) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl From<BadgeKey> for BadgeSet {
    fn from(key: BadgeKey) -> Self {
        Self(key.bit())
    }
}

impl Display for BadgeSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let names: Vec<&str> = self.iter().map(|k| k.as_str()).collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("following", BadgeKey::Following)]
    #[case("notFollowingBack", BadgeKey::NotFollowingBack)]
    #[case("not_followed_back", BadgeKey::NotFollowedBack)]
    #[case("not-following-back", BadgeKey::NotFollowingBack)]
    #[case("Close Friends", BadgeKey::Close)]
    #[case(" MUTUALS ", BadgeKey::Mutuals)]
    fn test_from_str(#[case] input: &str, #[case] expected: BadgeKey) {
        assert_eq!(input.parse::<BadgeKey>().unwrap(), expected);
    }

    #[rstest]
    #[case("blocked")]
    #[case("")]
    fn test_from_str_invalid(#[case] input: &str) {
        assert!(input.parse::<BadgeKey>().is_err());
    }

    #[test]
    fn test_ordinals_match_all() {
        for (i, key) in BadgeKey::ALL.iter().enumerate() {
            assert_eq!(key.ordinal(), i);
            assert_eq!(key.as_str().parse::<BadgeKey>().unwrap(), *key);
        }
    }

    #[rstest]
    #[case(&[BadgeKey::Following, BadgeKey::Followers], BadgeKey::Mutuals)]
    #[case(&[BadgeKey::Following], BadgeKey::NotFollowingBack)]
    #[case(&[BadgeKey::Followers], BadgeKey::NotFollowedBack)]
    fn test_with_derived(#[case] direct: &[BadgeKey], #[case] derived: BadgeKey) {
        let set: BadgeSet = direct.iter().copied().collect();
        let set = set.with_derived();
        assert!(set.contains(derived));
        assert_eq!(set.iter().filter(BadgeKey::is_derived).count(), 1);
        // Idempotent.
        assert_eq!(set.with_derived(), set);
    }

    #[test]
    fn test_with_derived_drops_stale_bits() {
        let mut set = BadgeSet::from(BadgeKey::Following).with_derived();
        set.insert(BadgeKey::Followers);
        let set = set.with_derived();
        assert!(set.contains(BadgeKey::Mutuals));
        assert!(!set.contains(BadgeKey::NotFollowingBack));
    }

    #[test]
    fn test_set_operations() {
        let a: BadgeSet = [BadgeKey::Pending, BadgeKey::Close].into_iter().collect();
        let b = BadgeSet::from(BadgeKey::Close);
        assert!(a.intersects(b));
        assert!(!a.intersects(BadgeSet::from(BadgeKey::Following)));
        assert_eq!(a.len(), 2);
        assert_eq!(a.union(BadgeKey::Following.into()).len(), 3);
        assert_eq!(BadgeSet::from_bits_truncate(u16::MAX).len(), BadgeKey::COUNT);
        assert_eq!(a.to_string(), "pending,close");
    }
}
