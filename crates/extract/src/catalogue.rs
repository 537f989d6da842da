use crate::consts;
use crate::models::BadgeKey;
use regex::Regex;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A relationship list the export is expected to contain.
///
/// Each logical file maps to one or more archive members (followers may be
/// split into numbered parts) and populates exactly one badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalFile {
    Following,
    Followers,
    Pending,
    Permanent,
    Restricted,
    CloseFriends,
    Unfollowed,
    Dismissed,
}

impl LogicalFile {
    /// Every logical file, required ones first.
    pub const ALL: [LogicalFile; 8] = [
        LogicalFile::Following,
        LogicalFile::Followers,
        LogicalFile::Pending,
        LogicalFile::Permanent,
        LogicalFile::Restricted,
        LogicalFile::CloseFriends,
        LogicalFile::Unfollowed,
        LogicalFile::Dismissed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalFile::Following => "following",
            LogicalFile::Followers => "followers",
            LogicalFile::Pending => "pending",
            LogicalFile::Permanent => "permanent requests",
            LogicalFile::Restricted => "restricted",
            LogicalFile::CloseFriends => "close friends",
            LogicalFile::Unfollowed => "recently unfollowed",
            LogicalFile::Dismissed => "dismissed suggestions",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LogicalFile::Following => "Accounts you follow",
            LogicalFile::Followers => "Accounts that follow you",
            LogicalFile::Pending => "Follow requests you sent that are still pending",
            LogicalFile::Permanent => "Follow requests you sent recently",
            LogicalFile::Restricted => "Accounts you have restricted",
            LogicalFile::CloseFriends => "Accounts on your close friends list",
            LogicalFile::Unfollowed => "Accounts you recently unfollowed",
            LogicalFile::Dismissed => "Suggested accounts you dismissed",
        }
    }

    /// Without both required lists there is nothing meaningful to compare.
    pub fn required(&self) -> bool {
        matches!(self, LogicalFile::Following | LogicalFile::Followers)
    }

    /// The badge populated directly from this file's entries.
    pub fn badge(&self) -> BadgeKey {
        match self {
            LogicalFile::Following => BadgeKey::Following,
            LogicalFile::Followers => BadgeKey::Followers,
            LogicalFile::Pending => BadgeKey::Pending,
            LogicalFile::Permanent => BadgeKey::Permanent,
            LogicalFile::Restricted => BadgeKey::Restricted,
            LogicalFile::CloseFriends => BadgeKey::Close,
            LogicalFile::Unfollowed => BadgeKey::Unfollowed,
            LogicalFile::Dismissed => BadgeKey::Dismissed,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            LogicalFile::Following => &consts::FOLLOWING_FILE,
            LogicalFile::Followers => &consts::FOLLOWERS_FILE,
            LogicalFile::Pending => &consts::PENDING_FILE,
            LogicalFile::Permanent => &consts::PERMANENT_FILE,
            LogicalFile::Restricted => &consts::RESTRICTED_FILE,
            LogicalFile::CloseFriends => &consts::CLOSE_FILE,
            LogicalFile::Unfollowed => &consts::UNFOLLOWED_FILE,
            LogicalFile::Dismissed => &consts::DISMISSED_FILE,
        }
    }

    /// Classify an archive member path.
    ///
    /// Only the final path component is inspected, so members are recognised
    /// under any base directory. Returns the logical file together with a part
    /// number used to order multi-part lists (`followers_2.json` after
    /// `followers_1.json`; an unnumbered member sorts first).
    pub fn classify(path: &str) -> Option<(LogicalFile, u32)> {
        let file_name = file_name(path).to_lowercase();
        LogicalFile::ALL.into_iter().find_map(|logical| {
            let captures = logical.pattern().captures(&file_name)?;
            let part = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(0);
            Some((logical, part))
        })
    }

    /// Returns `true` for the HTML rendition of a required list, which is what
    /// users get when they request their export in the wrong format.
    pub fn is_html_counterpart(path: &str) -> bool {
        consts::HTML_RELATIONSHIP_FILE.is_match(&file_name(path).to_lowercase())
    }
}

impl Display for LogicalFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Directory portion of a member path (without trailing slash).
pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[..pos],
        None => "",
    }
}
