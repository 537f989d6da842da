use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Member file names, matched against the final path component (lowercased).
// Follower lists are split across numbered parts in larger exports.
regex!(FOLLOWING_FILE, r"^following\.json$");
regex!(FOLLOWERS_FILE, r"^followers(?:_(\d+))?\.json$");
regex!(PENDING_FILE, r"^pending_follow_requests\.json$");
regex!(PERMANENT_FILE, r"^(?:recent|permanent)_follow_requests\.json$");
regex!(RESTRICTED_FILE, r"^restricted_profiles\.json$");
regex!(CLOSE_FILE, r"^close_friends\.json$");
regex!(UNFOLLOWED_FILE, r"^recently_unfollowed_(?:profiles|accounts)\.json$");
regex!(DISMISSED_FILE, r"^(?:removed|dismissed)_suggestions\.json$");
// Exports requested in HTML format carry the same lists as `.html` pages.
regex!(HTML_RELATIONSHIP_FILE, r"^(?:following|followers(?:_\d+)?)\.html?$");
