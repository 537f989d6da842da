mod account;
mod badge;
mod dataset;
mod discovery;
mod stats;
mod warning;

pub use self::account::AccountRecord;
pub use self::badge::{BadgeKey, BadgeSet};
pub use self::dataset::DatasetMetadata;
pub use self::discovery::{DiscoveredFile, FileDiscovery};
pub use self::stats::BadgeStats;
pub use self::warning::{ParseWarning, Severity, WarningCode};

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('/', "").replace('-', "").replace('_', "").replace(' ', "")
}
