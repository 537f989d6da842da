//! Data model and JSON member parsing for relationship exports.
//!
//! An export archive contains several JSON "relationship lists" (who the user
//! follows, who follows them, pending requests, and so on). This crate knows:
//!
//! - which logical files to look for and how to recognise their members
//!   regardless of the base directory they were exported under
//!   ([`LogicalFile`]),
//! - how to turn a member's bytes into a flat list of `(username, timestamp)`
//!   entries ([`parse_member`]), and
//! - the unified per-account model everything downstream shares
//!   ([`models`]).
//!
//! Nothing in here touches storage or the archive container itself.

mod catalogue;
mod consts;
pub mod error;
pub mod models;
mod parse;

pub use crate::catalogue::LogicalFile;
pub use crate::parse::{ParsedMember, RawEntry, parse_member, username_key};
pub use rollcall_archive::DatasetIdentity;
