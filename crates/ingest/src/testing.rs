//! Archive fixtures shared by the tests in this crate.

use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};

pub(crate) fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A relationship list in export format. An empty `wrapper` produces a
/// top-level array, otherwise an object with the list under that key.
pub(crate) fn relationship_list(wrapper: &str, usernames: &[&str]) -> String {
    let entries: Vec<String> = usernames
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"{{"title": "", "media_list_data": [], "string_list_data": [{{"href": "https://www.instagram.com/{name}", "value": "{name}", "timestamp": {}}}]}}"#,
                1_700_000_000 + i
            )
        })
        .collect();
    let array = format!("[{}]", entries.join(","));
    if wrapper.is_empty() { array } else { format!(r#"{{"relationships_{wrapper}": {array}}}"#) }
}

/// Following: alice, bob. Followers: alice, carol.
pub(crate) fn three_account_export() -> Vec<u8> {
    build_zip(&[
        ("connections/followers_and_following/following.json", &relationship_list("following", &["alice", "bob"])),
        ("connections/followers_and_following/followers_1.json", &relationship_list("", &["alice", "carol"])),
    ])
}
