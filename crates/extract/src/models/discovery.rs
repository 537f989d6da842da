use crate::catalogue::{LogicalFile, parent_dir};

/// Discovery result for one expected logical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub file: LogicalFile,
    pub found: bool,
    /// Raw entry count, once the members have been parsed.
    pub item_count: Option<usize>,
    /// Matching archive members, in part order.
    pub members: Vec<String>,
}

impl DiscoveredFile {
    pub fn name(&self) -> &'static str {
        self.file.name()
    }

    pub fn required(&self) -> bool {
        self.file.required()
    }

    pub fn description(&self) -> &'static str {
        self.file.description()
    }
}

/// Diagnostic report of which expected files an archive contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiscovery {
    /// Directory the relationship lists were found under (`""` for the
    /// archive root, `None` if nothing was found at all).
    pub base_path: Option<String>,
    /// One entry per [`LogicalFile`], in [`LogicalFile::ALL`] order.
    pub files: Vec<DiscoveredFile>,
    /// HTML renditions of the required lists, if any.
    pub html_members: Vec<String>,
}

impl FileDiscovery {
    /// Match archive member names against the expected logical files.
    ///
    /// Members are recognised by file name alone, so exports nested under any
    /// base directory are tolerated.
    pub fn discover<S: AsRef<str>>(member_names: &[S]) -> Self {
        let mut matched: Vec<Vec<(u32, &str)>> = vec![Vec::new(); LogicalFile::ALL.len()];
        let mut html_members = Vec::new();
        for name in member_names {
            let name = name.as_ref();
            if let Some((file, part)) = LogicalFile::classify(name) {
                matched[file as usize].push((part, name));
            } else if LogicalFile::is_html_counterpart(name) {
                html_members.push(name.to_string());
            }
        }
        let files: Vec<DiscoveredFile> = LogicalFile::ALL
            .into_iter()
            .zip(matched)
            .map(|(file, mut members)| {
                members.sort();
                DiscoveredFile {
                    file,
                    found: !members.is_empty(),
                    item_count: None,
                    members: members.into_iter().map(|(_, name)| name.to_string()).collect(),
                }
            })
            .collect();
        let base_path =
            files.iter().find_map(|f| f.members.first()).map(|member| parent_dir(member).to_string());
        Self { base_path, files, html_members }
    }

    pub fn get(&self, file: LogicalFile) -> &DiscoveredFile {
        // Infallible: `files` holds exactly one entry per variant, in order.
        &self.files[file as usize]
    }

    pub fn get_mut(&mut self, file: LogicalFile) -> &mut DiscoveredFile {
        &mut self.files[file as usize]
    }

    pub fn missing_required(&self) -> impl Iterator<Item = &DiscoveredFile> {
        self.files.iter().filter(|f| f.required() && !f.found)
    }

    /// No JSON relationship lists at all, but their HTML counterparts exist.
    pub fn is_html_export(&self) -> bool {
        !self.html_members.is_empty() && self.files.iter().filter(|f| f.required()).all(|f| !f.found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_nested_export() {
        let names = [
            "media/posts_1.json",
            "connections/followers_and_following/followers_2.json",
            "connections/followers_and_following/following.json",
            "connections/followers_and_following/followers_1.json",
            "connections/followers_and_following/close_friends.json",
        ];
        let discovery = FileDiscovery::discover(&names);
        assert_eq!(discovery.base_path.as_deref(), Some("connections/followers_and_following"));
        assert!(discovery.get(LogicalFile::Following).found);
        let followers = discovery.get(LogicalFile::Followers);
        assert_eq!(
            followers.members,
            vec![
                "connections/followers_and_following/followers_1.json".to_string(),
                "connections/followers_and_following/followers_2.json".to_string(),
            ]
        );
        assert!(discovery.get(LogicalFile::CloseFriends).found);
        assert!(!discovery.get(LogicalFile::Pending).found);
        assert_eq!(discovery.missing_required().count(), 0);
        assert!(!discovery.is_html_export());
    }

    #[test]
    fn test_discover_missing_required() {
        let discovery = FileDiscovery::discover(&["following.json"]);
        assert_eq!(discovery.base_path.as_deref(), Some(""));
        let missing: Vec<_> = discovery.missing_required().map(|f| f.file).collect();
        assert_eq!(missing, vec![LogicalFile::Followers]);
    }

    #[test]
    fn test_discover_html_export() {
        let discovery = FileDiscovery::discover(&["x/following.html", "x/followers_1.html"]);
        assert!(discovery.is_html_export());
        assert_eq!(discovery.base_path, None);
        assert_eq!(discovery.files.len(), LogicalFile::ALL.len());
    }
}
