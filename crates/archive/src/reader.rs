use crate::error::{ErrorKind, Result};
use crate::signature::validate;
use exn::ResultExt;
use std::io::{Cursor, Read};
use tracing::instrument;
use zip::ZipArchive;
use zip::result::ZipError;

/// Read-only view over the members of a ZIP export held in memory.
///
/// Borrows the archive bytes; nothing is copied until a member is read.
pub struct Archive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Archive<'a> {
    /// Open an archive from its raw bytes.
    ///
    /// Returns [`NotZip`](ErrorKind::NotZip) when the signature check fails
    /// and [`Corrupted`](ErrorKind::Corrupted) when the central directory
    /// can't be read.
    #[instrument(skip(bytes), fields(archive_size = bytes.len()))]
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        if !validate(bytes) {
            exn::bail!(ErrorKind::NotZip);
        }
        let zip = ZipArchive::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Corrupted)?;
        Ok(Self { zip })
    }

    /// Number of entries in the central directory (including directories).
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Names of all file members, in central directory order.
    ///
    /// Directory entries are skipped, as are entries whose headers can't be
    /// read (those surface later as [`Corrupted`](ErrorKind::Corrupted) if
    /// anything tries to read them by name).
    pub fn member_names(&mut self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.zip.len());
        for i in 0..self.zip.len() {
            match self.zip.by_index_raw(i) {
                Ok(file) if !file.is_dir() => names.push(file.name().to_string()),
                Ok(_) => {},
                Err(error) => tracing::debug!(index = i, %error, "Skipping unreadable archive entry"),
            }
        }
        names
    }

    /// Decompress a member into memory.
    #[instrument(skip(self))]
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = match self.zip.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::MemberNotFound(name.to_string())),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Corrupted),
        };
        // Uncompressed size is only a hint (it comes from the archive header),
        // so cap the pre-allocation.
        let hint = usize::try_from(file.size()).unwrap_or(0).min(64 * 1024 * 1024);
        let mut buf = Vec::with_capacity(hint);
        file.read_to_end(&mut buf).or_raise(|| ErrorKind::Corrupted)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_open_and_read_members() {
        let bytes = build_zip(&[
            ("connections/followers_and_following/following.json", b"[]"),
            ("connections/followers_and_following/followers_1.json", b"[{}]"),
        ]);
        let mut archive = Archive::open(&bytes).unwrap();
        assert_eq!(archive.len(), 2);
        let names = archive.member_names();
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.ends_with("followers_1.json")));
        let data = archive.read("connections/followers_and_following/followers_1.json").unwrap();
        assert_eq!(data, b"[{}]");
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let err = Archive::open(b"{\"not\": \"a zip\"}").err().unwrap();
        assert_eq!(*err, ErrorKind::NotZip);
    }

    #[test]
    fn test_open_rejects_truncated_zip() {
        let mut bytes = build_zip(&[("following.json", b"[]")]);
        bytes.truncate(bytes.len() / 2);
        let err = Archive::open(&bytes).err().unwrap();
        assert_eq!(*err, ErrorKind::Corrupted);
    }

    #[test]
    fn test_read_missing_member() {
        let bytes = build_zip(&[("following.json", b"[]")]);
        let mut archive = Archive::open(&bytes).unwrap();
        let err = archive.read("followers.json").unwrap_err();
        assert_eq!(*err, ErrorKind::MemberNotFound("followers.json".to_string()));
    }
}
