use std::fmt::{Display, Formatter, Result as FmtResult};

const ZIP_LOCAL_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
// An archive with zero members consists of only the end-of-central-directory
// record, which has its own signature.
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
const ZIP_SPANNED_MAGIC: [u8; 4] = [0x50, 0x4B, 0x07, 0x08];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const RAR_MAGIC: [u8; 4] = [0x52, 0x61, 0x72, 0x21];
const SEVEN_ZIP_MAGIC: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Container format detected from leading bytes.
///
/// Only [`Zip`](Self::Zip) is accepted for ingestion. The other variants exist
/// so that a rejection can tell the user *what* they uploaded instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Signature {
    Zip,
    Gzip,
    Bzip2,
    Rar,
    SevenZip,
    /// Looks like a bare JSON document (leading `{` or `[`).
    Json,
    #[default]
    Unknown,
}

impl Signature {
    /// Detect the container format from magic bytes.
    ///
    /// Returns [`Unknown`](Self::Unknown) if no magic bytes match or if the
    /// input is too short to detect any format.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&ZIP_LOCAL_MAGIC) || bytes.starts_with(&ZIP_EMPTY_MAGIC) || bytes.starts_with(&ZIP_SPANNED_MAGIC)
        {
            return Signature::Zip;
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Signature::Gzip;
        }
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Signature::Bzip2;
        }
        if bytes.starts_with(&RAR_MAGIC) {
            return Signature::Rar;
        }
        if bytes.starts_with(&SEVEN_ZIP_MAGIC) {
            return Signature::SevenZip;
        }
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{' | b'[') => Signature::Json,
            _ => Signature::Unknown,
        }
    }

    /// Returns the short name (for displaying to the user).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Signature::Zip => "zip",
            Signature::Gzip => "gzip",
            Signature::Bzip2 => "bzip2",
            Signature::Rar => "rar",
            Signature::SevenZip => "7z",
            Signature::Json => "json",
            Signature::Unknown => "unknown",
        }
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl From<&[u8]> for Signature {
    fn from(value: &[u8]) -> Self {
        Signature::detect(value)
    }
}

/// Returns `true` if the leading bytes carry a ZIP signature.
///
/// A mismatch is terminal for ingestion and user-fixable.
#[must_use]
pub fn validate(bytes: &[u8]) -> bool {
    Signature::detect(bytes) == Signature::Zip
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x50, 0x4B, 0x03, 0x04, 0x14, 0x00], Signature::Zip)]
    #[case(&[0x50, 0x4B, 0x05, 0x06], Signature::Zip)]
    #[case(&[0x1F, 0x8B, 0x08, 0x00], Signature::Gzip)]
    #[case(&[0x42, 0x5A, 0x68, 0x39], Signature::Bzip2)]
    #[case(b"Rar!\x1a\x07", Signature::Rar)]
    #[case(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00], Signature::SevenZip)]
    #[case(b"  {\"relationships_following\": []}", Signature::Json)]
    #[case(b"<!DOCTYPE html>", Signature::Unknown)]
    #[case(b"PK", Signature::Unknown)]
    #[case(b"", Signature::Unknown)]
    fn test_detect(#[case] bytes: &[u8], #[case] expected: Signature) {
        assert_eq!(Signature::detect(bytes), expected);
        assert_eq!(<&[u8] as Into<Signature>>::into(bytes), expected);
    }

    #[test]
    fn test_validate_only_accepts_zip() {
        assert!(validate(&[0x50, 0x4B, 0x03, 0x04]));
        assert!(!validate(&[0x1F, 0x8B]));
        assert!(!validate(b"[]"));
    }
}
