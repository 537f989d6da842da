use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use tracing::instrument;

const DIGEST_HEX_LEN: usize = 64;

/// Stable, content-derived identifier of an archive (and the dataset built
/// from it).
///
/// Hex-encoded BLAKE3 digest of the full archive bytes. Byte-identical
/// archives always yield the same identity, and the digest is one-way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetIdentity(String);

impl DatasetIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First few characters, for log lines and listings.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl Display for DatasetIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DatasetIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for DatasetIdentity {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s.len() != DIGEST_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            exn::bail!(ErrorKind::InvalidIdentity(s));
        }
        Ok(Self(s))
    }
}

impl From<blake3::Hash> for DatasetIdentity {
    fn from(hash: blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }
}

/// Compute the identity of an archive from its full byte content.
#[instrument(skip(archive), fields(archive_size = archive.len()))]
pub fn identify(archive: &[u8]) -> DatasetIdentity {
    blake3::hash(archive).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_identity_is_deterministic() {
        let a = identify(b"PK\x03\x04 some archive bytes");
        let b = identify(b"PK\x03\x04 some archive bytes");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_identity_differs_for_different_content() {
        assert_ne!(identify(b"PK\x03\x04 one"), identify(b"PK\x03\x04 two"));
    }

    #[test]
    fn test_identity_round_trips_through_str() {
        let identity = identify(b"round trip");
        let parsed: DatasetIdentity = identity.to_string().to_uppercase().parse().unwrap();
        assert_eq!(parsed, identity);
        assert_eq!(parsed.short().len(), 12);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("zz0ed948ccd76c2230efe90175a519a3092b1862ab049704b7221738e56028ca")]
    fn test_invalid_identity(#[case] input: &str) {
        assert!(input.parse::<DatasetIdentity>().is_err());
    }
}
