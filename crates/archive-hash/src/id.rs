use std::fmt;

use crate::hex::{hex_decode, hex_to_string};
use crate::{HashError, HashFormat};

/// A blob identifier: a cryptographic digest plus the format it was computed
/// under (spec.md §3, `BlobId`).
///
/// Two blobs with equal raw bytes under the same format are the same blob.
/// The all-zero id is reserved for the empty blob and is never written into
/// an archive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlobId {
    Sha256([u8; 32]),
    Blake2b256([u8; 32]),
}

impl BlobId {
    /// The null id for a given format: the empty blob, always present.
    pub const fn null(format: HashFormat) -> Self {
        match format {
            HashFormat::Sha256 => Self::Sha256([0u8; 32]),
            HashFormat::Blake2b256 => Self::Blake2b256([0u8; 32]),
        }
    }

    /// Build a `BlobId` from raw digest bytes under the given format.
    pub fn from_bytes(format: HashFormat, bytes: &[u8]) -> Result<Self, HashError> {
        let expected = format.digest_len();
        if bytes.len() != expected {
            return Err(HashError::InvalidLength {
                format: format.id().to_string(),
                expected,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(match format {
            HashFormat::Sha256 => Self::Sha256(arr),
            HashFormat::Blake2b256 => Self::Blake2b256(arr),
        })
    }

    /// Parse from a hex string under an explicitly-known format.
    pub fn from_hex(format: HashFormat, hex: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; 32];
        hex_decode(hex, &mut bytes[..format.digest_len()])?;
        Self::from_bytes(format, &bytes[..format.digest_len()])
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha256(b) => b,
            Self::Blake2b256(b) => b,
        }
    }

    pub fn format(&self) -> HashFormat {
        match self {
            Self::Sha256(_) => HashFormat::Sha256,
            Self::Blake2b256(_) => HashFormat::Blake2b256,
        }
    }

    /// True iff this is the all-zero id (the reserved empty blob).
    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex_to_string(self.as_bytes())
    }

    /// First byte of the digest, used to index the fan-out table.
    pub fn first_byte(&self) -> u8 {
        self.as_bytes()[0]
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({}, {})", self.format(), &self.to_hex()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_all_zero() {
        let null = BlobId::null(HashFormat::Sha256);
        assert!(null.is_null());
        assert_eq!(null.as_bytes().len(), 32);
    }

    #[test]
    fn from_bytes_wrong_length() {
        let err = BlobId::from_bytes(HashFormat::Sha256, &[0; 10]).unwrap_err();
        assert!(matches!(err, HashError::InvalidLength { .. }));
    }

    #[test]
    fn hex_roundtrip() {
        let id = BlobId::from_bytes(HashFormat::Sha256, &[0xab; 32]).unwrap();
        let hex = id.to_hex();
        let parsed = BlobId::from_hex(HashFormat::Sha256, &hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_is_lexicographic_on_bytes() {
        let a = BlobId::from_bytes(HashFormat::Sha256, &{
            let mut b = [0u8; 32];
            b[0] = 1;
            b
        })
        .unwrap();
        let b = BlobId::from_bytes(HashFormat::Sha256, &{
            let mut b = [0u8; 32];
            b[0] = 2;
            b
        })
        .unwrap();
        assert!(a < b);
    }

    #[test]
    fn first_byte() {
        let id = BlobId::from_bytes(HashFormat::Blake2b256, &{
            let mut b = [0u8; 32];
            b[0] = 0xde;
            b
        })
        .unwrap();
        assert_eq!(id.first_byte(), 0xde);
    }
}
