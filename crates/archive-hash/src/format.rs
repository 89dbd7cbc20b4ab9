use crate::HashError;

/// The closed set of hash formats an archive may declare.
///
/// Readers MUST reject a file whose embedded `hash_format_id` differs from
/// the format the caller declared it to hold (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashFormat {
    Sha256,
    Blake2b256,
}

impl HashFormat {
    /// Fixed output size in bytes, for every format currently registered.
    pub const fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Blake2b256 => 32,
        }
    }

    /// The string id written into data/index/cache headers.
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake2b256 => "blake2b-256",
        }
    }

    /// Look up a format by its string id (registry miss ⇒ `UnsupportedFormat`).
    pub fn from_id(id: &str) -> Result<Self, HashError> {
        match id {
            "sha256" => Ok(Self::Sha256),
            "blake2b-256" => Ok(Self::Blake2b256),
            other => Err(HashError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for HashFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
