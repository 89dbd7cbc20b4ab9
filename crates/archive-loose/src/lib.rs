//! A one-file-per-blob loose store: `<dir>/<xx>/<rest>` where `xx` is the
//! first hex byte of the blob's id. This is the concrete stand-in for the
//! "loose blob store" external collaborator described informally as a
//! contract (`HasBlob`/`MakeBlobReader`/`MakeBlobWriter`/`AllBlobs`, optional
//! `DeleteBlob`); the packer and `ArchiveStore` consume it through that
//! contract, never through these concrete methods directly... except that
//! here there is only one implementation, so the contract and the
//! implementation are the same type.

mod enumerate;
mod read;
mod write;

pub use enumerate::LooseObjectIter;

use std::path::{Path, PathBuf};

use archive_hash::{BlobId, HashFormat};

pub struct LooseStore {
    dir: PathBuf,
    hash_format: HashFormat,
}

impl LooseStore {
    pub fn open(dir: impl AsRef<Path>, hash_format: HashFormat) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            hash_format,
        }
    }

    pub fn hash_format(&self) -> HashFormat {
        self.hash_format
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fan-out path for a blob id: `<dir>/<first-byte-hex>/<rest-hex>`.
    pub fn blob_path(&self, id: &BlobId) -> PathBuf {
        let hex = id.to_hex();
        self.dir.join(&hex[..2]).join(&hex[2..])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("corrupt loose blob {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] archive_hash::HashError),

    #[error(transparent)]
    Util(#[from] archive_utils::UtilError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_path_uses_fan_out() {
        let store = LooseStore::open("/tmp/blobs", HashFormat::Sha256);
        let id = BlobId::from_bytes(HashFormat::Sha256, &[0xab; 32]).unwrap();
        let path = store.blob_path(&id);
        let hex = id.to_hex();
        assert_eq!(
            path,
            PathBuf::from("/tmp/blobs").join(&hex[..2]).join(&hex[2..])
        );
    }
}
