use std::fs;

use archive_hash::{BlobId, Hasher};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// True iff `id` is the null id (always present) or a file exists for it.
    pub fn contains(&self, id: &BlobId) -> bool {
        id.is_null() || self.blob_path(id).is_file()
    }

    /// Read a blob's raw bytes. `Ok(None)` if absent; null id yields `Ok(Some(vec![]))`.
    pub fn read(&self, id: &BlobId) -> Result<Option<Vec<u8>>, LooseError> {
        if id.is_null() {
            return Ok(Some(Vec::new()));
        }
        let path = self.blob_path(id);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LooseError::Io(e)),
        }
    }

    /// Read a blob and verify its content hashes back to `id`.
    pub fn read_verified(&self, id: &BlobId) -> Result<Option<Vec<u8>>, LooseError> {
        let Some(data) = self.read(id)? else {
            return Ok(None);
        };
        if id.is_null() {
            return Ok(Some(data));
        }
        let actual = Hasher::digest(self.hash_format, &data);
        if actual != *id {
            return Err(LooseError::HashMismatch {
                path: self.blob_path(id),
                expected: id.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(Some(data))
    }

    /// Delete a blob from the loose store (the packer's `DeleteLoose` phase).
    pub fn delete(&self, id: &BlobId) -> Result<(), LooseError> {
        if id.is_null() {
            return Ok(());
        }
        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LooseError::Io(e)),
        }
    }
}
