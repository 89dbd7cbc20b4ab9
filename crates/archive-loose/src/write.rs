use std::fs;
use std::io::Write;

use archive_hash::Hasher;
use archive_utils::AtomicFile;

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Write a blob's raw bytes. Returns its id. No-op if the blob already
    /// exists (content-addressed idempotency); the write is atomic (temp
    /// file in the fan-out directory + rename).
    pub fn write(&self, content: &[u8]) -> Result<archive_hash::BlobId, LooseError> {
        if content.is_empty() {
            return Ok(archive_hash::BlobId::null(self.hash_format));
        }

        let id = Hasher::digest(self.hash_format, content);

        if self.contains(&id) {
            return Ok(id);
        }

        let final_path = self.blob_path(&id);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = AtomicFile::new_for(&final_path)?;
        tmp.write_all(content)?;
        tmp.persist(&final_path)?;

        Ok(id)
    }
}
