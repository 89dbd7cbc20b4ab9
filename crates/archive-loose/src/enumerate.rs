use std::fs;
use std::path::PathBuf;

use archive_hash::BlobId;

use crate::{LooseError, LooseStore};

/// Iterator over loose blob ids, walking the fan-out directories in sorted
/// order. Non-hex filenames (stray temp files) are skipped.
pub struct LooseObjectIter {
    dirs: Vec<PathBuf>,
    dir_index: usize,
    current_entries: Vec<fs::DirEntry>,
    entry_index: usize,
    current_prefix: String,
    hash_format: archive_hash::HashFormat,
}

impl LooseObjectIter {
    fn new(dir: &std::path::Path, hash_format: archive_hash::HashFormat) -> Result<Self, LooseError> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if dir.is_dir() {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let name = entry.file_name();
                let name_str = name.to_string_lossy();
                if name_str.len() == 2
                    && name_str.chars().all(|c| c.is_ascii_hexdigit())
                    && entry.file_type()?.is_dir()
                {
                    dirs.push(entry.path());
                }
            }
        }
        dirs.sort();

        Ok(Self {
            dirs,
            dir_index: 0,
            current_entries: Vec::new(),
            entry_index: 0,
            current_prefix: String::new(),
            hash_format,
        })
    }

    fn advance_dir(&mut self) -> Result<bool, LooseError> {
        while self.dir_index < self.dirs.len() {
            let dir_path = &self.dirs[self.dir_index];
            self.dir_index += 1;
            self.current_prefix = dir_path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_lowercase();

            let mut entries: Vec<fs::DirEntry> = Vec::new();
            for entry in fs::read_dir(dir_path)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    entries.push(entry);
                }
            }
            entries.sort_by_key(|e| e.file_name());

            if !entries.is_empty() {
                self.current_entries = entries;
                self.entry_index = 0;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for LooseObjectIter {
    type Item = Result<BlobId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.entry_index < self.current_entries.len() {
                let entry = &self.current_entries[self.entry_index];
                self.entry_index += 1;

                let filename = entry.file_name();
                let filename_str = filename.to_string_lossy();

                if !filename_str.chars().all(|c| c.is_ascii_hexdigit()) {
                    continue;
                }

                let hex = format!("{}{}", self.current_prefix, filename_str);
                match BlobId::from_hex(self.hash_format, &hex) {
                    Ok(id) => return Some(Ok(id)),
                    Err(_) => continue,
                }
            }

            match self.advance_dir() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl LooseStore {
    /// Iterate over all loose blob ids (component 6/7's `AllBlobs`).
    pub fn iter(&self) -> Result<LooseObjectIter, LooseError> {
        LooseObjectIter::new(&self.dir, self.hash_format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_hash::HashFormat;

    #[test]
    fn iterates_written_blobs_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashFormat::Sha256);
        let mut ids = vec![
            store.write(b"one").unwrap(),
            store.write(b"two").unwrap(),
            store.write(b"three").unwrap(),
        ];
        ids.sort();

        let mut found: Vec<BlobId> = store.iter().unwrap().collect::<Result<_, _>>().unwrap();
        found.sort();

        assert_eq!(found, ids);
    }

    #[test]
    fn empty_store_iterates_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashFormat::Sha256);
        assert_eq!(store.iter().unwrap().count(), 0);
    }
}
