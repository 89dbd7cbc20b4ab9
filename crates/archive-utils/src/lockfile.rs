use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::{Result, UtilError};

/// An exclusive, directory-scoped advisory lock: `Pack()` holds one for its
/// duration so concurrent callers on the same store directory are rejected
/// up front rather than racing the data/index/cache writers (spec.md §5,
/// "Concurrent callers of Pack on the same store instance... are
/// disallowed").
///
/// Unlike `AtomicFile`, this lock guards no content of its own; it exists
/// only to be present or absent. Acquiring removes it on `Drop`.
pub struct PackLock {
    path: PathBuf,
}

const LOCK_NAME: &str = ".pack.lock";

impl PackLock {
    /// Acquire the lock for `dir`, failing if another holder already has it.
    pub fn acquire(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_NAME);

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    UtilError::AlreadyLocked { dir: dir.to_path_buf() }
                } else {
                    UtilError::Io(e)
                }
            })?;

        Ok(Self { path })
    }
}

impl Drop for PackLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
