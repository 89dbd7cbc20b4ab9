use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::{Result, UtilError};

/// A temporary file that is persisted to its final location by an atomic
/// rename, or deleted on drop if never persisted.
///
/// The temp file is created in the same directory as the eventual target so
/// that `persist` is a same-filesystem rename: either the old reader sees
/// the previous file in full, or the new one, never a partial write. This is
/// the mechanism the cache file (spec.md §4.7, §5) and the archive rename on
/// pack completion both rely on.
pub struct AtomicFile {
    inner: Option<::tempfile::NamedTempFile>,
}

impl AtomicFile {
    /// Create a new atomic file alongside `target`'s directory.
    pub fn new_for(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();
        let dir = target.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let named = ::tempfile::NamedTempFile::new_in(dir)
            .map_err(|source| UtilError::TempCreate { dir: dir.to_path_buf(), source })?;
        Ok(Self { inner: Some(named) })
    }

    /// Rename the temp file onto `target`, replacing it if present.
    pub fn persist(mut self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        if let Some(named) = self.inner.take() {
            named
                .persist(target)
                .map_err(|e| UtilError::Persist { path: target.to_path_buf(), source: e.error })?;
        }
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other("atomic file already persisted"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other("atomic file already persisted"))?
            .flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_replaces_target() {
        let dir = ::tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        fs::write(&target, b"old").unwrap();

        let mut f = AtomicFile::new_for(&target).unwrap();
        f.write_all(b"new content").unwrap();
        f.persist(&target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new content");
    }

    #[test]
    fn drop_without_persist_leaves_no_trace() {
        let dir = ::tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        {
            let mut f = AtomicFile::new_for(&target).unwrap();
            f.write_all(b"scratch").unwrap();
        }
        assert!(!target.exists());
        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(remaining.is_empty());
    }
}
