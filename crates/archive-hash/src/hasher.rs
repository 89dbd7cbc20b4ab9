use digest::Digest;

use crate::{HashFormat, BlobId};

type Blake2b256 = blake2::Blake2b<digest::consts::U32>;

enum HasherInner {
    Sha256(sha2::Sha256),
    Blake2b256(Blake2b256),
}

/// Streaming hash computation.
///
/// Wraps every registered [`HashFormat`] behind a single interface. Data is
/// fed incrementally with [`update`](Hasher::update), then finalised into a
/// [`BlobId`].
pub struct Hasher {
    inner: HasherInner,
    format: HashFormat,
}

impl Hasher {
    /// Start a new streaming hash for the given format.
    pub fn new(format: HashFormat) -> Self {
        let inner = match format {
            HashFormat::Sha256 => HasherInner::Sha256(sha2::Sha256::new()),
            HashFormat::Blake2b256 => HasherInner::Blake2b256(Blake2b256::new()),
        };
        Self { inner, format }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            HasherInner::Sha256(h) => h.update(data),
            HasherInner::Blake2b256(h) => h.update(data),
        }
    }

    /// Finalize into a [`BlobId`].
    pub fn finalize(self) -> BlobId {
        let bytes: Vec<u8> = match self.inner {
            HasherInner::Sha256(h) => h.finalize().to_vec(),
            HasherInner::Blake2b256(h) => h.finalize().to_vec(),
        };
        BlobId::from_bytes(self.format, &bytes).expect("digest output matches format length")
    }

    /// Convenience: hash a full byte slice in one call.
    pub fn digest(format: HashFormat, data: &[u8]) -> BlobId {
        let mut h = Self::new(format);
        h.update(data);
        h.finalize()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
