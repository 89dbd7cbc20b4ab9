//! Data file codec (spec §4.3): the streamed sequence of full/delta entries
//! that makes up one archive's payload.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use archive_hash::{BlobId, HashFormat, Hasher};
use archive_utils::AtomicFile;

use crate::bytes::{push_u16, push_u64, read_slice, read_u16, read_u64};
use crate::codec::CompressionKind;
use crate::entry::{EntryType, Generation};
use crate::{PackError, DATA_MAGIC, FLAG_HAS_DELTAS};

/// One decoded entry, owning its (decompressed) payload.
pub enum DataEntry {
    Full {
        hash: BlobId,
        payload: Vec<u8>,
    },
    Delta {
        hash: BlobId,
        base_hash: BlobId,
        delta_algorithm: u8,
        uncompressed_size: u64,
        delta_payload: Vec<u8>,
    },
}

impl DataEntry {
    pub fn hash(&self) -> BlobId {
        match self {
            DataEntry::Full { hash, .. } => *hash,
            DataEntry::Delta { hash, .. } => *hash,
        }
    }
}

pub struct FinishedData {
    pub checksum: BlobId,
    pub entry_count: u64,
    pub path: PathBuf,
}

/// What the writer returns for one emitted entry: its offset and the size
/// its compressed payload took up on disk (the index records both).
#[derive(Debug, Clone, Copy)]
pub struct WrittenEntry {
    pub offset: u64,
    pub compressed_size: u64,
}

/// Streams entries to a temp file and finalizes into
/// `<hex(checksum)><ext>` on [`finish`](DataWriter::finish).
pub struct DataWriter {
    file: AtomicFile,
    hasher: Hasher,
    generation: Generation,
    hash_format: HashFormat,
    default_codec: CompressionKind,
    position: u64,
    entry_count: u64,
    dir: PathBuf,
}

impl DataWriter {
    pub fn create(
        dir: impl AsRef<Path>,
        generation: Generation,
        hash_format: HashFormat,
        default_codec: CompressionKind,
        has_deltas: bool,
    ) -> Result<Self, PackError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let placeholder = dir.join(".data.tmp");
        let mut file = AtomicFile::new_for(&placeholder)?;
        let mut hasher = Hasher::new(hash_format);

        let fmt_id = hash_format.id().as_bytes();
        let mut header = Vec::new();
        header.extend_from_slice(DATA_MAGIC);
        push_u16(&mut header, generation.version());
        header.push(fmt_id.len() as u8);
        header.extend_from_slice(fmt_id);
        header.push(default_codec.to_byte());
        let flags: u16 = if has_deltas { FLAG_HAS_DELTAS } else { 0 };
        push_u16(&mut header, flags);

        file.write_all(&header)?;
        hasher.update(&header);
        let position = header.len() as u64;

        Ok(Self {
            file,
            hasher,
            generation,
            hash_format,
            default_codec,
            position,
            entry_count: 0,
            dir,
        })
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<(), PackError> {
        self.file.write_all(buf)?;
        self.hasher.update(buf);
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Append a full entry. Returns the offset of the entry's first byte
    /// and the size its compressed payload took up on disk.
    pub fn add_full(
        &mut self,
        id: &BlobId,
        codec: CompressionKind,
        payload: &[u8],
    ) -> Result<WrittenEntry, PackError> {
        let offset = self.position;
        let codec = match self.generation {
            Generation::V0 => self.default_codec,
            Generation::V1 => codec,
        };
        let compressed = codec.compress(payload)?;

        let mut buf = Vec::new();
        buf.extend_from_slice(id.as_bytes());
        if self.generation == Generation::V1 {
            buf.push(EntryType::Full.to_byte());
            buf.push(codec.to_byte());
        }
        push_u64(&mut buf, payload.len() as u64);
        push_u64(&mut buf, compressed.len() as u64);
        buf.extend_from_slice(&compressed);

        self.write_raw(&buf)?;
        self.entry_count += 1;
        Ok(WrittenEntry { offset, compressed_size: compressed.len() as u64 })
    }

    /// Append a v1 delta entry. `base_hash` is resolved to an offset later,
    /// by the index writer, from the emitted-entries map (spec §9 "Delta
    /// base resolution").
    pub fn add_delta(
        &mut self,
        id: &BlobId,
        codec: CompressionKind,
        base_hash: &BlobId,
        delta_algorithm: u8,
        uncompressed_size: u64,
        delta_payload: &[u8],
    ) -> Result<WrittenEntry, PackError> {
        assert_eq!(self.generation, Generation::V1, "delta entries require v1");
        let offset = self.position;
        let compressed = codec.compress(delta_payload)?;

        let mut buf = Vec::new();
        buf.extend_from_slice(id.as_bytes());
        buf.push(EntryType::Delta.to_byte());
        buf.push(codec.to_byte());
        buf.push(delta_algorithm);
        buf.extend_from_slice(base_hash.as_bytes());
        push_u64(&mut buf, uncompressed_size);
        push_u64(&mut buf, compressed.len() as u64);
        buf.extend_from_slice(&compressed);

        self.write_raw(&buf)?;
        self.entry_count += 1;
        Ok(WrittenEntry { offset, compressed_size: compressed.len() as u64 })
    }

    /// Finalize the checksum and rename the temp file to `<hex(checksum)><ext>`.
    pub fn finish(mut self) -> Result<FinishedData, PackError> {
        let entry_count = self.entry_count;
        self.write_raw(&entry_count.to_be_bytes())?;

        let checksum = self.hasher.finalize();
        self.file.write_all(checksum.as_bytes())?;

        let final_path = self
            .dir
            .join(format!("{}{}", checksum.to_hex(), self.generation.data_ext()));
        self.file.persist(&final_path)?;

        Ok(FinishedData {
            checksum,
            entry_count,
            path: final_path,
        })
    }
}

/// Random-access reader over a finished data file (mmap'd).
pub struct DataReader {
    mmap: memmap2::Mmap,
    generation: Generation,
    hash_format: HashFormat,
    default_codec: CompressionKind,
    #[allow(dead_code)]
    flags: u16,
    checksum_offset: usize,
    entry_count: u64,
}

impl DataReader {
    pub fn open(path: impl AsRef<Path>, hash_format: HashFormat) -> Result<Self, PackError> {
        let file = fs::File::open(path.as_ref())?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };

        if mmap.len() < 4 + 2 + 1 {
            return Err(PackError::FormatError("data file truncated before header".into()));
        }
        if &mmap[0..4] != DATA_MAGIC {
            return Err(PackError::FormatError("bad data file magic".into()));
        }
        let mut pos = 4;
        let version = read_u16(&mmap, &mut pos)?;
        let generation = Generation::from_version(version)
            .ok_or_else(|| PackError::FormatError(format!("unsupported data version {version}")))?;

        let fmt_id_len = mmap[pos] as usize;
        pos += 1;
        if mmap.len() < pos + fmt_id_len + 1 + 2 {
            return Err(PackError::FormatError("data file truncated before codec/flags".into()));
        }
        let fmt_id = std::str::from_utf8(&mmap[pos..pos + fmt_id_len])
            .map_err(|_| PackError::FormatError("non-utf8 hash format id".into()))?;
        let file_format = HashFormat::from_id(fmt_id)?;
        if file_format != hash_format {
            return Err(PackError::FormatError(format!(
                "hash format mismatch: file declares {fmt_id}, caller expected {hash_format}"
            )));
        }
        pos += fmt_id_len;

        let codec_byte = mmap[pos];
        pos += 1;
        let default_codec = CompressionKind::from_byte(codec_byte)?;

        let flags = read_u16(&mmap, &mut pos)?;

        let hash_size = hash_format.digest_len();
        let footer_len = 8 + hash_size;
        if mmap.len() < pos + footer_len {
            return Err(PackError::FormatError("data file truncated before footer".into()));
        }
        let checksum_offset = mmap.len() - hash_size;
        let mut count_pos = checksum_offset - 8;
        let entry_count = read_u64(&mmap, &mut count_pos)?;

        Ok(Self {
            mmap,
            generation,
            hash_format,
            default_codec,
            flags,
            checksum_offset,
            entry_count,
        })
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Rehash the file prefix and compare against the trailing checksum
    /// (spec §4.3 `Validate()`).
    pub fn validate(&self) -> Result<(), PackError> {
        let computed = Hasher::digest(self.hash_format, &self.mmap[..self.checksum_offset]);
        let stored = &self.mmap[self.checksum_offset..];
        if computed.as_bytes() != stored {
            return Err(PackError::ChecksumMismatch {
                expected: archive_hash::hex_to_string(stored),
                actual: computed.to_hex(),
            });
        }
        Ok(())
    }

    /// Parse one entry at `offset`, fully decompressing its payload.
    pub fn read_entry_at(&self, offset: u64) -> Result<DataEntry, PackError> {
        let hash_size = self.hash_format.digest_len();
        let mmap = &self.mmap[..];
        let mut pos = offset as usize;

        if pos + hash_size > mmap.len() {
            return Err(PackError::FormatError("entry offset out of range".into()));
        }
        let hash = BlobId::from_bytes(self.hash_format, &mmap[pos..pos + hash_size])?;
        pos += hash_size;

        match self.generation {
            Generation::V0 => {
                let u_size = read_u64(mmap, &mut pos)?;
                let c_size = read_u64(mmap, &mut pos)?;
                let compressed = read_slice(mmap, pos, c_size)?;
                let payload = self.default_codec.decompress(compressed)?;
                if payload.len() as u64 != u_size {
                    return Err(PackError::FormatError("uncompressed size mismatch".into()));
                }
                Ok(DataEntry::Full { hash, payload })
            }
            Generation::V1 => {
                if pos + 2 > mmap.len() {
                    return Err(PackError::FormatError("truncated before entry type/encoding byte".into()));
                }
                let entry_type_byte = mmap[pos];
                pos += 1;
                let encoding_byte = mmap[pos];
                pos += 1;
                let codec = CompressionKind::from_byte(encoding_byte)?;
                let entry_type = EntryType::from_byte(entry_type_byte)
                    .ok_or_else(|| PackError::FormatError(format!("unknown entry type byte {entry_type_byte}")))?;

                match entry_type {
                    EntryType::Full => {
                        let u_size = read_u64(mmap, &mut pos)?;
                        let c_size = read_u64(mmap, &mut pos)?;
                        let compressed = read_slice(mmap, pos, c_size)?;
                        let payload = codec.decompress(compressed)?;
                        if payload.len() as u64 != u_size {
                            return Err(PackError::FormatError("uncompressed size mismatch".into()));
                        }
                        Ok(DataEntry::Full { hash, payload })
                    }
                    EntryType::Delta => {
                        if pos + 1 > mmap.len() {
                            return Err(PackError::FormatError("truncated before delta algorithm byte".into()));
                        }
                        let delta_algorithm = mmap[pos];
                        pos += 1;
                        let base_hash_bytes = read_slice(mmap, pos, hash_size as u64)?;
                        let base_hash = BlobId::from_bytes(self.hash_format, base_hash_bytes)?;
                        pos += hash_size;
                        let uncompressed_size = read_u64(mmap, &mut pos)?;
                        let delta_size = read_u64(mmap, &mut pos)?;
                        let compressed = read_slice(mmap, pos, delta_size)?;
                        let delta_payload = codec.decompress(compressed)?;
                        Ok(DataEntry::Delta {
                            hash,
                            base_hash,
                            delta_algorithm,
                            uncompressed_size,
                            delta_payload,
                        })
                    }
                }
            }
        }
    }
}
