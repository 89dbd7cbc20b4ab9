//! Cache file codec (spec §4.5): a flat, persisted snapshot of the union
//! of all archives' indexes in one directory, avoiding a index-file rescan
//! at store startup.
//!
//! ```text
//! header (magic "DIAC", version, fmt_id_len, fmt_id, entry_count)
//! entries sorted by hash
//! checksum: hash_size B over the preceding bytes
//! ```
//!
//! Unlike the index file, the cache carries no on-disk fan-out table: it is
//! always loaded in full into an in-memory map (spec §4.7 step 1), so a
//! fan-out table would only add bytes nothing reads back off disk.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use archive_hash::{BlobId, HashFormat, Hasher};
use archive_utils::AtomicFile;

use crate::bytes::{push_u64, read_u64};
use crate::entry::{EntryType, Generation};
use crate::{PackError, CACHE_MAGIC};

/// One entry in the union cache: a hash, which archive it lives in, and
/// where (spec §3 `CacheEntry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: BlobId,
    pub archive_checksum: BlobId,
    pub offset: u64,
    pub compressed_size: u64,
    pub entry_type: EntryType,
    pub base_offset: u64,
}

/// Write the cache file at `<dir>/<cache_name>`, replacing any existing one
/// atomically. `entries` MUST already be sorted by hash with no duplicates.
pub fn write_cache(
    dir: impl AsRef<Path>,
    generation: Generation,
    hash_format: HashFormat,
    entries: &[CacheEntry],
) -> Result<PathBuf, PackError> {
    verify_sorted(entries)?;

    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let final_path = dir.join(generation.cache_name());

    let mut hasher = Hasher::new(hash_format);
    let mut file = AtomicFile::new_for(&final_path)?;

    let fmt_id = hash_format.id().as_bytes();
    let mut header = Vec::new();
    header.extend_from_slice(CACHE_MAGIC);
    crate::bytes::push_u16(&mut header, generation.version());
    header.push(fmt_id.len() as u8);
    header.extend_from_slice(fmt_id);
    push_u64(&mut header, entries.len() as u64);
    file.write_all(&header)?;
    hasher.update(&header);

    for entry in entries {
        let mut buf = Vec::new();
        buf.extend_from_slice(entry.hash.as_bytes());
        buf.extend_from_slice(entry.archive_checksum.as_bytes());
        push_u64(&mut buf, entry.offset);
        push_u64(&mut buf, entry.compressed_size);
        if generation == Generation::V1 {
            buf.push(entry.entry_type.to_byte());
            push_u64(&mut buf, entry.base_offset);
        }
        file.write_all(&buf)?;
        hasher.update(&buf);
    }

    let digest = hasher.finalize();
    file.write_all(digest.as_bytes())?;
    file.persist(&final_path)?;

    Ok(final_path)
}

fn verify_sorted(entries: &[CacheEntry]) -> Result<(), PackError> {
    for pair in entries.windows(2) {
        if pair[0].hash.as_bytes() >= pair[1].hash.as_bytes() {
            return Err(PackError::NotSortedOrSize(
                "cache entries not strictly ascending by hash, or contain duplicates".into(),
            ));
        }
    }
    Ok(())
}

/// Load a cache file fully into memory, verifying its trailing checksum
/// (spec §4.7 step 1: an unreadable or corrupt cache is treated as absent).
pub fn read_cache(
    path: impl AsRef<Path>,
    hash_format: HashFormat,
) -> Result<Vec<CacheEntry>, PackError> {
    let bytes = fs::read(path.as_ref())?;

    if bytes.len() < 4 + 2 + 1 {
        return Err(PackError::FormatError("cache file truncated before header".into()));
    }
    if &bytes[0..4] != CACHE_MAGIC {
        return Err(PackError::FormatError("bad cache file magic".into()));
    }
    let mut pos = 4;
    let version = crate::bytes::read_u16(&bytes, &mut pos)?;
    let generation = Generation::from_version(version)
        .ok_or_else(|| PackError::FormatError(format!("unsupported cache version {version}")))?;

    let fmt_id_len = bytes[pos] as usize;
    pos += 1;
    if bytes.len() < pos + fmt_id_len + 8 {
        return Err(PackError::FormatError("cache file truncated before entry count".into()));
    }
    let fmt_id = std::str::from_utf8(&bytes[pos..pos + fmt_id_len])
        .map_err(|_| PackError::FormatError("non-utf8 hash format id".into()))?;
    let file_format = HashFormat::from_id(fmt_id)?;
    if file_format != hash_format {
        return Err(PackError::FormatError(format!(
            "hash format mismatch: file declares {fmt_id}, caller expected {hash_format}"
        )));
    }
    pos += fmt_id_len;
    let entry_count = read_u64(&bytes, &mut pos)?;

    let hash_size = hash_format.digest_len();
    let entry_stride = match generation {
        Generation::V0 => hash_size + hash_size + 8 + 8,
        Generation::V1 => hash_size + hash_size + 8 + 8 + 1 + 8,
    };

    let entries_offset = pos;
    let entries_len = entry_stride * entry_count as usize;
    if bytes.len() < entries_offset + entries_len + hash_size {
        return Err(PackError::FormatError("cache file truncated before entries/checksum".into()));
    }

    let checksum_offset = bytes.len() - hash_size;
    let computed = Hasher::digest(hash_format, &bytes[..checksum_offset]);
    if computed.as_bytes() != &bytes[checksum_offset..] {
        return Err(PackError::ChecksumMismatch {
            expected: archive_hash::hex_to_string(&bytes[checksum_offset..]),
            actual: computed.to_hex(),
        });
    }

    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut cursor = entries_offset;
    for _ in 0..entry_count {
        let hash = BlobId::from_bytes(hash_format, &bytes[cursor..cursor + hash_size])?;
        cursor += hash_size;
        let archive_checksum = BlobId::from_bytes(hash_format, &bytes[cursor..cursor + hash_size])?;
        cursor += hash_size;
        let offset = read_u64(&bytes, &mut cursor)?;
        let compressed_size = read_u64(&bytes, &mut cursor)?;
        let (entry_type, base_offset) = if generation == Generation::V1 {
            let entry_type_byte = bytes[cursor];
            cursor += 1;
            let entry_type = EntryType::from_byte(entry_type_byte)
                .ok_or_else(|| PackError::FormatError(format!("unknown entry type byte {entry_type_byte}")))?;
            let base_offset = read_u64(&bytes, &mut cursor)?;
            (entry_type, base_offset)
        } else {
            (EntryType::Full, 0)
        };
        entries.push(CacheEntry {
            hash,
            archive_checksum,
            offset,
            compressed_size,
            entry_type,
            base_offset,
        });
    }

    Ok(entries)
}
