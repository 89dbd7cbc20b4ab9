//! Index file codec (spec §4.4): a sorted, fan-out-indexed table mapping
//! each hash in one archive to its data-file offset.
//!
//! ```text
//! header (magic "DIAX", version, fmt_id_len, fmt_id, entry_count)
//! fanOut: 256 x uint64
//! entries sorted by hash
//! checksum: hash_size B over the preceding bytes
//! ```

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use archive_hash::{BlobId, HashFormat, Hasher};
use archive_utils::AtomicFile;

use crate::bytes::{push_u64, read_u64};
use crate::entry::{EntryType, Generation};
use crate::{PackError, INDEX_MAGIC};

/// One entry as recorded in an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: BlobId,
    pub pack_offset: u64,
    pub compressed_size: u64,
    /// v1 only; `EntryType::Full` for v0 entries.
    pub entry_type: EntryType,
    /// v1 delta entries only; meaningless for full entries.
    pub base_offset: u64,
}

/// Write a sorted, deduplicated entry list to `<dir>/<hex(checksum)><ext>`.
///
/// The caller (the packer) supplies `checksum` — the data file's own
/// content hash — since the index filename stem must match the data file
/// it describes.
pub fn write_index(
    dir: impl AsRef<Path>,
    generation: Generation,
    hash_format: HashFormat,
    checksum: &BlobId,
    entries: &[IndexEntry],
) -> Result<PathBuf, PackError> {
    verify_sorted(entries, hash_format)?;

    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let final_path = dir.join(format!("{}{}", checksum.to_hex(), generation.index_ext()));

    let mut hasher = Hasher::new(hash_format);
    let mut file = AtomicFile::new_for(&final_path)?;

    let fmt_id = hash_format.id().as_bytes();
    let mut header = Vec::new();
    header.extend_from_slice(INDEX_MAGIC);
    crate::bytes::push_u16(&mut header, generation.version());
    header.push(fmt_id.len() as u8);
    header.extend_from_slice(fmt_id);
    push_u64(&mut header, entries.len() as u64);

    write_and_hash(&mut file, &mut hasher, &header)?;

    let fan_out = build_fan_out(entries);
    let mut fan_out_buf = Vec::with_capacity(256 * 8);
    for count in fan_out {
        push_u64(&mut fan_out_buf, count);
    }
    write_and_hash(&mut file, &mut hasher, &fan_out_buf)?;

    for entry in entries {
        let mut buf = Vec::new();
        buf.extend_from_slice(entry.hash.as_bytes());
        push_u64(&mut buf, entry.pack_offset);
        push_u64(&mut buf, entry.compressed_size);
        if generation == Generation::V1 {
            buf.push(entry.entry_type.to_byte());
            push_u64(&mut buf, entry.base_offset);
        }
        write_and_hash(&mut file, &mut hasher, &buf)?;
    }

    let digest = hasher.finalize();
    file.write_all(digest.as_bytes())?;
    file.persist(&final_path)?;

    Ok(final_path)
}

fn write_and_hash(file: &mut AtomicFile, hasher: &mut Hasher, buf: &[u8]) -> Result<(), PackError> {
    file.write_all(buf)?;
    hasher.update(buf);
    Ok(())
}

/// Derive the 256-way cumulative fan-out table from a sorted entry list
/// (spec §3 `FanOut[256]`).
fn build_fan_out(entries: &[IndexEntry]) -> [u64; 256] {
    let mut table = [0u64; 256];
    for entry in entries {
        table[entry.hash.first_byte() as usize] += 1;
    }
    let mut running = 0u64;
    for count in table.iter_mut() {
        running += *count;
        *count = running;
    }
    table
}

fn verify_sorted(entries: &[IndexEntry], hash_format: HashFormat) -> Result<(), PackError> {
    let expected_len = hash_format.digest_len();
    for entry in entries {
        if entry.hash.as_bytes().len() != expected_len {
            return Err(PackError::NotSortedOrSize(format!(
                "hash length {} does not match format {hash_format}",
                entry.hash.as_bytes().len()
            )));
        }
    }
    for pair in entries.windows(2) {
        if pair[0].hash.as_bytes() >= pair[1].hash.as_bytes() {
            return Err(PackError::NotSortedOrSize(
                "entries not strictly ascending by hash, or contain duplicates".into(),
            ));
        }
    }
    Ok(())
}

/// Random-access reader over a finished index file (mmap'd, fan-out cached
/// entirely in memory per spec §4.4).
pub struct IndexReader {
    mmap: memmap2::Mmap,
    generation: Generation,
    hash_format: HashFormat,
    fan_out: [u64; 256],
    entries_offset: usize,
    entry_stride: usize,
    entry_count: u64,
}

/// Lookup result (spec §4.4 `Lookup`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupHit {
    pub pack_offset: u64,
    pub compressed_size: u64,
    pub entry_type: EntryType,
    pub base_offset: u64,
}

impl IndexReader {
    pub fn open(path: impl AsRef<Path>, hash_format: HashFormat) -> Result<Self, PackError> {
        let file = fs::File::open(path.as_ref())?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };

        if mmap.len() < 4 + 2 + 1 {
            return Err(PackError::FormatError("index file truncated before header".into()));
        }
        if &mmap[0..4] != INDEX_MAGIC {
            return Err(PackError::FormatError("bad index file magic".into()));
        }
        let mut pos = 4;
        let version = crate::bytes::read_u16(&mmap, &mut pos)?;
        let generation = Generation::from_version(version)
            .ok_or_else(|| PackError::FormatError(format!("unsupported index version {version}")))?;

        let fmt_id_len = mmap[pos] as usize;
        pos += 1;
        if mmap.len() < pos + fmt_id_len + 8 {
            return Err(PackError::FormatError("index file truncated before entry count".into()));
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

        let entry_count = read_u64(&mmap, &mut pos)?;

        let fan_out_offset = pos;
        if mmap.len() < fan_out_offset + 256 * 8 {
            return Err(PackError::FormatError("index file truncated before fan-out table".into()));
        }
        let mut fan_out = [0u64; 256];
        let mut fpos = fan_out_offset;
        for slot in fan_out.iter_mut() {
            *slot = read_u64(&mmap, &mut fpos)?;
        }
        if fan_out[255] != entry_count {
            return Err(PackError::FormatError(
                "fan-out table total does not match entry count".into(),
            ));
        }

        let entries_offset = fan_out_offset + 256 * 8;
        let hash_size = hash_format.digest_len();
        let entry_stride = match generation {
            Generation::V0 => hash_size + 8 + 8,
            Generation::V1 => hash_size + 8 + 8 + 1 + 8,
        };

        let entries_len = entry_stride * entry_count as usize;
        if mmap.len() < entries_offset + entries_len + hash_size {
            return Err(PackError::FormatError("index file truncated before entries/checksum".into()));
        }

        Ok(Self {
            mmap,
            generation,
            hash_format,
            fan_out,
            entries_offset,
            entry_stride,
            entry_count,
        })
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn fan_out(&self) -> &[u64; 256] {
        &self.fan_out
    }

    /// Rehash the file prefix and compare against the trailing checksum.
    pub fn validate(&self) -> Result<(), PackError> {
        let hash_size = self.hash_format.digest_len();
        let checksum_offset = self.mmap.len() - hash_size;
        let computed = Hasher::digest(self.hash_format, &self.mmap[..checksum_offset]);
        let stored = &self.mmap[checksum_offset..];
        if computed.as_bytes() != stored {
            return Err(PackError::ChecksumMismatch {
                expected: archive_hash::hex_to_string(stored),
                actual: computed.to_hex(),
            });
        }
        Ok(())
    }

    fn entry_at(&self, index: usize) -> IndexEntry {
        let hash_size = self.hash_format.digest_len();
        let start = self.entries_offset + index * self.entry_stride;
        let mut pos = start;
        let hash = BlobId::from_bytes(self.hash_format, &self.mmap[pos..pos + hash_size])
            .expect("index entry hash has the declared format's length");
        pos += hash_size;
        let pack_offset = read_u64(&self.mmap, &mut pos).expect("entry bounds validated by open()");
        let compressed_size = read_u64(&self.mmap, &mut pos).expect("entry bounds validated by open()");
        let (entry_type, base_offset) = if self.generation == Generation::V1 {
            let entry_type_byte = self.mmap[pos];
            pos += 1;
            let entry_type = EntryType::from_byte(entry_type_byte).expect("entry type byte written by this crate");
            let base_offset = read_u64(&self.mmap, &mut pos).expect("entry bounds validated by open()");
            (entry_type, base_offset)
        } else {
            (EntryType::Full, 0)
        };
        IndexEntry {
            hash,
            pack_offset,
            compressed_size,
            entry_type,
            base_offset,
        }
    }

    /// Binary search for `hash` within its fan-out bucket (spec §4.4).
    pub fn lookup(&self, hash: &BlobId) -> Option<LookupHit> {
        if self.entry_count == 0 {
            return None;
        }
        let b = hash.first_byte() as usize;
        let lo = if b == 0 { 0 } else { self.fan_out[b - 1] } as usize;
        let hi = self.fan_out[b] as usize;

        let mut low = lo;
        let mut high = hi;
        let target = hash.as_bytes();
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = self.entry_at(mid);
            match entry.hash.as_bytes().cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => {
                    return Some(LookupHit {
                        pack_offset: entry.pack_offset,
                        compressed_size: entry.compressed_size,
                        entry_type: entry.entry_type,
                        base_offset: entry.base_offset,
                    });
                }
            }
        }
        None
    }

    /// Iterate over every entry in sorted order.
    pub fn iter(&self) -> IndexIter<'_> {
        IndexIter { reader: self, pos: 0 }
    }
}

pub struct IndexIter<'a> {
    reader: &'a IndexReader,
    pos: u64,
}

impl<'a> Iterator for IndexIter<'a> {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.reader.entry_count {
            return None;
        }
        let entry = self.reader.entry_at(self.pos as usize);
        self.pos += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.reader.entry_count - self.pos) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_hash::Hasher as H;

    fn id(byte: u8) -> BlobId {
        let mut bytes = [0u8; 32];
        bytes[0] = byte;
        bytes[31] = byte.wrapping_add(1);
        BlobId::from_bytes(HashFormat::Sha256, &bytes).unwrap()
    }

    #[test]
    fn write_and_lookup_v0() {
        let dir = tempfile::tempdir().unwrap();
        let checksum = H::digest(HashFormat::Sha256, b"checksum seed");
        let entries = vec![
            IndexEntry { hash: id(1), pack_offset: 10, compressed_size: 5, entry_type: EntryType::Full, base_offset: 0 },
            IndexEntry { hash: id(5), pack_offset: 20, compressed_size: 6, entry_type: EntryType::Full, base_offset: 0 },
            IndexEntry { hash: id(200), pack_offset: 30, compressed_size: 7, entry_type: EntryType::Full, base_offset: 0 },
        ];
        let path = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap();

        let reader = IndexReader::open(&path, HashFormat::Sha256).unwrap();
        reader.validate().unwrap();
        assert_eq!(reader.entry_count(), 3);

        for entry in &entries {
            let hit = reader.lookup(&entry.hash).unwrap();
            assert_eq!(hit.pack_offset, entry.pack_offset);
            assert_eq!(hit.compressed_size, entry.compressed_size);
        }
        assert!(reader.lookup(&id(42)).is_none());
    }

    #[test]
    fn write_and_lookup_v1_delta_entry() {
        let dir = tempfile::tempdir().unwrap();
        let checksum = H::digest(HashFormat::Sha256, b"checksum seed v1");
        let entries = vec![
            IndexEntry { hash: id(1), pack_offset: 0, compressed_size: 100, entry_type: EntryType::Full, base_offset: 0 },
            IndexEntry { hash: id(9), pack_offset: 120, compressed_size: 30, entry_type: EntryType::Delta, base_offset: 0 },
        ];
        let path = write_index(dir.path(), Generation::V1, HashFormat::Sha256, &checksum, &entries).unwrap();

        let reader = IndexReader::open(&path, HashFormat::Sha256).unwrap();
        let hit = reader.lookup(&id(9)).unwrap();
        assert_eq!(hit.entry_type, EntryType::Delta);
        assert_eq!(hit.base_offset, 0);
        assert_eq!(hit.pack_offset, 120);
    }

    #[test]
    fn unsorted_input_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let checksum = H::digest(HashFormat::Sha256, b"x");
        let entries = vec![
            IndexEntry { hash: id(5), pack_offset: 0, compressed_size: 0, entry_type: EntryType::Full, base_offset: 0 },
            IndexEntry { hash: id(1), pack_offset: 0, compressed_size: 0, entry_type: EntryType::Full, base_offset: 0 },
        ];
        let err = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap_err();
        assert!(matches!(err, PackError::NotSortedOrSize(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn duplicate_hash_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let checksum = H::digest(HashFormat::Sha256, b"y");
        let entries = vec![
            IndexEntry { hash: id(5), pack_offset: 0, compressed_size: 0, entry_type: EntryType::Full, base_offset: 0 },
            IndexEntry { hash: id(5), pack_offset: 1, compressed_size: 1, entry_type: EntryType::Full, base_offset: 0 },
        ];
        let err = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap_err();
        assert!(matches!(err, PackError::NotSortedOrSize(_)));
    }

    #[test]
    fn fan_out_matches_spec_s6() {
        let dir = tempfile::tempdir().unwrap();
        let checksum = H::digest(HashFormat::Sha256, b"fanout seed");
        let mut entries: Vec<IndexEntry> = (0..15u8)
            .map(|i| IndexEntry {
                hash: id(i * 17),
                pack_offset: i as u64,
                compressed_size: 1,
                entry_type: EntryType::Full,
                base_offset: 0,
            })
            .collect();
        entries.sort_by(|a, b| a.hash.as_bytes().cmp(b.hash.as_bytes()));
        let path = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap();

        let reader = IndexReader::open(&path, HashFormat::Sha256).unwrap();
        assert_eq!(reader.fan_out()[255], 15);
        for b in 0u16..=255 {
            let expected = entries.iter().filter(|e| (e.hash.first_byte() as u16) <= b).count() as u64;
            assert_eq!(reader.fan_out()[b as usize], expected, "mismatch at byte {b}");
        }
    }

    #[test]
    fn iterates_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let checksum = H::digest(HashFormat::Sha256, b"iter seed");
        let entries = vec![
            IndexEntry { hash: id(1), pack_offset: 0, compressed_size: 0, entry_type: EntryType::Full, base_offset: 0 },
            IndexEntry { hash: id(100), pack_offset: 1, compressed_size: 0, entry_type: EntryType::Full, base_offset: 0 },
        ];
        let path = write_index(dir.path(), Generation::V0, HashFormat::Sha256, &checksum, &entries).unwrap();
        let reader = IndexReader::open(&path, HashFormat::Sha256).unwrap();
        let collected: Vec<_> = reader.iter().map(|e| e.hash).collect();
        assert_eq!(collected, vec![entries[0].hash, entries[1].hash]);
    }
}
