//! The union view itself (spec §4.7) and its index-cache lifecycle.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use archive_hash::{BlobId, HashFormat};
use archive_loose::LooseStore;
use archive_pack::cache::{self, CacheEntry};
use archive_pack::data::{DataEntry, DataReader};
use archive_pack::index::IndexReader;
use archive_pack::{CompressionKind, EntryType, Generation, PackError};

use crate::{StoreConfig, StoreError};

/// Where one hash lives in the union of archives: which archive (by its
/// content checksum), at what offset, and (v1) how to reconstruct it if
/// it's a delta.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Location {
    pub archive_checksum: BlobId,
    pub offset: u64,
    pub compressed_size: u64,
    pub entry_type: EntryType,
    pub base_offset: u64,
}

/// Presents `union(loose, archive)` as one content-addressed store (spec
/// §4.7). Bound to a single format generation for its lifetime: the
/// directory's archives, index files, and cache file all share one `vN`
/// (see `DESIGN.md` for why a store does not mix generations).
pub struct ArchiveStore {
    dir: PathBuf,
    generation: Generation,
    hash_format: HashFormat,
    compression: CompressionKind,
    loose: LooseStore,
    index: RwLock<HashMap<BlobId, Location>>,
    readers: RwLock<HashMap<BlobId, std::sync::Arc<DataReader>>>,
}

impl ArchiveStore {
    /// Open (or create) a store rooted at `dir`, loading the index cache if
    /// present and valid, otherwise rebuilding it from the index files on
    /// disk (spec §4.7 "Index lifecycle on construction").
    pub fn open(
        dir: impl AsRef<Path>,
        loose: LooseStore,
        generation: Generation,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            generation,
            hash_format: config.hash_format,
            compression: config.compression,
            loose,
            index: RwLock::new(HashMap::new()),
            readers: RwLock::new(HashMap::new()),
        };
        store.load_index()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn hash_format(&self) -> HashFormat {
        self.hash_format
    }

    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    pub(crate) fn loose(&self) -> &LooseStore {
        &self.loose
    }

    fn cache_path(&self) -> PathBuf {
        self.dir.join(self.generation.cache_name())
    }

    /// Step 1/2/3 of spec §4.7's index lifecycle: try the cache, fall back
    /// to rebuilding from the `.inventory_archive_index-vN` files present.
    fn load_index(&mut self) -> Result<(), StoreError> {
        let cache_path = self.cache_path();
        if cache_path.is_file() {
            match cache::read_cache(&cache_path, self.hash_format) {
                Ok(entries) => {
                    let mut map = HashMap::with_capacity(entries.len());
                    for entry in entries {
                        map.insert(
                            entry.hash,
                            Location {
                                archive_checksum: entry.archive_checksum,
                                offset: entry.offset,
                                compressed_size: entry.compressed_size,
                                entry_type: entry.entry_type,
                                base_offset: entry.base_offset,
                            },
                        );
                    }
                    *self.index.write().unwrap() = map;
                    return Ok(());
                }
                Err(_) => {
                    // Corrupt or unreadable cache is treated as absent.
                }
            }
        }
        self.rebuild_index()
    }

    /// Rescan every matching index file and rewrite the cache atomically
    /// (spec §4.7 step 2). Glob order is made deterministic by sorting
    /// index files by filename, resolving the "last-wins across archives"
    /// open question in spec §9 (see `DESIGN.md`).
    pub fn rebuild_index(&mut self) -> Result<(), StoreError> {
        let suffix = self.generation.index_ext();
        let mut index_files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(suffix))
            })
            .collect();
        index_files.sort();

        let mut map: HashMap<BlobId, Location> = HashMap::new();
        for path in &index_files {
            let stem = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(suffix))
                .ok_or_else(|| PackError::FormatError(format!("unexpected index filename {path:?}")))?;
            let archive_checksum = BlobId::from_hex(self.hash_format, stem)?;

            let reader = IndexReader::open(path, self.hash_format)?;
            reader.validate()?;
            for entry in reader.iter() {
                map.insert(
                    entry.hash,
                    Location {
                        archive_checksum,
                        offset: entry.pack_offset,
                        compressed_size: entry.compressed_size,
                        entry_type: entry.entry_type,
                        base_offset: entry.base_offset,
                    },
                );
            }
        }

        self.write_cache(&map)?;
        *self.index.write().unwrap() = map;
        Ok(())
    }

    fn write_cache(&self, map: &HashMap<BlobId, Location>) -> Result<(), StoreError> {
        let mut entries: Vec<CacheEntry> = map
            .iter()
            .map(|(hash, loc)| CacheEntry {
                hash: *hash,
                archive_checksum: loc.archive_checksum,
                offset: loc.offset,
                compressed_size: loc.compressed_size,
                entry_type: loc.entry_type,
                base_offset: loc.base_offset,
            })
            .collect();
        entries.sort_by(|a, b| a.hash.as_bytes().cmp(b.hash.as_bytes()));
        cache::write_cache(&self.dir, self.generation, self.hash_format, &entries)?;
        Ok(())
    }

    pub(crate) fn insert_archive(
        &self,
        map_addition: HashMap<BlobId, Location>,
    ) -> Result<(), StoreError> {
        let mut index = self.index.write().unwrap();
        index.extend(map_addition);
        self.write_cache(&index)
    }

    fn archive_path(&self, checksum: &BlobId) -> PathBuf {
        self.dir
            .join(format!("{}{}", checksum.to_hex(), self.generation.data_ext()))
    }

    fn open_archive(&self, checksum: &BlobId) -> Result<std::sync::Arc<DataReader>, StoreError> {
        if let Some(reader) = self.readers.read().unwrap().get(checksum) {
            return Ok(reader.clone());
        }
        let reader = std::sync::Arc::new(DataReader::open(self.archive_path(checksum), self.hash_format)?);
        self.readers.write().unwrap().insert(*checksum, reader.clone());
        Ok(reader)
    }

    /// True iff `id` is null, archive-indexed, or present in the loose store
    /// (spec §4.7 `HasBlob`).
    pub fn has_blob(&self, id: &BlobId) -> bool {
        id.is_null() || self.is_archived(id) || self.loose.contains(id)
    }

    /// True iff `id` is present in the archive index (as opposed to only
    /// loose). Used by the packer to skip blobs that are already packed.
    pub(crate) fn is_archived(&self, id: &BlobId) -> bool {
        self.index.read().unwrap().contains_key(id)
    }

    /// Read a blob's bytes, reconstructing a delta against its in-archive
    /// base if needed (spec §4.7 `MakeBlobReader`).
    pub fn read_blob(&self, id: &BlobId) -> Result<Option<Vec<u8>>, StoreError> {
        if id.is_null() {
            return Ok(Some(Vec::new()));
        }

        let location = { self.index.read().unwrap().get(id).copied() };
        let Some(location) = location else {
            return Ok(self.loose.read(id)?);
        };

        let reader = self.open_archive(&location.archive_checksum)?;
        match reader.read_entry_at(location.offset)? {
            DataEntry::Full { payload, .. } => Ok(Some(payload)),
            DataEntry::Delta {
                base_hash,
                delta_algorithm,
                delta_payload,
                ..
            } => {
                let base_entry = reader.read_entry_at(location.base_offset)?;
                let base_payload = match base_entry {
                    DataEntry::Full { hash, payload } if hash == base_hash => payload,
                    DataEntry::Full { hash, .. } => {
                        return Err(StoreError::Pack(PackError::MissingBase { hash: hash.to_hex() }));
                    }
                    DataEntry::Delta { hash, .. } => {
                        return Err(StoreError::Pack(PackError::ChainedDelta { hash: hash.to_hex() }));
                    }
                };
                let algorithm = archive_pack::delta::by_id(delta_algorithm)?;
                Ok(Some(algorithm.apply(&base_payload, &delta_payload)?))
            }
        }
    }

    /// Yield every archive-indexed id once, then every loose id not already
    /// archive-indexed (spec §4.7 `AllBlobs`, §9 "Loose-archive union").
    pub fn all_blobs(&self) -> Result<Vec<BlobId>, StoreError> {
        let index = self.index.read().unwrap();
        let mut ids: Vec<BlobId> = index.keys().copied().collect();
        ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

        for result in self.loose.iter()? {
            let id = result?;
            if !index.contains_key(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
