//! The inventory archive engine: on-disk formats for bundling many small
//! immutable blobs into one data file plus one index file, with optional
//! binary-delta encoding between similar blobs, and a flat cache that unions
//! an archive store's indexes.
//!
//! Two format generations coexist: v0 (full entries only, one archive-wide
//! compression codec) and v1 (full + delta entries, per-entry compression
//! byte, header flags). Neither generation is ever mutated in place; an
//! archive's filename stem is the hex of its own content checksum, so
//! re-packing the same bytes is idempotent by construction.

mod bytes;

pub mod archive;
pub mod cache;
pub mod codec;
pub mod data;
pub mod delta;
pub mod entry;
pub mod index;
pub mod select;

pub use archive::ArchiveFile;
pub use codec::CompressionKind;
pub use data::WrittenEntry;
pub use entry::{EntryType, Generation};

use archive_hash::BlobId;

/// Magic bytes and fixed header constants (spec §6).
pub const DATA_MAGIC: &[u8; 4] = b"DIAR";
pub const INDEX_MAGIC: &[u8; 4] = b"DIAX";
pub const CACHE_MAGIC: &[u8; 4] = b"DIAC";

pub const VERSION_V0: u16 = 0;
pub const VERSION_V1: u16 = 1;

pub const DATA_EXT_V0: &str = ".inventory_archive-v0";
pub const DATA_EXT_V1: &str = ".inventory_archive-v1";
pub const INDEX_EXT_V0: &str = ".inventory_archive_index-v0";
pub const INDEX_EXT_V1: &str = ".inventory_archive_index-v1";
pub const CACHE_NAME_V0: &str = "index_cache-v0";
pub const CACHE_NAME_V1: &str = "index_cache-v1";

/// `HasDeltas`: set iff the writer attempted any delta assignment, even if
/// every attempt fell back to a full entry (spec §4.3).
pub const FLAG_HAS_DELTAS: u16 = 1 << 0;
/// Reserved, currently unused bit (spec §9 Open Questions).
pub const FLAG_RESERVED_CROSS_ARCH: u16 = 1 << 1;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("format error: {0}")]
    FormatError(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("writer input not sorted or wrong size: {0}")]
    NotSortedOrSize(String),

    #[error("unsupported delta algorithm id {0}")]
    UnsupportedDeltaAlgorithm(u8),

    #[error("unknown delta algorithm name {0:?}")]
    UnknownDeltaAlgorithmName(String),

    #[error("delta apply failed: {0}")]
    DeltaApplyError(String),

    #[error("delta compute failed: {0}")]
    DeltaComputeError(String),

    #[error("chained delta: base {hash} of a delta entry is itself a delta entry")]
    ChainedDelta { hash: String },

    #[error("delta base {hash} not found in archive")]
    MissingBase { hash: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] archive_hash::HashError),
}

/// A blob staged for packing: its id and full payload bytes, owned by the
/// packer for the duration of one pack operation (spec §3 `PackedBlob`).
#[derive(Clone)]
pub struct PackedBlob {
    pub id: BlobId,
    pub payload: Vec<u8>,
}
