//! `ArchiveStore`: the union content-addressed view over a loose blob store
//! and its inventory archives (spec §4.7), plus the packer that builds new
//! archives from loose blobs (spec §4.8).
//!
//! This crate owns the two components spec.md describes as sitting above
//! the on-disk formats in `archive-pack`: the read path that presents
//! `union(loose, archive)` as one store, and the write path that turns a
//! batch of loose blobs into a new archive.

mod config;
mod packer;
mod store;

pub use config::{DeltaConfig, PackOptions, StoreConfig};
pub use packer::PackReport;
pub use store::ArchiveStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Pack(#[from] archive_pack::PackError),

    #[error(transparent)]
    Loose(#[from] archive_loose::LooseError),

    #[error(transparent)]
    Hash(#[from] archive_hash::HashError),

    #[error(transparent)]
    Util(#[from] archive_utils::UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("deletion precondition failed: {0}")]
    DeletionPreconditionFailed(String),

    #[error(
        "pack options request generation {requested:?} but this store was opened as {opened:?}"
    )]
    GenerationMismatch {
        requested: archive_pack::Generation,
        opened: archive_pack::Generation,
    },
}
