use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use archive_hash::BlobId;
use archive_loose::LooseStore;
use archive_pack::Generation;
use archive_store::{ArchiveStore, StoreConfig};
use clap::Args;

use super::parse_hash_format;

#[derive(Args)]
pub struct CatArgs {
    /// Store directory: archives and loose blobs both live under here
    #[arg(long)]
    store: PathBuf,

    /// Hash format the store uses (sha256 | blake2b-256)
    #[arg(long, default_value = "sha256")]
    hash_format: String,

    /// Hex-encoded blob hash to read
    hash: String,
}

pub fn run(args: &CatArgs) -> Result<i32> {
    let hash_format = parse_hash_format(&args.hash_format)?;
    let id = BlobId::from_hex(hash_format, &args.hash)?;

    let loose = LooseStore::open(args.store.join("loose"), hash_format);
    let generation = detect_generation(&args.store);
    let store = ArchiveStore::open(
        &args.store,
        loose,
        generation,
        StoreConfig { hash_format, compression: archive_pack::CompressionKind::Zlib },
    )?;

    match store.read_blob(&id)? {
        Some(bytes) => {
            std::io::stdout().write_all(&bytes)?;
            Ok(0)
        }
        None => bail!("blob {} not found", id),
    }
}

/// A store directory is packed as exactly one generation at a time (see
/// `DESIGN.md`); detect which by checking for that generation's index
/// files, defaulting to v0 for a directory with no archives yet.
fn detect_generation(store_dir: &Path) -> Generation {
    let has_v1 = std::fs::read_dir(store_dir)
        .map(|entries| {
            entries.flatten().any(|entry| {
                entry
                    .path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.ends_with(archive_pack::INDEX_EXT_V1))
            })
        })
        .unwrap_or(false);
    if has_v1 {
        Generation::V1
    } else {
        Generation::V0
    }
}
