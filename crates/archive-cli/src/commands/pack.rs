use std::path::PathBuf;

use anyhow::Result;
use archive_loose::LooseStore;
use archive_pack::Generation;
use archive_store::{ArchiveStore, DeltaConfig, PackOptions, StoreConfig};
use clap::Args;

use super::{parse_compression, parse_hash_format};

#[derive(Args)]
pub struct PackArgs {
    /// Store directory: archives and loose blobs both live under here
    #[arg(long)]
    store: PathBuf,

    /// Hash format the store uses (sha256 | blake2b-256)
    #[arg(long, default_value = "sha256")]
    hash_format: String,

    /// Compression codec for new entries (none | gzip | zlib | zstd)
    #[arg(long, default_value = "zlib")]
    compression: String,

    /// Delta algorithm name; presence of this flag implies v1 format
    #[arg(long)]
    delta_algorithm: Option<String>,

    #[arg(long, default_value_t = 64)]
    delta_min_size: u64,

    #[arg(long, default_value_t = 1 << 20)]
    delta_max_size: u64,

    #[arg(long, default_value_t = 2.0)]
    delta_size_ratio: f64,

    /// Delete packed blobs from the loose store once the archive validates
    #[arg(long)]
    delete_loose: bool,
}

pub fn run(args: &PackArgs) -> Result<i32> {
    let hash_format = parse_hash_format(&args.hash_format)?;
    let compression = parse_compression(&args.compression)?;

    let loose = LooseStore::open(args.store.join("loose"), hash_format);
    let generation = if args.delta_algorithm.is_some() { Generation::V1 } else { Generation::V0 };

    let mut store = ArchiveStore::open(&args.store, loose, generation, StoreConfig { hash_format, compression })?;

    let delta = args.delta_algorithm.as_ref().map(|algorithm| DeltaConfig {
        enabled: true,
        algorithm: algorithm.clone(),
        min_blob_size: args.delta_min_size,
        max_blob_size: args.delta_max_size,
        size_ratio: args.delta_size_ratio,
    });

    let report = store.pack(&PackOptions { delete_loose: args.delete_loose, delta })?;

    println!(
        "Packed {} blobs ({} as delta) into {}",
        report.entry_count, report.delta_count, report.archive_checksum
    );
    Ok(0)
}
