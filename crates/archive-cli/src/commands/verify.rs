use std::path::PathBuf;

use anyhow::{bail, Result};
use archive_hash::BlobId;
use archive_pack::{ArchiveFile, Generation};
use clap::Args;

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to a `.inventory_archive-vN` data file
    #[arg(long)]
    archive: PathBuf,

    /// Show every blob's hash and size instead of just a summary
    #[arg(short = 'v', long)]
    verbose: bool,
}

pub fn run(args: &VerifyArgs) -> Result<i32> {
    let (dir, checksum, generation) = parse_archive_path(&args.archive)?;

    let archive = ArchiveFile::open(&dir, checksum, generation)?;
    archive.validate()?;

    let mut count = 0u64;
    for result in archive.iter() {
        let (hash, payload) = result?;
        count += 1;
        if args.verbose {
            println!("{hash} {}", payload.len());
        }
    }

    println!("archive {checksum}: {count} objects, verified");
    Ok(0)
}

fn parse_archive_path(path: &std::path::Path) -> Result<(PathBuf, BlobId, Generation)> {
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new(".")).to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("archive path has no filename: {}", path.display()))?;

    let (stem, generation) = if let Some(stem) = file_name.strip_suffix(archive_pack::DATA_EXT_V0) {
        (stem, Generation::V0)
    } else if let Some(stem) = file_name.strip_suffix(archive_pack::DATA_EXT_V1) {
        (stem, Generation::V1)
    } else {
        bail!("expected a .inventory_archive-v0 or -v1 file, got {}", path.display());
    };

    // The filename stem is the checksum's hex encoding under whichever
    // format produced it; try each registered format in turn.
    let checksum = archive_hash::HashFormat::from_id("sha256")
        .ok()
        .and_then(|fmt| BlobId::from_hex(fmt, stem).ok())
        .or_else(|| {
            archive_hash::HashFormat::from_id("blake2b-256")
                .ok()
                .and_then(|fmt| BlobId::from_hex(fmt, stem).ok())
        })
        .ok_or_else(|| anyhow::anyhow!("could not parse checksum from filename stem {stem:?}"))?;

    Ok((dir, checksum, generation))
}
