pub mod cat;
pub mod pack;
pub mod verify;

use clap::Subcommand;

use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Bundle loose blobs in a store into a new archive
    Pack(pack::PackArgs),
    /// Verify an archive's data and index checksums
    Verify(verify::VerifyArgs),
    /// Read one blob's bytes back out of a store
    Cat(cat::CatArgs),
}

pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Pack(args) => pack::run(args),
        Commands::Verify(args) => verify::run(args),
        Commands::Cat(args) => cat::run(args),
    }
}

/// Parse a `--hash-format` value into the registry type (spec §6 `hash_type_id`).
pub fn parse_hash_format(name: &str) -> anyhow::Result<archive_hash::HashFormat> {
    archive_hash::HashFormat::from_id(name).map_err(anyhow::Error::from)
}

/// Parse a `--compression` value into the registry type (spec §6 `compression_type`).
pub fn parse_compression(name: &str) -> anyhow::Result<archive_pack::CompressionKind> {
    archive_pack::CompressionKind::from_name(name).map_err(anyhow::Error::from)
}
