//! Typed configuration structs (spec §6 "Configuration"), populated by a
//! CLI layer rather than looked up from a loosely-typed properties bag.

use archive_pack::CompressionKind;

/// Ambient options shared by a store's reads and its packer (spec §6
/// `hash_type_id`, `compression_type`).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub hash_format: archive_hash::HashFormat,
    pub compression: CompressionKind,
}

/// v1-only delta configuration (spec §6 `delta.*`).
#[derive(Debug, Clone)]
pub struct DeltaConfig {
    pub enabled: bool,
    pub algorithm: String,
    pub min_blob_size: u64,
    pub max_blob_size: u64,
    pub size_ratio: f64,
}

/// Options for one `Pack` invocation (spec §4.8). `delta: None` packs a v0
/// archive; `Some(_)` packs a v1 archive, with `delta.enabled` gating
/// whether the selector actually runs.
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub delete_loose: bool,
    pub delta: Option<DeltaConfig>,
}

impl PackOptions {
    pub fn generation(&self) -> archive_pack::Generation {
        match self.delta {
            Some(_) => archive_pack::Generation::V1,
            None => archive_pack::Generation::V0,
        }
    }
}
