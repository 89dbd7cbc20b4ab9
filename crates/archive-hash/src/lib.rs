//! Hash format registry and blob identity for the inventory archive engine.
//!
//! This crate provides the core `BlobId` type, the closed registry of hash
//! formats an archive may be built with, and a streaming `Hasher` that feeds
//! into both blob identity and the archive/index/cache checksums.

mod error;
mod format;
pub mod hasher;
pub mod hex;
mod id;

pub use error::HashError;
pub use format::HashFormat;
pub use hasher::Hasher;
pub use hex::hex_to_string;
pub use id::BlobId;
