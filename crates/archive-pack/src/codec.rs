//! Compression codec registry: a 1-byte id mapping to a whole-buffer
//! compress/decompress pair (spec §4.1, §6). Readers always decompress a
//! full entry payload into memory — streaming decompression with random
//! access into a payload is a non-goal.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::PackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    None,
    Gzip,
    Zlib,
    Zstd,
}

impl CompressionKind {
    pub const NONE_BYTE: u8 = 0;
    pub const GZIP_BYTE: u8 = 1;
    pub const ZLIB_BYTE: u8 = 2;
    pub const ZSTD_BYTE: u8 = 3;

    pub fn to_byte(self) -> u8 {
        match self {
            CompressionKind::None => Self::NONE_BYTE,
            CompressionKind::Gzip => Self::GZIP_BYTE,
            CompressionKind::Zlib => Self::ZLIB_BYTE,
            CompressionKind::Zstd => Self::ZSTD_BYTE,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, PackError> {
        match byte {
            Self::NONE_BYTE => Ok(CompressionKind::None),
            Self::GZIP_BYTE => Ok(CompressionKind::Gzip),
            Self::ZLIB_BYTE => Ok(CompressionKind::Zlib),
            Self::ZSTD_BYTE => Ok(CompressionKind::Zstd),
            other => Err(PackError::FormatError(format!("unknown compression byte {other}"))),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, PackError> {
        match name {
            "none" => Ok(CompressionKind::None),
            "gzip" => Ok(CompressionKind::Gzip),
            "zlib" => Ok(CompressionKind::Zlib),
            "zstd" => Ok(CompressionKind::Zstd),
            other => Err(PackError::FormatError(format!("unknown compression name {other:?}"))),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, PackError> {
        match self {
            CompressionKind::None => Ok(data.to_vec()),
            CompressionKind::Gzip => {
                let mut enc = GzEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                Ok(enc.finish()?)
            }
            CompressionKind::Zlib => {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                Ok(enc.finish()?)
            }
            CompressionKind::Zstd => {
                zstd::stream::encode_all(data, 0).map_err(PackError::Io)
            }
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, PackError> {
        match self {
            CompressionKind::None => Ok(data.to_vec()),
            CompressionKind::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data).read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionKind::Zlib => {
                let mut out = Vec::new();
                ZlibDecoder::new(data).read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionKind::Zstd => {
                zstd::stream::decode_all(data).map_err(PackError::Io)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_codec_round_trips() {
        let data = b"some payload bytes, repeated repeated repeated".repeat(4);
        for kind in [
            CompressionKind::None,
            CompressionKind::Gzip,
            CompressionKind::Zlib,
            CompressionKind::Zstd,
        ] {
            let compressed = kind.compress(&data).unwrap();
            let decompressed = kind.decompress(&compressed).unwrap();
            assert_eq!(decompressed, data, "{kind:?} round-trip failed");
        }
    }

    #[test]
    fn byte_ids_match_spec() {
        assert_eq!(CompressionKind::None.to_byte(), 0);
        assert_eq!(CompressionKind::Gzip.to_byte(), 1);
        assert_eq!(CompressionKind::Zlib.to_byte(), 2);
        assert_eq!(CompressionKind::Zstd.to_byte(), 3);
    }

    #[test]
    fn unknown_byte_is_format_error() {
        assert!(matches!(CompressionKind::from_byte(9), Err(PackError::FormatError(_))));
    }
}
